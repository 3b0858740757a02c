use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Percent};
use crate::errors::{LedgerError, Result};

/// one scheduled partial due amount; number 0 is the down payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Money,
}

/// installment plan offered to students
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub plan_id: Uuid,
    pub name: String,
    pub installments: u32,
    pub interval_days: u32,
    pub down_payment_percent: Percent,
    pub active: bool,
}

impl PaymentPlan {
    /// create and validate a plan
    pub fn new(
        name: impl Into<String>,
        installments: u32,
        interval_days: u32,
        down_payment_percent: Percent,
    ) -> Result<Self> {
        let plan = Self {
            plan_id: Uuid::new_v4(),
            name: name.into(),
            installments,
            interval_days,
            down_payment_percent,
            active: true,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// monthly installments over one semester
    pub fn monthly(installments: u32, down_payment_percent: Percent) -> Result<Self> {
        Self::new("Monthly Payment", installments, 30, down_payment_percent)
    }

    /// quarterly installments
    pub fn quarterly(installments: u32, down_payment_percent: Percent) -> Result<Self> {
        Self::new("Quarterly Payment", installments, 90, down_payment_percent)
    }

    /// whole balance due on the start date
    pub fn full_payment() -> Result<Self> {
        Self::new("Full Payment", 1, 1, Percent::ZERO)
    }

    pub fn validate(&self) -> Result<()> {
        if self.installments == 0 {
            return Err(LedgerError::InvalidPlanParameters {
                message: "installments must be greater than zero".to_string(),
            });
        }
        if self.interval_days == 0 {
            return Err(LedgerError::InvalidPlanParameters {
                message: "interval days must be greater than zero".to_string(),
            });
        }
        if !self.down_payment_percent.is_bounded() {
            return Err(LedgerError::InvalidPlanParameters {
                message: format!(
                    "down payment percent {} outside 0..=100",
                    self.down_payment_percent
                ),
            });
        }
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Generate the due schedule for an assessed total.
    ///
    /// The down payment is rounded down; what is left is split evenly with
    /// the remainder going one minor unit at a time to the earliest
    /// installments, so the amounts always sum to `total` exactly.
    pub fn generate_schedule(
        &self,
        total: Money,
        start: NaiveDate,
    ) -> Result<Vec<ScheduledInstallment>> {
        self.validate()?;

        let down_payment = total.multiply_by_percent_floor(self.down_payment_percent);
        let financed = total.subtract(down_payment)?;

        let mut schedule = Vec::with_capacity(self.installments as usize + 1);

        if !down_payment.is_zero() {
            schedule.push(ScheduledInstallment {
                number: 0,
                due_date: start,
                amount_due: down_payment,
            });
        }

        for (i, amount_due) in financed.split_evenly(self.installments).into_iter().enumerate() {
            let number = i as u32 + 1;
            schedule.push(ScheduledInstallment {
                number,
                due_date: start + Duration::days(i64::from(number) * i64::from(self.interval_days)),
                amount_due,
            });
        }

        Ok(schedule)
    }
}

/// total of a schedule
pub fn schedule_total(schedule: &[ScheduledInstallment]) -> Money {
    schedule.iter().map(|i| i.amount_due).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Currency;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_twenty_percent_down_ten_installments() {
        let plan = PaymentPlan::new("Semester Plan", 10, 30, Percent::from_whole(20)).unwrap();
        let schedule = plan.generate_schedule(Money::php(50_000), start()).unwrap();

        assert_eq!(schedule.len(), 11);
        assert_eq!(schedule[0].number, 0);
        assert_eq!(schedule[0].amount_due, Money::php(10_000));
        assert_eq!(schedule[0].due_date, start());

        for (i, inst) in schedule[1..].iter().enumerate() {
            assert_eq!(inst.amount_due, Money::php(4_000));
            assert_eq!(inst.due_date, start() + Duration::days(30 * (i as i64 + 1)));
        }

        assert_eq!(schedule_total(&schedule), Money::php(50_000));
    }

    #[test]
    fn test_remainder_goes_to_earliest_installments() {
        let plan = PaymentPlan::new("Odd", 3, 30, Percent::ZERO).unwrap();
        let total = Money::from_minor(1_000_001, Currency::Php);
        let schedule = plan.generate_schedule(total, start()).unwrap();

        let amounts: Vec<u64> = schedule.iter().map(|i| i.amount_due.minor_units()).collect();
        assert_eq!(amounts, vec![333_334, 333_334, 333_333]);
        assert_eq!(schedule_total(&schedule), total);
        // no down payment means no installment zero
        assert_eq!(schedule[0].number, 1);
        assert_eq!(schedule[0].due_date, start() + Duration::days(30));
    }

    #[test]
    fn test_down_payment_rounds_down() {
        // 33% of 100.01 = 33.0033 -> 33.00, rest financed
        let plan = PaymentPlan::new("Rounding", 2, 15, Percent::from_whole(33)).unwrap();
        let total = Money::from_minor(10_001, Currency::Php);
        let schedule = plan.generate_schedule(total, start()).unwrap();

        assert_eq!(schedule[0].amount_due.minor_units(), 3_300);
        assert_eq!(schedule_total(&schedule), total);
    }

    #[test]
    fn test_full_down_payment() {
        let plan = PaymentPlan::new("All now", 2, 30, Percent::HUNDRED).unwrap();
        let schedule = plan.generate_schedule(Money::php(100), start()).unwrap();

        assert_eq!(schedule[0].amount_due, Money::php(100));
        assert!(schedule[1..].iter().all(|i| i.amount_due.is_zero()));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            PaymentPlan::new("zero", 0, 30, Percent::ZERO),
            Err(LedgerError::InvalidPlanParameters { .. })
        ));
        assert!(matches!(
            PaymentPlan::new("zero interval", 3, 0, Percent::ZERO),
            Err(LedgerError::InvalidPlanParameters { .. })
        ));
        assert!(matches!(
            PaymentPlan::new("too much", 3, 30, Percent::from_whole(120)),
            Err(LedgerError::InvalidPlanParameters { .. })
        ));

        // a plan mutated into an invalid state is rejected at generation time
        let mut plan = PaymentPlan::monthly(5, Percent::ZERO).unwrap();
        plan.installments = 0;
        assert!(plan.generate_schedule(Money::php(1), start()).is_err());
    }
}
