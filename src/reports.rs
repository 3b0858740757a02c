use std::collections::BTreeMap;

use chrono::Datelike;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::account::StudentAccount;
use crate::decimal::{Currency, Money, Percent};
use crate::errors::Result;
use crate::types::{PaymentMethod, Strand, TransactionStatus};

/// collections overview for the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub currency: Currency,
    pub accounts: usize,
    pub total_collected: Money,
    pub pending_total: Money,
    pub completed_count: usize,
    pub pending_count: usize,
    pub failed_count: usize,
    /// completed over settled (completed plus failed) transactions
    pub success_rate: Percent,
    pub by_method: BTreeMap<PaymentMethod, Money>,
    pub count_by_method: BTreeMap<PaymentMethod, usize>,
    /// completed payments keyed by `YYYY-MM` of their timestamp
    pub by_month: BTreeMap<String, Money>,
    pub by_strand: BTreeMap<Strand, StrandCollection>,
    pub outstanding: Money,
    pub credit_held: Money,
}

/// how much of a strand's assessment has been paid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrandCollection {
    pub accounts: usize,
    pub assessed: Money,
    pub collected: Money,
    pub collection_rate: Percent,
}

impl CollectionSummary {
    pub fn from_accounts<'a>(
        accounts: impl IntoIterator<Item = &'a StudentAccount>,
        currency: Currency,
    ) -> Result<Self> {
        let zero = Money::zero(currency);
        let mut summary = CollectionSummary {
            currency,
            accounts: 0,
            total_collected: zero,
            pending_total: zero,
            completed_count: 0,
            pending_count: 0,
            failed_count: 0,
            success_rate: Percent::ZERO,
            by_method: BTreeMap::new(),
            count_by_method: BTreeMap::new(),
            by_month: BTreeMap::new(),
            by_strand: BTreeMap::new(),
            outstanding: zero,
            credit_held: zero,
        };

        for account in accounts {
            summary.accounts += 1;
            summary.outstanding = summary.outstanding.checked_add(account.balance())?;
            summary.credit_held = summary.credit_held.checked_add(account.credit_balance())?;

            let strand = summary
                .by_strand
                .entry(account.strand)
                .or_insert(StrandCollection {
                    accounts: 0,
                    assessed: zero,
                    collected: zero,
                    collection_rate: Percent::ZERO,
                });
            strand.accounts += 1;
            strand.assessed = strand.assessed.checked_add(account.total_assessed())?;
            strand.collected = strand.collected.checked_add(account.total_paid())?;

            for tx in account.transactions() {
                match tx.status() {
                    TransactionStatus::Completed => {
                        summary.completed_count += 1;
                        summary.total_collected = summary.total_collected.checked_add(tx.amount)?;
                        let entry = summary.by_method.entry(tx.method).or_insert(zero);
                        *entry = entry.checked_add(tx.amount)?;
                        *summary.count_by_method.entry(tx.method).or_insert(0) += 1;

                        let month = format!("{:04}-{:02}", tx.timestamp.year(), tx.timestamp.month());
                        let entry = summary.by_month.entry(month).or_insert(zero);
                        *entry = entry.checked_add(tx.amount)?;
                    }
                    TransactionStatus::Pending => {
                        summary.pending_count += 1;
                        summary.pending_total = summary.pending_total.checked_add(tx.amount)?;
                    }
                    TransactionStatus::Failed => summary.failed_count += 1,
                }
            }
        }

        summary.success_rate = rate(
            Decimal::from(summary.completed_count as u64),
            Decimal::from((summary.completed_count + summary.failed_count) as u64),
        );
        for strand in summary.by_strand.values_mut() {
            strand.collection_rate = rate(strand.collected.as_decimal(), strand.assessed.as_decimal());
        }

        Ok(summary)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// part over whole as a percentage to one decimal place; zero when whole is zero
fn rate(part: Decimal, whole: Decimal) -> Percent {
    if whole.is_zero() {
        return Percent::ZERO;
    }
    let pct = part * Decimal::ONE_HUNDRED / whole;
    Percent::from_decimal(pct.round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use hourglass_rs::{SafeTimeProvider, TimeSource};
    use rust_decimal_macros::dec;

    use crate::fees::FeeLine;
    use crate::payments::{PaymentLedger, PaymentSubmission};
    use crate::types::{Grade, Semester, Strand, Student, Term};

    #[test]
    fn test_summary_counts_and_rate() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 6, 5, 9, 0, 0).unwrap(),
        ));
        let student = Student {
            student_id: "2024-0001".to_string(),
            name: "John Doe".to_string(),
            grade: Grade::Grade11,
            strand: Strand::Abm,
        };
        let mut account = StudentAccount::open(
            &student,
            Term::new(2024, Semester::First),
            vec![FeeLine::new("tuition", "Tuition", Money::php(35_000), true)],
            None,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
        .unwrap();

        {
            let mut ledger = PaymentLedger::new(&mut account);
            for (amount, method) in [
                (10_000, PaymentMethod::GCash),
                (5_000, PaymentMethod::BankTransfer),
                (5_000, PaymentMethod::GCash),
            ] {
                let tx = PaymentSubmission::new(Money::php(amount), method, &time)
                    .into_transaction("2024-0001");
                ledger.apply(tx).unwrap();
            }

            let failed = ledger
                .record_pending(
                    PaymentSubmission::new(Money::php(1_000), PaymentMethod::CreditCard, &time)
                        .into_transaction("2024-0001"),
                )
                .unwrap();
            ledger.mark_failed(failed, "card declined", &time).unwrap();

            ledger
                .record_pending(
                    PaymentSubmission::new(Money::php(2_000), PaymentMethod::Cash, &time)
                        .into_transaction("2024-0001"),
                )
                .unwrap();
        }

        let summary = CollectionSummary::from_accounts([&account], Currency::Php).unwrap();

        assert_eq!(summary.total_collected, Money::php(20_000));
        assert_eq!(summary.pending_total, Money::php(2_000));
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.success_rate, Percent::from_decimal(dec!(75.0)));
        assert_eq!(summary.by_method[&PaymentMethod::GCash], Money::php(15_000));
        assert_eq!(summary.outstanding, Money::php(15_000));
    }

    #[test]
    fn test_empty_summary() {
        let summary = CollectionSummary::from_accounts(std::iter::empty(), Currency::Php).unwrap();
        assert_eq!(summary.accounts, 0);
        assert_eq!(summary.success_rate, Percent::ZERO);
    }

    fn open_for(id: &str, strand: Strand, tuition: u64) -> StudentAccount {
        let student = Student {
            student_id: id.to_string(),
            name: format!("Student {}", id),
            grade: Grade::Grade12,
            strand,
        };
        StudentAccount::open(
            &student,
            Term::new(2024, Semester::First),
            vec![FeeLine::new("tuition", "Tuition", Money::php(tuition), true)],
            None,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
        .unwrap()
    }

    fn pay(account: &mut StudentAccount, amount: u64, method: PaymentMethod, month: u32) {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, month, 10, 9, 0, 0).unwrap(),
        ));
        let tx = PaymentSubmission::new(Money::php(amount), method, &time)
            .into_transaction(account.student_id.clone());
        PaymentLedger::new(account).apply(tx).unwrap();
    }

    #[test]
    fn test_trend_methods_and_strands() {
        let mut stem = open_for("2024-0001", Strand::Stem, 40_000);
        let mut abm = open_for("2024-0002", Strand::Abm, 30_000);
        let ict = open_for("2024-0003", Strand::Ict, 30_000);

        pay(&mut stem, 10_000, PaymentMethod::GCash, 6);
        pay(&mut stem, 10_000, PaymentMethod::Cash, 7);
        pay(&mut abm, 10_000, PaymentMethod::GCash, 7);

        let summary = CollectionSummary::from_accounts([&stem, &abm, &ict], Currency::Php).unwrap();

        assert_eq!(summary.by_month.len(), 2);
        assert_eq!(summary.by_month["2024-06"], Money::php(10_000));
        assert_eq!(summary.by_month["2024-07"], Money::php(20_000));
        let months: Vec<&String> = summary.by_month.keys().collect();
        assert_eq!(months, vec!["2024-06", "2024-07"]);

        assert_eq!(summary.count_by_method[&PaymentMethod::GCash], 2);
        assert_eq!(summary.count_by_method[&PaymentMethod::Cash], 1);
        assert!(!summary.count_by_method.contains_key(&PaymentMethod::BankTransfer));

        let stem_rate = &summary.by_strand[&Strand::Stem];
        assert_eq!(stem_rate.collected, Money::php(20_000));
        assert_eq!(stem_rate.collection_rate, Percent::from_whole(50));
        assert_eq!(
            summary.by_strand[&Strand::Abm].collection_rate,
            Percent::from_decimal(dec!(33.3))
        );
        assert_eq!(summary.by_strand[&Strand::Ict].collection_rate, Percent::ZERO);

        let json = summary.to_json_pretty().unwrap();
        assert!(json.contains("\"2024-07\""));
        assert!(json.contains("\"STEM\""));
    }
}
