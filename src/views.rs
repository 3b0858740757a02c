use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{LineBalance, StudentAccount};
use crate::decimal::Money;
use crate::errors::Result;
use crate::payments::Allocation;
use crate::types::{Grade, PaymentMethod, Strand, StudentId, Term, TransactionStatus, TxId};

/// serializable projection of an account for the balance and history screens
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountView {
    pub student_id: StudentId,
    pub student_name: String,
    pub grade: Grade,
    pub strand: Strand,
    pub term: Term,
    pub as_of: NaiveDate,
    pub totals: TotalsView,
    pub fees: Vec<LineBalance>,
    pub schedule: Vec<InstallmentView>,
    pub payments: Vec<PaymentHistoryView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TotalsView {
    pub total_assessed: Money,
    pub total_paid: Money,
    pub balance: Money,
    pub credit: Money,
    /// balance less credit
    pub amount_due: Money,
    pub next_due_date: Option<NaiveDate>,
    pub next_due_amount: Option<Money>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentState {
    Paid,
    Upcoming,
    Due,
    Overdue,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallmentView {
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub paid: Money,
    pub remaining: Money,
    pub state: InstallmentState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentHistoryView {
    pub tx_id: TxId,
    pub reference: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    pub applied_to: Vec<Allocation>,
    pub credit_created: Money,
    pub failure_reason: Option<String>,
}

impl AccountView {
    pub fn from_account(account: &StudentAccount, as_of: NaiveDate, grace_days: u32) -> Result<Self> {
        let schedule: Vec<InstallmentView> = account
            .installment_status()?
            .into_iter()
            .map(|inst| {
                let state = if inst.is_settled() {
                    InstallmentState::Paid
                } else if as_of >= inst.due_date + Duration::days(i64::from(grace_days)) {
                    InstallmentState::Overdue
                } else if as_of >= inst.due_date {
                    InstallmentState::Due
                } else {
                    InstallmentState::Upcoming
                };
                InstallmentView {
                    number: inst.number,
                    due_date: inst.due_date,
                    amount_due: inst.amount_due,
                    paid: inst.paid,
                    remaining: inst.remaining,
                    state,
                }
            })
            .collect();

        let next = schedule.iter().find(|i| i.state != InstallmentState::Paid);

        // newest first, as the history screen lists them
        let mut payments: Vec<PaymentHistoryView> = account
            .transactions()
            .iter()
            .map(|tx| PaymentHistoryView {
                tx_id: tx.tx_id,
                reference: tx.reference.clone(),
                amount: tx.amount,
                method: tx.method,
                status: tx.status(),
                timestamp: tx.timestamp,
                applied_to: tx.applied_to().to_vec(),
                credit_created: tx.credit_created(),
                failure_reason: tx.failure_reason().map(str::to_string),
            })
            .collect();
        payments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let balance = account.balance();
        let credit = account.credit_balance();

        Ok(AccountView {
            student_id: account.student_id.clone(),
            student_name: account.student_name.clone(),
            grade: account.grade,
            strand: account.strand,
            term: account.term,
            as_of,
            totals: TotalsView {
                total_assessed: account.total_assessed(),
                total_paid: account.total_paid(),
                balance,
                credit,
                amount_due: balance.saturating_sub(credit),
                next_due_date: next.map(|i| i.due_date),
                next_due_amount: next.map(|i| i.remaining),
            },
            fees: account.line_balances()?,
            schedule,
            payments,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Percent;
    use crate::fees::FeeCatalog;
    use crate::payments::{PaymentLedger, PaymentPlan, PaymentSubmission};
    use crate::types::{Semester, Student};
    use chrono::TimeZone;
    use hourglass_rs::{SafeTimeProvider, TimeSource};

    #[test]
    fn test_view_reflects_payments() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let student = Student {
            student_id: "2024-0001".to_string(),
            name: "John Doe".to_string(),
            grade: Grade::Grade11,
            strand: Strand::Stem,
        };
        let plan = PaymentPlan::monthly(4, Percent::from_whole(20)).unwrap();
        let mut account = StudentAccount::assess(
            &student,
            &FeeCatalog::senior_high_default(),
            Term::new(2024, Semester::First),
            Some(plan),
            start,
        )
        .unwrap();

        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let tx = PaymentSubmission::new(Money::php(10_000), PaymentMethod::GCash, &time)
            .into_transaction("2024-0001");
        PaymentLedger::new(&mut account).apply(tx).unwrap();

        let view = AccountView::from_account(&account, start + Duration::days(40), 7).unwrap();

        assert_eq!(view.totals.balance, Money::php(40_000));
        assert_eq!(view.schedule[0].state, InstallmentState::Paid);
        assert_eq!(view.schedule[1].state, InstallmentState::Overdue);
        assert_eq!(view.schedule[2].state, InstallmentState::Upcoming);
        assert_eq!(view.totals.next_due_amount, Some(Money::php(10_000)));
        assert_eq!(view.fees.len(), 4);
        assert_eq!(view.payments.len(), 1);

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"student_id\": \"2024-0001\""));
    }
}
