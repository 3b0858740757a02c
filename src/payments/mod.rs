pub mod allocation;
pub mod credit;
pub mod ledger;
pub mod plan;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{FeeId, PaymentMethod, StudentId, TransactionStatus, TxId};

pub use allocation::{allocate, allocation_order, AllocationPlan, AllocationResult};
pub use credit::{CreditApplication, TermClosing};
pub use ledger::PaymentLedger;
pub use plan::{PaymentPlan, ScheduledInstallment};

/// amount of a payment that went to one fee line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub fee_id: FeeId,
    pub amount: Money,
}

/// audit note attached to a transaction, allowed after terminal status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

/// raw payment submission from the payment form
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSubmission {
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PaymentSubmission {
    pub fn new(amount: Money, method: PaymentMethod, time_provider: &SafeTimeProvider) -> Self {
        Self {
            amount,
            method,
            reference: None,
            timestamp: time_provider.now(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// turn into a pending transaction with a fresh id
    pub fn into_transaction(self, student_id: impl Into<StudentId>) -> PaymentTransaction {
        let tx_id = Uuid::new_v4();
        let reference = self
            .reference
            .unwrap_or_else(|| generate_reference(self.method, tx_id));

        PaymentTransaction {
            tx_id,
            student_id: student_id.into(),
            amount: self.amount,
            method: self.method,
            reference,
            timestamp: self.timestamp,
            status: TransactionStatus::Pending,
            applied_to: Vec::new(),
            credit_created: Money::zero(self.amount.currency()),
            failure_reason: None,
            annotations: Vec::new(),
        }
    }
}

/// receipt-style reference, e.g. "GC-1A2B3C4D5"
fn generate_reference(method: PaymentMethod, tx_id: TxId) -> String {
    let simple = tx_id.simple().to_string().to_uppercase();
    format!("{}-{}", method.reference_prefix(), &simple[..9])
}

/// A payment recorded on a student's ledger.
///
/// Created once as `Pending`; moves to `Completed` or `Failed` exactly once.
/// After that only annotations may be added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub tx_id: TxId,
    pub student_id: StudentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: String,
    pub timestamp: DateTime<Utc>,
    status: TransactionStatus,
    applied_to: Vec<Allocation>,
    credit_created: Money,
    failure_reason: Option<String>,
    annotations: Vec<Annotation>,
}

impl PaymentTransaction {
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn applied_to(&self) -> &[Allocation] {
        &self.applied_to
    }

    /// portion of the payment that exceeded the balance
    pub fn credit_created(&self) -> Money {
        self.credit_created
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    /// amount applied to a given fee line
    pub fn applied_to_fee(&self, fee_id: &str) -> Money {
        let zero = Money::zero(self.amount.currency());
        self.applied_to
            .iter()
            .filter(|a| a.fee_id == fee_id)
            .fold(zero, |acc, a| acc + a.amount)
    }

    pub(crate) fn complete(&mut self, applied_to: Vec<Allocation>, credit_created: Money) {
        self.status = TransactionStatus::Completed;
        self.applied_to = applied_to;
        self.credit_created = credit_created;
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.status = TransactionStatus::Failed;
        self.failure_reason = Some(reason.into());
    }

    pub(crate) fn annotate(&mut self, timestamp: DateTime<Utc>, note: impl Into<String>) {
        self.annotations.push(Annotation {
            timestamp,
            note: note.into(),
        });
    }
}

/// payment acceptance rules from the system preferences screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPolicy {
    pub allow_partial: bool,
    /// smallest partial payment accepted; paying the whole balance is always allowed
    pub minimum_partial_amount: Option<Money>,
    /// accept payments while an installment is past its grace period
    #[serde(default = "accepts_late")]
    pub allow_late_payments: bool,
}

fn accepts_late() -> bool {
    true
}

impl PaymentPolicy {
    /// accepts any positive amount
    pub fn permissive() -> Self {
        Self {
            allow_partial: true,
            minimum_partial_amount: None,
            allow_late_payments: true,
        }
    }

    /// Refuse a payment made while installments are overdue, when late
    /// payments are switched off. `overdue` is the amount past grace.
    pub fn validate_timing(&self, student_id: &str, overdue: Money) -> Result<()> {
        if self.allow_late_payments || overdue.is_zero() {
            return Ok(());
        }
        Err(LedgerError::LatePaymentsDisabled {
            student_id: student_id.to_string(),
            overdue,
        })
    }

    pub fn validate_payment(&self, amount: Money, outstanding: Money) -> Result<()> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidPaymentAmount { amount });
        }

        if amount >= outstanding {
            return Ok(());
        }

        if !self.allow_partial {
            return Err(LedgerError::PartialPaymentsDisabled {
                balance: outstanding,
                provided: amount,
            });
        }

        if let Some(minimum) = self.minimum_partial_amount {
            if amount < minimum {
                return Err(LedgerError::PaymentBelowMinimum {
                    minimum,
                    provided: amount,
                });
            }
        }

        Ok(())
    }
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;

    #[test]
    fn test_policy_validation() {
        let policy = PaymentPolicy {
            allow_partial: true,
            minimum_partial_amount: Some(Money::php(5_000)),
            allow_late_payments: true,
        };
        let outstanding = Money::php(45_000);

        assert!(policy.validate_payment(Money::ZERO, outstanding).is_err());
        assert!(matches!(
            policy.validate_payment(Money::php(1_000), outstanding),
            Err(LedgerError::PaymentBelowMinimum { .. })
        ));
        assert!(policy.validate_payment(Money::php(5_000), outstanding).is_ok());

        // settling a small remaining balance is allowed below the minimum
        assert!(policy.validate_payment(Money::php(2_000), Money::php(2_000)).is_ok());
    }

    #[test]
    fn test_partial_payments_disabled() {
        let policy = PaymentPolicy {
            allow_partial: false,
            minimum_partial_amount: None,
            allow_late_payments: true,
        };
        assert!(matches!(
            policy.validate_payment(Money::php(100), Money::php(200)),
            Err(LedgerError::PartialPaymentsDisabled { .. })
        ));
        assert!(policy.validate_payment(Money::php(300), Money::php(200)).is_ok());
    }

    #[test]
    fn test_late_payments_disabled() {
        let policy = PaymentPolicy {
            allow_late_payments: false,
            ..PaymentPolicy::permissive()
        };
        assert!(policy.validate_timing("2024-0001", Money::ZERO).is_ok());
        assert!(matches!(
            policy.validate_timing("2024-0001", Money::php(4_000)),
            Err(LedgerError::LatePaymentsDisabled { .. })
        ));
        assert!(PaymentPolicy::permissive()
            .validate_timing("2024-0001", Money::php(4_000))
            .is_ok());
    }

    #[test]
    fn test_submission_creates_pending_transaction() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap(),
        ));

        let tx = PaymentSubmission::new(Money::php(15_000), PaymentMethod::GCash, &time)
            .into_transaction("2024-0001");

        assert_eq!(tx.status(), TransactionStatus::Pending);
        assert!(tx.reference.starts_with("GC-"));
        assert_eq!(tx.reference.len(), 12);
        assert_eq!(tx.timestamp, time.now());
        assert!(tx.applied_to().is_empty());

        let with_ref = PaymentSubmission::new(Money::php(1), PaymentMethod::BankTransfer, &time)
            .with_reference("BT-987654321")
            .into_transaction("2024-0001");
        assert_eq!(with_ref.reference, "BT-987654321");
    }
}
