use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, warn};

use crate::account::StudentAccount;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::types::{TransactionStatus, TxId};

use super::{allocate, AllocationPlan, AllocationResult, CreditApplication, PaymentPolicy, PaymentTransaction};

/// Applies payments to one student account.
///
/// Every operation computes its outcome first and only then mutates the
/// account, so a failed call leaves balances exactly as they were.
pub struct PaymentLedger<'a> {
    account: &'a mut StudentAccount,
    policy: PaymentPolicy,
    grace_days: u32,
}

impl<'a> PaymentLedger<'a> {
    pub fn new(account: &'a mut StudentAccount) -> Self {
        Self::with_policy(account, PaymentPolicy::permissive())
    }

    pub fn with_policy(account: &'a mut StudentAccount, policy: PaymentPolicy) -> Self {
        Self {
            account,
            policy,
            grace_days: 0,
        }
    }

    /// grace period used to decide whether a payment is late
    pub fn with_grace_days(mut self, grace_days: u32) -> Self {
        self.grace_days = grace_days;
        self
    }

    pub fn account(&self) -> &StudentAccount {
        self.account
    }

    /// Record a pending transaction without applying it.
    ///
    /// Rejected outright, and not recorded, when it is not pending, its id
    /// is already on the ledger, its amount is zero or in another currency,
    /// or it belongs to another student.
    pub fn record_pending(&mut self, tx: PaymentTransaction) -> Result<TxId> {
        if tx.status() != TransactionStatus::Pending {
            return Err(LedgerError::TransactionNotPending {
                tx_id: tx.tx_id,
                status: tx.status(),
            });
        }
        if self.account.contains_transaction(tx.tx_id) {
            return Err(LedgerError::DuplicateTransaction { tx_id: tx.tx_id });
        }
        if tx.amount.is_zero() {
            return Err(LedgerError::InvalidPaymentAmount { amount: tx.amount });
        }
        if tx.amount.currency() != self.account.currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: self.account.currency,
                found: tx.amount.currency(),
            });
        }
        if tx.student_id != self.account.student_id {
            return Err(LedgerError::InvalidConfiguration {
                message: format!(
                    "transaction {} belongs to {}, not {}",
                    tx.tx_id, tx.student_id, self.account.student_id
                ),
            });
        }

        let tx_id = tx.tx_id;
        self.account.events.emit(Event::PaymentRecorded {
            student_id: tx.student_id.clone(),
            tx_id,
            amount: tx.amount,
            method: tx.method,
            reference: tx.reference.clone(),
            timestamp: tx.timestamp,
        });

        debug!(
            student_id = %tx.student_id,
            tx_id = %tx_id,
            amount = %tx.amount,
            method = %tx.method,
            "payment recorded"
        );

        self.account.push_transaction(tx);
        Ok(tx_id)
    }

    /// record and apply in one step
    pub fn apply(&mut self, tx: PaymentTransaction) -> Result<AllocationResult> {
        let tx_id = self.record_pending(tx)?;
        self.apply_pending(tx_id)
    }

    /// Apply a recorded pending transaction against the fee lines.
    ///
    /// Any failure after the transaction is found pending (nothing assessed,
    /// policy violations, arithmetic overflow) marks it `Failed` and returns
    /// the error; balances and credit do not change.
    pub fn apply_pending(&mut self, tx_id: TxId) -> Result<AllocationResult> {
        let (amount, timestamp, status) = match self.account.find_transaction(tx_id) {
            Some(tx) => (tx.amount, tx.timestamp, tx.status()),
            None => return Err(LedgerError::TransactionNotFound { tx_id }),
        };

        if status != TransactionStatus::Pending {
            return Err(LedgerError::TransactionNotPending { tx_id, status });
        }

        if self.account.fee_lines().is_empty() {
            let err = LedgerError::NoAssessableFees {
                student_id: self.account.student_id.clone(),
            };
            return Err(self.fail_with(tx_id, err));
        }

        let balance_before = self.account.balance();

        if let Err(err) = self.policy.validate_payment(amount, balance_before) {
            return Err(self.fail_with(tx_id, err));
        }

        if let Err(err) = self.check_timing(timestamp) {
            return Err(self.fail_with(tx_id, err));
        }

        let (plan, balance_after, credit_after) = match self.settle(amount, balance_before) {
            Ok(settled) => settled,
            Err(err) => return Err(self.fail_with(tx_id, err)),
        };
        let applied = plan.total_allocated();

        // nothing below can fail
        let student_id = self.account.student_id.clone();
        if let Some(tx) = self.account.transaction_mut(tx_id) {
            tx.complete(plan.allocations.clone(), plan.credit);
        }

        if plan.credit.is_positive() {
            self.account.set_credit(credit_after);
            self.account.events.emit(Event::CreditRecorded {
                student_id: student_id.clone(),
                tx_id,
                amount: plan.credit,
                credit_balance: self.account.credit_balance(),
                timestamp,
            });
        }

        self.account.events.emit(Event::PaymentApplied {
            student_id: student_id.clone(),
            tx_id,
            amount,
            allocations: plan.allocations.clone(),
            balance_after,
            timestamp,
        });

        info!(
            student_id = %student_id,
            tx_id = %tx_id,
            amount = %amount,
            applied = %applied,
            credit = %plan.credit,
            balance = %balance_after,
            "payment applied"
        );

        Ok(AllocationResult {
            tx_id,
            allocations: plan.allocations,
            credit_created: plan.credit,
            balance_before,
            balance_after,
            credit_balance: self.account.credit_balance(),
        })
    }

    /// gateway-side failure of a pending transaction
    pub fn mark_failed(
        &mut self,
        tx_id: TxId,
        reason: impl Into<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let status = self
            .account
            .find_transaction(tx_id)
            .map(|t| t.status())
            .ok_or(LedgerError::TransactionNotFound { tx_id })?;

        if status != TransactionStatus::Pending {
            return Err(LedgerError::TransactionNotPending { tx_id, status });
        }

        let reason = reason.into();
        self.mark_failed_unchecked(tx_id, reason, time_provider.now());
        Ok(())
    }

    /// attach an audit note; allowed in any status
    pub fn annotate(
        &mut self,
        tx_id: TxId,
        note: impl Into<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<()> {
        let note = note.into();
        let timestamp = time_provider.now();
        let student_id = self.account.student_id.clone();

        let tx = self
            .account
            .transaction_mut(tx_id)
            .ok_or(LedgerError::TransactionNotFound { tx_id })?;
        tx.annotate(timestamp, note.clone());

        self.account.events.emit(Event::TransactionAnnotated {
            student_id,
            tx_id,
            note,
            timestamp,
        });
        Ok(())
    }

    /// Draw stored credit down against the outstanding balance.
    ///
    /// Returns `None` when there is no credit or nothing is owed.
    pub fn apply_credit(
        &mut self,
        time_provider: &SafeTimeProvider,
    ) -> Result<Option<CreditApplication>> {
        let credit = self.account.credit_balance();
        let balance = self.account.balance();

        if credit.is_zero() || balance.is_zero() {
            return Ok(None);
        }

        let amount = credit.min(balance);
        let remaining = self.account.line_remaining();
        let order = self.account.allocation_order()?;
        let plan = allocate(amount, self.account.fee_lines(), &remaining, &order)?;

        let timestamp = time_provider.now();
        let application = CreditApplication::new(plan.allocations, amount, timestamp);

        self.account.record_credit_application(application.clone())?;

        self.account.events.emit(Event::CreditApplied {
            student_id: self.account.student_id.clone(),
            amount,
            allocations: application.allocations.clone(),
            credit_balance: self.account.credit_balance(),
            timestamp,
        });

        info!(
            student_id = %self.account.student_id,
            amount = %amount,
            credit_left = %self.account.credit_balance(),
            "credit applied"
        );

        Ok(Some(application))
    }

    /// outstanding after stored credit, zero when credit covers it
    pub fn amount_due(&self) -> Money {
        self.account
            .balance()
            .saturating_sub(self.account.credit_balance())
    }

    fn check_timing(&self, timestamp: chrono::DateTime<chrono::Utc>) -> Result<()> {
        if self.policy.allow_late_payments {
            return Ok(());
        }
        let overdue = self
            .account
            .overdue_installments(timestamp.date_naive(), self.grace_days)?
            .iter()
            .fold(Money::zero(self.account.currency), |acc, i| acc + i.remaining);
        self.policy.validate_timing(&self.account.student_id, overdue)
    }

    /// allocation, balance after and credit after, computed without mutating
    fn settle(&self, amount: Money, balance_before: Money) -> Result<(AllocationPlan, Money, Money)> {
        let remaining = self.account.line_remaining();
        let order = self.account.allocation_order()?;
        let plan = allocate(amount, self.account.fee_lines(), &remaining, &order)?;
        let balance_after = balance_before.subtract(plan.total_allocated())?;
        let credit_after = self.account.credit_balance().checked_add(plan.credit)?;
        Ok((plan, balance_after, credit_after))
    }

    fn fail_with(&mut self, tx_id: TxId, err: LedgerError) -> LedgerError {
        let timestamp = self
            .account
            .find_transaction(tx_id)
            .map(|t| t.timestamp)
            .unwrap_or_default();
        self.mark_failed_unchecked(tx_id, err.to_string(), timestamp);
        err
    }

    fn mark_failed_unchecked(
        &mut self,
        tx_id: TxId,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) {
        let student_id = self.account.student_id.clone();
        let mut amount = Money::zero(self.account.currency);

        if let Some(tx) = self.account.transaction_mut(tx_id) {
            amount = tx.amount;
            tx.fail(reason.clone());
        }

        warn!(
            student_id = %student_id,
            tx_id = %tx_id,
            reason = %reason,
            "payment failed"
        );

        self.account.events.emit(Event::PaymentFailed {
            student_id,
            tx_id,
            amount,
            reason,
            timestamp,
        });
    }
}
