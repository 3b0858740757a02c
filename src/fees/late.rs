use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::account::StudentAccount;
use crate::decimal::{Money, Percent};
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::types::FeeKind;

use super::FeeLine;

/// late fee configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateFeePolicy {
    /// flat amount charged per overdue installment
    pub fixed: Money,
    /// optional share of the installment still unpaid
    #[serde(default)]
    pub percent: Option<Percent>,
    /// apply automatically when the grace period runs out
    pub auto_apply: bool,
}

impl LateFeePolicy {
    pub fn fixed(amount: Money) -> Self {
        Self {
            fixed: amount,
            percent: None,
            auto_apply: true,
        }
    }

    pub fn with_percent(mut self, percent: Percent) -> Self {
        self.percent = Some(percent);
        self
    }

    pub fn manual(mut self) -> Self {
        self.auto_apply = false;
        self
    }
}

impl Default for LateFeePolicy {
    fn default() -> Self {
        Self::fixed(Money::php(500))
    }
}

/// a late fee that would be charged for one installment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateFeeCharge {
    pub installment: u32,
    pub due_date: NaiveDate,
    pub days_overdue: u32,
    /// installment remaining the percentage was taken from
    pub overdue_amount: Money,
    pub line: FeeLine,
}

/// engine for charging late fees on overdue installments
pub struct LateFeeEngine {
    pub policy: LateFeePolicy,
}

impl LateFeeEngine {
    pub fn new(policy: LateFeePolicy) -> Self {
        Self { policy }
    }

    /// fixed part plus the percentage of what is still unpaid
    pub fn calculate(&self, overdue_amount: Money) -> Result<Money> {
        if self.policy.fixed.currency() != overdue_amount.currency() {
            return Err(LedgerError::CurrencyMismatch {
                expected: overdue_amount.currency(),
                found: self.policy.fixed.currency(),
            });
        }

        let variable = self
            .policy
            .percent
            .map(|p| overdue_amount.multiply_by_percent(p))
            .unwrap_or_else(|| Money::zero(overdue_amount.currency()));

        self.policy.fixed.checked_add(variable)
    }

    /// Late fees the account would be charged on `as_of`.
    ///
    /// Installments that already carry a late fee are skipped.
    pub fn assess_late_fees(
        &self,
        account: &StudentAccount,
        as_of: NaiveDate,
        grace_days: u32,
    ) -> Result<Vec<LateFeeCharge>> {
        let mut charges = Vec::new();

        for inst in account.overdue_installments(as_of, grace_days)? {
            if account.has_late_fee_for(inst.number) {
                continue;
            }

            let amount = self.calculate(inst.remaining)?;
            if amount.is_zero() {
                continue;
            }

            let days_overdue = (as_of - inst.due_date).num_days().max(0) as u32;
            let mut line = FeeLine::new(
                late_fee_id(inst.number),
                format!("Late Fee (installment {})", inst.number),
                amount,
                true,
            )
            .due_with_installment(inst.number);
            line.kind = FeeKind::LateFee;

            charges.push(LateFeeCharge {
                installment: inst.number,
                due_date: inst.due_date,
                days_overdue,
                overdue_amount: inst.remaining,
                line,
            });
        }

        Ok(charges)
    }

    /// Append late-fee lines to the account when the policy auto-applies.
    ///
    /// Running this twice on the same day charges nothing the second time.
    pub fn apply_late_fees(
        &self,
        account: &mut StudentAccount,
        now: DateTime<Utc>,
        grace_days: u32,
    ) -> Result<Vec<FeeLine>> {
        if !self.policy.auto_apply {
            debug!(student_id = %account.student_id, "late fees not auto-applied");
            return Ok(Vec::new());
        }

        let charges = self.assess_late_fees(account, now.date_naive(), grace_days)?;
        let mut applied = Vec::with_capacity(charges.len());

        for charge in charges {
            account.add_fee_line(charge.line.clone())?;

            account.events.emit(Event::LateFeeAssessed {
                student_id: account.student_id.clone(),
                fee_id: charge.line.fee_id.clone(),
                installment: charge.installment,
                amount: charge.line.assessed_amount,
                due_date: charge.due_date,
                days_overdue: charge.days_overdue,
                timestamp: now,
            });

            info!(
                student_id = %account.student_id,
                installment = charge.installment,
                amount = %charge.line.assessed_amount,
                days_overdue = charge.days_overdue,
                "late fee applied"
            );

            applied.push(charge.line);
        }

        Ok(applied)
    }
}

fn late_fee_id(installment: u32) -> String {
    format!("late-fee-{}", installment)
}
