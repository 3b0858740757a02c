use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::fees::FeeLine;
use crate::types::Term;

use super::{Allocation, PaymentTransaction};

/// stored credit drawn down against fee lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditApplication {
    pub application_id: Uuid,
    pub amount: Money,
    pub allocations: Vec<Allocation>,
    pub timestamp: DateTime<Utc>,
}

impl CreditApplication {
    pub fn new(allocations: Vec<Allocation>, amount: Money, timestamp: DateTime<Utc>) -> Self {
        Self {
            application_id: Uuid::new_v4(),
            amount,
            allocations,
            timestamp,
        }
    }

    pub fn applied_to_fee(&self, fee_id: &str) -> Money {
        let zero = Money::zero(self.amount.currency());
        self.allocations
            .iter()
            .filter(|a| a.fee_id == fee_id)
            .fold(zero, |acc, a| acc + a.amount)
    }
}

/// archived record of a closed term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermClosing {
    pub term: Term,
    pub unpaid_balance: Money,
    /// credit left on the account when the term closed
    pub carried_credit: Money,
    pub closed_at: DateTime<Utc>,
    pub fee_lines: Vec<FeeLine>,
    pub transactions: Vec<PaymentTransaction>,
    pub credit_applications: Vec<CreditApplication>,
}

impl TermClosing {
    pub fn total_assessed(&self) -> Money {
        let zero = Money::zero(self.unpaid_balance.currency());
        self.fee_lines
            .iter()
            .fold(zero, |acc, l| acc + l.assessed_amount)
    }

    /// completed payments received during the term
    pub fn total_collected(&self) -> Money {
        let zero = Money::zero(self.unpaid_balance.currency());
        self.transactions
            .iter()
            .filter(|t| t.is_completed())
            .fold(zero, |acc, t| acc + t.amount)
    }

    pub fn is_settled(&self) -> bool {
        self.unpaid_balance.is_zero()
    }
}
