use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::StudentAccount;
use crate::types::StudentId;

/// point-in-time copy of an account, taken before a mutation so it can be undone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub snapshot_id: Uuid,
    pub student_id: StudentId,
    pub timestamp: DateTime<Utc>,
    pub account: StudentAccount,
    pub trigger: String,
}

impl AccountSnapshot {
    pub fn capture(
        account: &StudentAccount,
        trigger: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            student_id: account.student_id.clone(),
            timestamp,
            account: account.clone(),
            trigger: trigger.into(),
        }
    }

    /// the account as it was when captured
    pub fn restore(self) -> StudentAccount {
        self.account
    }
}
