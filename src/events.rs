use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::payments::Allocation;
use crate::types::{PaymentMethod, StudentId, Term, TxId};

/// audit events emitted by account operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // assessment events
    FeesAssessed {
        student_id: StudentId,
        term: Term,
        line_count: usize,
        total_assessed: Money,
    },
    LateFeeAssessed {
        student_id: StudentId,
        fee_id: String,
        installment: u32,
        amount: Money,
        due_date: NaiveDate,
        days_overdue: u32,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        student_id: StudentId,
        tx_id: TxId,
        amount: Money,
        method: PaymentMethod,
        reference: String,
        timestamp: DateTime<Utc>,
    },
    PaymentApplied {
        student_id: StudentId,
        tx_id: TxId,
        amount: Money,
        allocations: Vec<Allocation>,
        balance_after: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentFailed {
        student_id: StudentId,
        tx_id: TxId,
        amount: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    PaymentRolledBack {
        student_id: StudentId,
        tx_id: TxId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    TransactionAnnotated {
        student_id: StudentId,
        tx_id: TxId,
        note: String,
        timestamp: DateTime<Utc>,
    },

    // credit events
    CreditRecorded {
        student_id: StudentId,
        tx_id: TxId,
        amount: Money,
        credit_balance: Money,
        timestamp: DateTime<Utc>,
    },
    CreditApplied {
        student_id: StudentId,
        amount: Money,
        allocations: Vec<Allocation>,
        credit_balance: Money,
        timestamp: DateTime<Utc>,
    },

    // term events
    TermClosed {
        student_id: StudentId,
        term: Term,
        unpaid_balance: Money,
        carried_credit: Money,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn student_id(&self) -> &str {
        match self {
            Event::FeesAssessed { student_id, .. }
            | Event::LateFeeAssessed { student_id, .. }
            | Event::PaymentRecorded { student_id, .. }
            | Event::PaymentApplied { student_id, .. }
            | Event::PaymentFailed { student_id, .. }
            | Event::PaymentRolledBack { student_id, .. }
            | Event::TransactionAnnotated { student_id, .. }
            | Event::CreditRecorded { student_id, .. }
            | Event::CreditApplied { student_id, .. }
            | Event::TermClosed { student_id, .. } => student_id,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
