use thiserror::Error;
use uuid::Uuid;

use crate::decimal::{Currency, Money};
use crate::types::{StudentId, TransactionStatus};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("negative result: {minuend} - {subtrahend} would go below zero")]
    NegativeResult {
        minuend: Money,
        subtrahend: Money,
    },

    #[error("missing required fee: {fee_id}")]
    MissingRequiredFee {
        fee_id: String,
    },

    #[error("invalid plan parameters: {message}")]
    InvalidPlanParameters {
        message: String,
    },

    #[error("no assessable fees on account {student_id}")]
    NoAssessableFees {
        student_id: StudentId,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("transaction {tx_id} is not pending: current status is {status:?}")]
    TransactionNotPending {
        tx_id: Uuid,
        status: TransactionStatus,
    },

    #[error("duplicate transaction id: {tx_id}")]
    DuplicateTransaction {
        tx_id: Uuid,
    },

    #[error("transaction not found: {tx_id}")]
    TransactionNotFound {
        tx_id: Uuid,
    },

    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        expected: Currency,
        found: Currency,
    },

    #[error("payment less than minimum: minimum {minimum}, provided {provided}")]
    PaymentBelowMinimum {
        minimum: Money,
        provided: Money,
    },

    #[error("partial payments are disabled: balance {balance}, provided {provided}")]
    PartialPaymentsDisabled {
        balance: Money,
        provided: Money,
    },

    #[error("late payments are disabled: {student_id} has {overdue} overdue")]
    LatePaymentsDisabled {
        student_id: StudentId,
        overdue: Money,
    },

    #[error("account not found: {student_id}")]
    AccountNotFound {
        student_id: StudentId,
    },

    #[error("account already registered: {student_id}")]
    AccountExists {
        student_id: StudentId,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("persistence failure: {message}")]
    Persistence {
        message: String,
    },

    #[error("account lock poisoned: {student_id}")]
    LockPoisoned {
        student_id: StudentId,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
