pub mod account;
pub mod book;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod fees;
pub mod payments;
pub mod reminders;
pub mod reports;
pub mod state;
pub mod types;
pub mod views;

// re-export key types
pub use account::{InstallmentStatus, LineBalance, StudentAccount};
pub use book::{AccountBook, AccountRepository, InMemoryRepository};
pub use config::{BillingConfig, ReminderConfig, ScheduleSetting};
pub use decimal::{Currency, Money, NetPosition, Percent};
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use fees::{assess, FeeCatalog, FeeDefinition, FeeLine, LateFeeEngine, LateFeePolicy};
pub use payments::{
    Allocation, AllocationResult, CreditApplication, PaymentLedger, PaymentPlan, PaymentPolicy,
    PaymentSubmission, PaymentTransaction, ScheduledInstallment, TermClosing,
};
pub use reminders::{ReminderEvent, ReminderKind, ReminderScheduler};
pub use reports::CollectionSummary;
pub use state::AccountSnapshot;
pub use types::{
    FeeId, FeeKind, Grade, PaymentMethod, Semester, Strand, Student, StudentId, Term,
    TransactionStatus, TxId,
};
pub use views::AccountView;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
