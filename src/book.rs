use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, warn};

use crate::account::StudentAccount;
use crate::config::BillingConfig;
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::fees::{self, FeeCatalog, FeeLine, LateFeeEngine};
use crate::payments::{
    AllocationResult, CreditApplication, PaymentLedger, PaymentPlan, PaymentSubmission,
    TermClosing,
};
use crate::reminders::{ReminderEvent, ReminderScheduler};
use crate::state::AccountSnapshot;
use crate::types::{StudentId, Term};

/// persistence boundary for accounts
pub trait AccountRepository: Send + Sync {
    fn save_account(&self, account: &StudentAccount) -> Result<()>;

    fn load_account(&self, student_id: &str) -> Result<Option<StudentAccount>>;
}

/// keeps accounts as JSON documents in memory
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    documents: DashMap<StudentId, String>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl AccountRepository for InMemoryRepository {
    fn save_account(&self, account: &StudentAccount) -> Result<()> {
        let json = serde_json::to_string(account)?;
        self.documents.insert(account.student_id.clone(), json);
        Ok(())
    }

    fn load_account(&self, student_id: &str) -> Result<Option<StudentAccount>> {
        match self.documents.get(student_id) {
            Some(doc) => Ok(Some(serde_json::from_str(doc.value())?)),
            None => Ok(None),
        }
    }
}

type AccountHandle = Arc<Mutex<StudentAccount>>;

/// All student accounts with one lock per account.
///
/// Operations on one account are serialized; different accounts proceed
/// in parallel. Every mutation is persisted through the repository and
/// rolled back in memory if saving fails.
pub struct AccountBook<R: AccountRepository> {
    accounts: DashMap<StudentId, AccountHandle>,
    repository: R,
    config: BillingConfig,
}

impl<R: AccountRepository> AccountBook<R> {
    pub fn new(repository: R, config: BillingConfig) -> Self {
        Self {
            accounts: DashMap::new(),
            repository,
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn student_ids(&self) -> Vec<StudentId> {
        let mut ids: Vec<StudentId> = self.accounts.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// assess, persist and register a new account
    pub fn open_account(
        &self,
        student: &crate::types::Student,
        catalog: &FeeCatalog,
        term: Term,
        plan: Option<PaymentPlan>,
        schedule_start: NaiveDate,
    ) -> Result<()> {
        let account = StudentAccount::assess(student, catalog, term, plan, schedule_start)?;
        self.insert(account)
    }

    /// register an account built elsewhere
    pub fn insert(&self, account: StudentAccount) -> Result<()> {
        match self.accounts.entry(account.student_id.clone()) {
            Entry::Occupied(_) => Err(LedgerError::AccountExists {
                student_id: account.student_id,
            }),
            Entry::Vacant(slot) => {
                self.repository
                    .save_account(&account)
                    .map_err(into_persistence)?;
                debug!(student_id = %account.student_id, "account registered");
                slot.insert(Arc::new(Mutex::new(account)));
                Ok(())
            }
        }
    }

    /// Load an account from the repository into the book.
    ///
    /// A registered account is refreshed in place under its own lock, so
    /// operations already waiting on it stay serialized with later ones.
    pub fn load(&self, student_id: &str) -> Result<()> {
        if let Ok(handle) = self.handle(student_id) {
            let mut account = lock(&handle, student_id)?;
            *account = self.fetch(student_id)?;
            debug!(student_id = %student_id, "account refreshed from storage");
            return Ok(());
        }

        let account = self.fetch(student_id)?;
        match self.accounts.entry(student_id.to_string()) {
            // another caller registered it between the lookup and here
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                debug!(student_id = %student_id, "account loaded");
                slot.insert(Arc::new(Mutex::new(account)));
                Ok(())
            }
        }
    }

    fn fetch(&self, student_id: &str) -> Result<StudentAccount> {
        self.repository
            .load_account(student_id)?
            .ok_or_else(|| LedgerError::AccountNotFound {
                student_id: student_id.to_string(),
            })
    }

    /// read an account under its lock
    pub fn with_account<T>(
        &self,
        student_id: &str,
        f: impl FnOnce(&StudentAccount) -> T,
    ) -> Result<T> {
        let handle = self.handle(student_id)?;
        let account = lock(&handle, student_id)?;
        Ok(f(&account))
    }

    /// copy of an account for reporting
    pub fn account(&self, student_id: &str) -> Result<StudentAccount> {
        self.with_account(student_id, |a| a.clone())
    }

    /// copies of every account, ordered by student id
    pub fn accounts(&self) -> Result<Vec<StudentAccount>> {
        self.student_ids()
            .iter()
            .map(|id| self.account(id))
            .collect()
    }

    /// Record and apply a payment under the account lock.
    ///
    /// A business failure still records the transaction as `Failed`. If
    /// saving fails the account is restored to its state before the call.
    pub fn submit_payment(
        &self,
        student_id: &str,
        submission: PaymentSubmission,
    ) -> Result<AllocationResult> {
        let handle = self.handle(student_id)?;
        let mut account = lock(&handle, student_id)?;

        let timestamp = submission.timestamp;
        let snapshot = AccountSnapshot::capture(&account, "payment", timestamp);
        let tx = submission.into_transaction(student_id);
        let tx_id = tx.tx_id;

        let grace = self.config.grace_days_for(account.plan());
        let outcome = PaymentLedger::with_policy(&mut account, self.config.partial_payments)
            .with_grace_days(grace)
            .apply(tx);

        // precondition failures leave nothing to persist
        if outcome.is_err() && !account.contains_transaction(tx_id) {
            return outcome;
        }

        self.persist_or_restore(&mut account, snapshot, tx_id)?;
        outcome
    }

    /// apply stored credit to an account's outstanding balance
    pub fn apply_credit(
        &self,
        student_id: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<Option<CreditApplication>> {
        let handle = self.handle(student_id)?;
        let mut account = lock(&handle, student_id)?;

        let snapshot = AccountSnapshot::capture(&account, "credit", time_provider.now());
        let application = PaymentLedger::new(&mut account).apply_credit(time_provider)?;

        if application.is_some() {
            self.save_or_restore(&mut account, snapshot)?;
        }
        Ok(application)
    }

    /// Charge late fees on every account that has an overdue installment.
    ///
    /// Each account uses the grace period and late fee of its plan's schedule.
    pub fn apply_late_fees(&self, now: DateTime<Utc>) -> Result<Vec<(StudentId, FeeLine)>> {
        let mut charged = Vec::new();

        for student_id in self.student_ids() {
            let handle = self.handle(&student_id)?;
            let mut account = lock(&handle, &student_id)?;

            let engine = LateFeeEngine::new(self.config.late_fee_policy_for(account.plan()));
            let grace = self.config.grace_days_for(account.plan());

            let snapshot = AccountSnapshot::capture(&account, "late fees", now);
            let lines = match engine.apply_late_fees(&mut account, now, grace) {
                Ok(lines) => lines,
                Err(err) => {
                    *account = snapshot.restore();
                    return Err(err);
                }
            };
            if lines.is_empty() {
                continue;
            }

            self.save_or_restore(&mut account, snapshot)?;
            charged.extend(lines.into_iter().map(|l| (student_id.clone(), l)));
        }

        info!(charged = charged.len(), "late fee run complete");
        Ok(charged)
    }

    /// today's reminders across the book
    pub fn due_reminders(&self, time_provider: &SafeTimeProvider) -> Result<Vec<ReminderEvent>> {
        let accounts = self.accounts()?;
        ReminderScheduler::due_reminders_today(&accounts, time_provider, &self.config)
    }

    /// close the current term on one account
    pub fn close_term(&self, student_id: &str, closed_at: DateTime<Utc>) -> Result<TermClosing> {
        let handle = self.handle(student_id)?;
        let mut account = lock(&handle, student_id)?;

        let snapshot = AccountSnapshot::capture(&account, "close term", closed_at);
        let closing = account.close_term(closed_at)?;
        self.save_or_restore(&mut account, snapshot)?;
        Ok(closing)
    }

    /// Reassess a closed account for a new term and draw down carried credit.
    pub fn open_term(
        &self,
        student_id: &str,
        catalog: &FeeCatalog,
        term: Term,
        plan: Option<PaymentPlan>,
        schedule_start: NaiveDate,
        time_provider: &SafeTimeProvider,
    ) -> Result<Option<CreditApplication>> {
        let handle = self.handle(student_id)?;
        let mut account = lock(&handle, student_id)?;

        let snapshot = AccountSnapshot::capture(&account, "open term", time_provider.now());
        let lines = fees::assess(&account.student(), catalog, term)?;
        account.open_term(term, lines, plan, schedule_start)?;

        let applied = PaymentLedger::new(&mut account).apply_credit(time_provider);
        let applied = match applied {
            Ok(applied) => applied,
            Err(err) => {
                *account = snapshot.restore();
                return Err(err);
            }
        };

        self.save_or_restore(&mut account, snapshot)?;
        Ok(applied)
    }

    fn handle(&self, student_id: &str) -> Result<AccountHandle> {
        // clone the handle so the map shard is released before locking
        self.accounts
            .get(student_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::AccountNotFound {
                student_id: student_id.to_string(),
            })
    }

    fn save_or_restore(
        &self,
        account: &mut StudentAccount,
        snapshot: AccountSnapshot,
    ) -> Result<()> {
        if let Err(err) = self.repository.save_account(account) {
            warn!(
                student_id = %account.student_id,
                trigger = %snapshot.trigger,
                error = %err,
                "save failed, restoring snapshot"
            );
            *account = snapshot.restore();
            return Err(into_persistence(err));
        }
        Ok(())
    }

    fn persist_or_restore(
        &self,
        account: &mut StudentAccount,
        snapshot: AccountSnapshot,
        tx_id: crate::types::TxId,
    ) -> Result<()> {
        let timestamp = snapshot.timestamp;
        let result = self.save_or_restore(account, snapshot);

        if let Err(err) = &result {
            account.events.emit(Event::PaymentRolledBack {
                student_id: account.student_id.clone(),
                tx_id,
                reason: err.to_string(),
                timestamp,
            });
        }
        result
    }
}

fn lock<'a>(handle: &'a AccountHandle, student_id: &str) -> Result<MutexGuard<'a, StudentAccount>> {
    handle.lock().map_err(|_| LedgerError::LockPoisoned {
        student_id: student_id.to_string(),
    })
}

fn into_persistence(err: LedgerError) -> LedgerError {
    match err {
        LedgerError::Persistence { .. } => err,
        other => LedgerError::Persistence {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;

    use crate::decimal::Money;
    use crate::types::{Grade, PaymentMethod, Semester, Strand, Student};

    fn student() -> Student {
        Student {
            student_id: "2024-0001".to_string(),
            name: "John Doe".to_string(),
            grade: Grade::Grade11,
            strand: Strand::Stem,
        }
    }

    fn time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
        ))
    }

    fn book() -> AccountBook<InMemoryRepository> {
        let book = AccountBook::new(InMemoryRepository::new(), BillingConfig::senior_high_default());
        book.open_account(
            &student(),
            &FeeCatalog::senior_high_default(),
            Term::new(2024, Semester::First),
            None,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
        .unwrap();
        book
    }

    #[test]
    fn test_open_twice_rejected() {
        let book = book();
        let result = book.open_account(
            &student(),
            &FeeCatalog::senior_high_default(),
            Term::new(2024, Semester::First),
            None,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        );
        assert!(matches!(result, Err(LedgerError::AccountExists { .. })));
    }

    #[test]
    fn test_submit_payment_persists() {
        let book = book();
        let time = time();

        let submission = PaymentSubmission::new(Money::php(10_000), PaymentMethod::GCash, &time);
        book.submit_payment("2024-0001", submission).unwrap();

        let stored = book
            .repository()
            .load_account("2024-0001")
            .unwrap()
            .unwrap();
        assert_eq!(stored.balance(), Money::php(40_000));
    }

    #[test]
    fn test_below_minimum_recorded_as_failed() {
        let book = book();
        let time = time();

        let submission = PaymentSubmission::new(Money::php(1_000), PaymentMethod::Cash, &time);
        let err = book.submit_payment("2024-0001", submission).unwrap_err();
        assert!(matches!(err, LedgerError::PaymentBelowMinimum { .. }));

        let account = book.account("2024-0001").unwrap();
        assert_eq!(account.transactions().len(), 1);
        assert_eq!(account.balance(), Money::php(50_000));
    }

    #[test]
    fn test_unknown_account() {
        let book = book();
        let time = time();
        let submission = PaymentSubmission::new(Money::php(10_000), PaymentMethod::Cash, &time);
        assert!(matches!(
            book.submit_payment("2099-9999", submission),
            Err(LedgerError::AccountNotFound { .. })
        ));
    }
}
