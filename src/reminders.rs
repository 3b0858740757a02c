use chrono::{Duration, NaiveDate};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::account::{InstallmentStatus, StudentAccount};
use crate::config::BillingConfig;
use crate::decimal::Money;
use crate::errors::Result;
use crate::types::StudentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReminderKind {
    UpcomingDue,
    Overdue,
}

/// a reminder to send for one installment on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderEvent {
    pub student_id: StudentId,
    pub installment: u32,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub remaining: Money,
    pub kind: ReminderKind,
    pub as_of: NaiveDate,
}

/// derives due and overdue reminders from account schedules
pub struct ReminderScheduler;

impl ReminderScheduler {
    /// Reminders for `as_of`, at most one per account and installment.
    ///
    /// Pure: calling twice with the same inputs gives the same list, sorted
    /// by student then installment.
    pub fn due_reminders<'a>(
        accounts: impl IntoIterator<Item = &'a StudentAccount>,
        as_of: NaiveDate,
        lead_days: u32,
        grace_days: u32,
    ) -> Result<Vec<ReminderEvent>> {
        let mut events = Vec::new();
        for account in accounts {
            events.extend(Self::for_account(account, as_of, lead_days, grace_days)?);
        }
        sort(&mut events);
        Ok(events)
    }

    /// Reminders for today per the billing configuration.
    ///
    /// Each account uses the grace period of its plan's schedule.
    pub fn due_reminders_today<'a>(
        accounts: impl IntoIterator<Item = &'a StudentAccount>,
        time_provider: &SafeTimeProvider,
        config: &BillingConfig,
    ) -> Result<Vec<ReminderEvent>> {
        if !config.reminders.enabled {
            return Ok(Vec::new());
        }

        let today = time_provider.now().date_naive();
        let mut events = Vec::new();
        let mut scanned = 0usize;

        for account in accounts {
            let grace = config.grace_days_for(account.plan());
            events.extend(Self::for_account(
                account,
                today,
                config.reminders.lead_days,
                grace,
            )?);
            scanned += 1;
        }
        sort(&mut events);

        debug!(
            as_of = %today,
            accounts = scanned,
            reminders = events.len(),
            "reminder scan complete"
        );

        Ok(events)
    }

    /// reminders for a single account
    pub fn for_account(
        account: &StudentAccount,
        as_of: NaiveDate,
        lead_days: u32,
        grace_days: u32,
    ) -> Result<Vec<ReminderEvent>> {
        Ok(account
            .installment_status()?
            .into_iter()
            .filter(|inst| !inst.is_settled())
            .filter_map(|inst| {
                classify(&inst, as_of, lead_days, grace_days).map(|kind| ReminderEvent {
                    student_id: account.student_id.clone(),
                    installment: inst.number,
                    due_date: inst.due_date,
                    amount_due: inst.amount_due,
                    remaining: inst.remaining,
                    kind,
                    as_of,
                })
            })
            .collect())
    }
}

fn classify(
    inst: &InstallmentStatus,
    as_of: NaiveDate,
    lead_days: u32,
    grace_days: u32,
) -> Option<ReminderKind> {
    let due = inst.due_date;
    let lead_start = due - Duration::days(i64::from(lead_days));
    let grace_end = due + Duration::days(i64::from(grace_days));

    if as_of >= grace_end {
        Some(ReminderKind::Overdue)
    } else if lead_start <= as_of && as_of < due {
        Some(ReminderKind::UpcomingDue)
    } else {
        None
    }
}

fn sort(events: &mut [ReminderEvent]) {
    events.sort_by(|a, b| {
        a.student_id
            .cmp(&b.student_id)
            .then(a.installment.cmp(&b.installment))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Percent;
    use crate::fees::FeeLine;
    use crate::payments::PaymentPlan;
    use crate::types::{Grade, Semester, Strand, Student, Term};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn account(id: &str) -> StudentAccount {
        let student = Student {
            student_id: id.to_string(),
            name: "Student".to_string(),
            grade: Grade::Grade12,
            strand: Strand::Ict,
        };
        let plan = PaymentPlan::monthly(2, Percent::ZERO).unwrap();
        StudentAccount::open(
            &student,
            Term::new(2024, Semester::First),
            vec![FeeLine::new("tuition", "Tuition", Money::php(20_000), true)],
            Some(plan),
            start(),
        )
        .unwrap()
    }

    #[test]
    fn test_upcoming_window() {
        let accounts = vec![account("2024-0001")];
        let due = start() + Duration::days(30);

        let before = ReminderScheduler::due_reminders(&accounts, due - Duration::days(4), 3, 7).unwrap();
        assert!(before.is_empty());

        let first_day = ReminderScheduler::due_reminders(&accounts, due - Duration::days(3), 3, 7).unwrap();
        assert_eq!(first_day.len(), 1);
        assert_eq!(first_day[0].kind, ReminderKind::UpcomingDue);

        // on the due date itself, inside grace: nothing
        let on_due = ReminderScheduler::due_reminders(&accounts, due, 3, 7).unwrap();
        assert!(on_due.is_empty());
    }

    #[test]
    fn test_overdue_exactly_at_grace_end() {
        let accounts = vec![account("2024-0001")];
        let due = start() + Duration::days(30);

        let events = ReminderScheduler::due_reminders(&accounts, due + Duration::days(7), 3, 7).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ReminderKind::Overdue);
        assert_eq!(events[0].installment, 1);
        assert_eq!(events[0].remaining, Money::php(10_000));
    }

    #[test]
    fn test_sorted_by_student_then_installment() {
        let accounts = vec![account("2024-0002"), account("2024-0001")];
        // first installment overdue, second inside its lead window
        let as_of = start() + Duration::days(58);

        let events = ReminderScheduler::due_reminders(&accounts, as_of, 3, 7).unwrap();
        let keys: Vec<(&str, u32)> = events
            .iter()
            .map(|e| (e.student_id.as_str(), e.installment))
            .collect();
        assert_eq!(
            keys,
            vec![("2024-0001", 1), ("2024-0001", 2), ("2024-0002", 1), ("2024-0002", 2)]
        );
    }

    #[test]
    fn test_disabled_reminders() {
        let accounts = vec![account("2024-0001")];
        let mut config = BillingConfig::senior_high_default();
        config.reminders.enabled = false;

        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::Test(
            chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2024, 8, 1, 0, 0, 0).unwrap(),
        ));
        assert!(ReminderScheduler::due_reminders_today(&accounts, &time, &config)
            .unwrap()
            .is_empty());
    }
}
