//! Shared fixtures for integration tests.

use std::sync::Once;

use chrono::{NaiveDate, TimeZone, Utc};
use tuition_ledger_rs::{
    FeeCatalog, Grade, SafeTimeProvider, Semester, Strand, Student, StudentAccount, Term,
    TimeSource,
};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,tuition_ledger_rs=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn student(id: &str, strand: Strand) -> Student {
    Student {
        student_id: id.to_string(),
        name: format!("Student {}", id),
        grade: Grade::Grade11,
        strand,
    }
}

pub fn first_semester() -> Term {
    Term::new(2024, Semester::First)
}

pub fn term_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

pub fn clock(year: i32, month: u32, day: u32) -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap(),
    ))
}

/// STEM student on the default catalog without a plan
pub fn stem_account(id: &str) -> StudentAccount {
    StudentAccount::assess(
        &student(id, Strand::Stem),
        &FeeCatalog::senior_high_default(),
        first_semester(),
        None,
        term_start(),
    )
    .unwrap()
}
