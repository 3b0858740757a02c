/// reminders - daily reminder scan and late fees with controlled time
use tuition_ledger_rs::{
    AccountBook, BillingConfig, FeeCatalog, Grade, InMemoryRepository, Percent,
    SafeTimeProvider, Semester, Strand, Student, Term, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== reminders example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let config = BillingConfig::senior_high_default();
    let book = AccountBook::new(InMemoryRepository::new(), config.clone());

    let students = [
        ("2024-0001", Strand::Stem),
        ("2024-0002", Strand::Ict),
    ];
    for (id, strand) in students {
        let student = Student {
            student_id: id.to_string(),
            name: format!("Student {}", id),
            grade: Grade::Grade11,
            strand,
        };
        book.open_account(
            &student,
            &FeeCatalog::senior_high_default(),
            Term::new(2024, Semester::First),
            Some(config.monthly_plan(4, Percent::ZERO)?),
            time.now().date_naive(),
        )?;
    }

    // walk through the first six weeks one week at a time
    for _ in 0..6 {
        controller.advance(Duration::days(7));
        let today = time.now().date_naive();

        for reminder in book.due_reminders(&time)? {
            println!(
                "{}  {}  installment {} due {}  {:?}  remaining {}",
                today,
                reminder.student_id,
                reminder.installment,
                reminder.due_date,
                reminder.kind,
                reminder.remaining
            );
        }

        for (student_id, line) in book.apply_late_fees(time.now())? {
            println!("{}  {}  charged {} ({})", today, student_id, line.assessed_amount, line.name);
        }
    }

    Ok(())
}
