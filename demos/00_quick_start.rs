/// quick start - assess a student, take a payment, print the balance
use tuition_ledger_rs::{
    AccountView, FeeCatalog, Grade, Money, PaymentLedger, PaymentMethod, PaymentSubmission,
    SafeTimeProvider, Semester, Strand, Student, StudentAccount, Term, TimeSource,
};
use chrono::{TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
    ));

    let student = Student {
        student_id: "2024-0001".to_string(),
        name: "John Doe".to_string(),
        grade: Grade::Grade11,
        strand: Strand::Stem,
    };

    // assess against the default senior high fee structure
    let mut account = StudentAccount::assess(
        &student,
        &FeeCatalog::senior_high_default(),
        Term::new(2024, Semester::First),
        None,
        time.now().date_naive(),
    )?;

    // pay part of it through gcash
    let payment = PaymentSubmission::new(Money::php(15_000), PaymentMethod::GCash, &time)
        .into_transaction(&student.student_id);
    PaymentLedger::new(&mut account).apply(payment)?;

    let view = AccountView::from_account(&account, time.now().date_naive(), 7)?;
    println!("{}", view.to_json_pretty()?);

    Ok(())
}
