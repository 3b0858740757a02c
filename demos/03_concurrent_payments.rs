/// concurrent payments - many channels posting to the same book
use std::sync::Arc;
use std::thread;

use tuition_ledger_rs::{
    AccountBook, BillingConfig, CollectionSummary, Currency, FeeCatalog, Grade,
    InMemoryRepository, Money, PaymentMethod, PaymentSubmission, SafeTimeProvider, Semester,
    Strand, Student, Term, TimeSource,
};
use chrono::{NaiveDate, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info,tuition_ledger_rs=info")
        .init();

    let book = Arc::new(AccountBook::new(
        InMemoryRepository::new(),
        BillingConfig::senior_high_default(),
    ));
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    for i in 1..=3 {
        let student = Student {
            student_id: format!("2024-000{}", i),
            name: format!("Student {}", i),
            grade: Grade::Grade12,
            strand: Strand::Stem,
        };
        book.open_account(
            &student,
            &FeeCatalog::senior_high_default(),
            Term::new(2024, Semester::First),
            None,
            start,
        )?;
    }

    let methods = [
        PaymentMethod::GCash,
        PaymentMethod::BankTransfer,
        PaymentMethod::CreditCard,
        PaymentMethod::Cash,
    ];

    let handles: Vec<_> = methods
        .into_iter()
        .map(|method| {
            let book = Arc::clone(&book);
            thread::spawn(move || {
                let time = SafeTimeProvider::new(TimeSource::Test(
                    Utc.with_ymd_and_hms(2024, 6, 5, 10, 0, 0).unwrap(),
                ));
                for student_id in book.student_ids() {
                    let submission = PaymentSubmission::new(Money::php(6_000), method, &time);
                    if let Err(err) = book.submit_payment(&student_id, submission) {
                        eprintln!("{} via {}: {}", student_id, method, err);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().map_err(|_| "payment thread panicked")?;
    }

    let summary = CollectionSummary::from_accounts(&book.accounts()?, Currency::Php)?;
    println!("{}", summary.to_json_pretty()?);

    Ok(())
}
