/// payment plan - down payment, monthly installments and where payments land
use tuition_ledger_rs::{
    BillingConfig, FeeCatalog, Grade, Money, PaymentLedger, PaymentMethod, PaymentSubmission,
    Percent, SafeTimeProvider, Semester, Strand, Student, StudentAccount, Term, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== payment plan example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();
    let config = BillingConfig::senior_high_default();

    let student = Student {
        student_id: "2024-0002".to_string(),
        name: "Maria Santos".to_string(),
        grade: Grade::Grade12,
        strand: Strand::Abm,
    };

    let plan = config.monthly_plan(5, Percent::from_whole(20))?;
    let mut account = StudentAccount::assess(
        &student,
        &FeeCatalog::senior_high_default(),
        Term::new(2024, Semester::First),
        Some(plan),
        time.now().date_naive(),
    )?;

    println!("assessed: {}", account.total_assessed());
    for inst in account.schedule()? {
        println!("  #{:<2} due {}  {}", inst.number, inst.due_date, inst.amount_due);
    }

    // down payment on enrollment day
    let down = PaymentSubmission::new(Money::php(9_000), PaymentMethod::Cash, &time)
        .into_transaction(&student.student_id);
    PaymentLedger::with_policy(&mut account, config.partial_payments).apply(down)?;

    // first installment a month later
    controller.advance(Duration::days(30));
    let first = PaymentSubmission::new(Money::php(7_200), PaymentMethod::BankTransfer, &time)
        .with_reference("BT-987654321")
        .into_transaction(&student.student_id);
    let result = PaymentLedger::with_policy(&mut account, config.partial_payments).apply(first)?;

    println!("\npayment {} applied:", result.tx_id);
    for allocation in &result.allocations {
        println!("  {:<12} {}", allocation.fee_id, allocation.amount);
    }
    println!("balance: {} -> {}", result.balance_before, result.balance_after);

    println!("\ninstallments:");
    for inst in account.installment_status()? {
        println!(
            "  #{:<2} due {}  paid {}  remaining {}",
            inst.number, inst.due_date, inst.paid, inst.remaining
        );
    }

    Ok(())
}
