use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decimal::{Currency, Money, NetPosition};
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::fees::{self, FeeCatalog, FeeLine};
use crate::payments::{
    allocation_order, CreditApplication, PaymentPlan, PaymentTransaction, ScheduledInstallment,
    TermClosing,
};
use crate::types::{FeeKind, Grade, Strand, Student, StudentId, Term, TransactionStatus, TxId};

/// per-fee balance breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBalance {
    pub fee_id: String,
    pub name: String,
    pub kind: FeeKind,
    pub required: bool,
    pub assessed: Money,
    pub paid: Money,
    pub remaining: Money,
    pub due_installment: u32,
    pub due_date: NaiveDate,
}

/// an installment with how much of it has been covered so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentStatus {
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub paid: Money,
    pub remaining: Money,
}

impl InstallmentStatus {
    pub fn is_settled(&self) -> bool {
        self.remaining.is_zero()
    }
}

/// A student's assessment, plan and payment history for the current term.
///
/// Balances are never stored: they are derived from the fee lines and the
/// completed transactions each time they are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAccount {
    pub student_id: StudentId,
    pub student_name: String,
    pub grade: Grade,
    pub strand: Strand,
    pub term: Term,
    pub currency: Currency,
    pub schedule_start: NaiveDate,
    fee_lines: Vec<FeeLine>,
    plan: Option<PaymentPlan>,
    transactions: Vec<PaymentTransaction>,
    credit_applications: Vec<CreditApplication>,
    credit: Money,
    closed_terms: Vec<TermClosing>,
    #[serde(skip)]
    pub events: EventStore,
}

impl StudentAccount {
    /// open an account from already assessed fee lines
    pub fn open(
        student: &Student,
        term: Term,
        fee_lines: Vec<FeeLine>,
        plan: Option<PaymentPlan>,
        schedule_start: NaiveDate,
    ) -> Result<Self> {
        let currency = fee_lines
            .first()
            .map(|l| l.assessed_amount.currency())
            .unwrap_or_default();

        validate_lines(&fee_lines, currency)?;
        validate_plan(plan.as_ref())?;

        let mut account = Self {
            student_id: student.student_id.clone(),
            student_name: student.name.clone(),
            grade: student.grade,
            strand: student.strand,
            term,
            currency,
            schedule_start,
            fee_lines,
            plan,
            transactions: Vec::new(),
            credit_applications: Vec::new(),
            credit: Money::zero(currency),
            closed_terms: Vec::new(),
            events: EventStore::new(),
        };

        account.events.emit(Event::FeesAssessed {
            student_id: account.student_id.clone(),
            term,
            line_count: account.fee_lines.len(),
            total_assessed: account.total_assessed(),
        });

        info!(
            student_id = %account.student_id,
            term = %term,
            total = %account.total_assessed(),
            "account opened"
        );

        Ok(account)
    }

    /// assess from the catalog and open the account
    pub fn assess(
        student: &Student,
        catalog: &FeeCatalog,
        term: Term,
        plan: Option<PaymentPlan>,
        schedule_start: NaiveDate,
    ) -> Result<Self> {
        let lines = fees::assess(student, catalog, term)?;
        Self::open(student, term, lines, plan, schedule_start)
    }

    /// enrollment record the account was opened for
    pub fn student(&self) -> Student {
        Student {
            student_id: self.student_id.clone(),
            name: self.student_name.clone(),
            grade: self.grade,
            strand: self.strand,
        }
    }

    pub fn fee_lines(&self) -> &[FeeLine] {
        &self.fee_lines
    }

    pub fn plan(&self) -> Option<&PaymentPlan> {
        self.plan.as_ref()
    }

    pub fn transactions(&self) -> &[PaymentTransaction] {
        &self.transactions
    }

    pub fn credit_applications(&self) -> &[CreditApplication] {
        &self.credit_applications
    }

    pub fn closed_terms(&self) -> &[TermClosing] {
        &self.closed_terms
    }

    /// overpayment held for the student
    pub fn credit_balance(&self) -> Money {
        self.credit
    }

    pub fn find_transaction(&self, tx_id: TxId) -> Option<&PaymentTransaction> {
        self.transactions.iter().find(|t| t.tx_id == tx_id)
    }

    fn zero(&self) -> Money {
        Money::zero(self.currency)
    }

    pub fn total_assessed(&self) -> Money {
        self.fee_lines
            .iter()
            .fold(self.zero(), |acc, l| acc + l.assessed_amount)
    }

    /// amount applied to one fee line by completed payments and credit
    pub fn paid_on_line(&self, fee_id: &str) -> Money {
        let from_payments = self
            .transactions
            .iter()
            .filter(|t| t.status() == TransactionStatus::Completed)
            .fold(self.zero(), |acc, t| acc + t.applied_to_fee(fee_id));

        let from_credit = self
            .credit_applications
            .iter()
            .fold(self.zero(), |acc, c| acc + c.applied_to_fee(fee_id));

        from_payments + from_credit
    }

    /// remaining per fee line, aligned with `fee_lines()`
    pub fn line_remaining(&self) -> Vec<Money> {
        self.fee_lines
            .iter()
            .map(|l| l.assessed_amount.saturating_sub(self.paid_on_line(&l.fee_id)))
            .collect()
    }

    pub fn remaining_for(&self, fee_id: &str) -> Option<Money> {
        self.fee_lines
            .iter()
            .find(|l| l.fee_id == fee_id)
            .map(|l| l.assessed_amount.saturating_sub(self.paid_on_line(&l.fee_id)))
    }

    /// total applied to fee lines
    pub fn total_paid(&self) -> Money {
        self.fee_lines
            .iter()
            .fold(self.zero(), |acc, l| acc + self.paid_on_line(&l.fee_id))
    }

    /// total of completed payments, including any part that became credit
    pub fn total_received(&self) -> Money {
        self.transactions
            .iter()
            .filter(|t| t.is_completed())
            .fold(self.zero(), |acc, t| acc + t.amount)
    }

    /// outstanding balance; always equals the sum of line remainders
    pub fn balance(&self) -> Money {
        self.line_remaining()
            .into_iter()
            .fold(self.zero(), |acc, r| acc + r)
    }

    /// balance net of stored credit
    pub fn net_position(&self) -> Result<NetPosition> {
        self.balance().subtract_allowing_credit(self.credit)
    }

    /// total the installment schedule is generated from; late fees excluded
    pub fn scheduled_total(&self) -> Money {
        self.fee_lines
            .iter()
            .filter(|l| l.kind == FeeKind::Assessed)
            .fold(self.zero(), |acc, l| acc + l.assessed_amount)
    }

    /// due schedule; without a plan the whole assessment is due on the start date
    pub fn schedule(&self) -> Result<Vec<ScheduledInstallment>> {
        match &self.plan {
            Some(plan) => plan.generate_schedule(self.scheduled_total(), self.schedule_start),
            None => Ok(vec![ScheduledInstallment {
                number: 0,
                due_date: self.schedule_start,
                amount_due: self.scheduled_total(),
            }]),
        }
    }

    /// installments filled in order by what has been paid toward assessed fees
    pub fn installment_status(&self) -> Result<Vec<InstallmentStatus>> {
        let schedule = self.schedule()?;

        let mut available = self
            .fee_lines
            .iter()
            .filter(|l| l.kind == FeeKind::Assessed)
            .fold(self.zero(), |acc, l| acc + self.paid_on_line(&l.fee_id));

        Ok(schedule
            .into_iter()
            .map(|inst| {
                let paid = available.min(inst.amount_due);
                available = available.saturating_sub(paid);
                InstallmentStatus {
                    number: inst.number,
                    due_date: inst.due_date,
                    amount_due: inst.amount_due,
                    paid,
                    remaining: inst.amount_due.saturating_sub(paid),
                }
            })
            .collect())
    }

    /// earliest installment that still has something due
    pub fn next_due(&self) -> Result<Option<InstallmentStatus>> {
        Ok(self
            .installment_status()?
            .into_iter()
            .find(|i| !i.is_settled()))
    }

    /// unpaid installments whose grace period has run out on `as_of`
    pub fn overdue_installments(
        &self,
        as_of: NaiveDate,
        grace_days: u32,
    ) -> Result<Vec<InstallmentStatus>> {
        Ok(self
            .installment_status()?
            .into_iter()
            .filter(|i| !i.is_settled())
            .filter(|i| as_of >= i.due_date + chrono::Duration::days(i64::from(grace_days)))
            .collect())
    }

    /// Installment number each fee line falls due with, aligned with `fee_lines()`.
    ///
    /// An explicit `due_installment` wins. Otherwise the line's position in
    /// the assessed total is located in the cumulative schedule.
    pub fn due_installments(&self) -> Result<Vec<u32>> {
        let schedule = self.schedule()?;
        let last = schedule.last().map(|i| i.number).unwrap_or(0);

        let mut offset: u64 = 0;
        let mut ranks = Vec::with_capacity(self.fee_lines.len());

        for line in &self.fee_lines {
            let rank = match line.due_installment {
                Some(n) => n,
                None => {
                    let mut cumulative: u64 = 0;
                    schedule
                        .iter()
                        .find(|inst| {
                            cumulative += inst.amount_due.minor_units();
                            cumulative > offset
                        })
                        .map(|inst| inst.number)
                        .unwrap_or(last)
                }
            };
            ranks.push(rank);

            if line.kind == FeeKind::Assessed {
                offset += line.assessed_amount.minor_units();
            }
        }

        Ok(ranks)
    }

    /// fee line indices in the order payments are applied
    pub fn allocation_order(&self) -> Result<Vec<usize>> {
        let ranks = self.due_installments()?;
        Ok(allocation_order(&self.fee_lines, &ranks))
    }

    /// per-fee breakdown for the balance screen
    pub fn line_balances(&self) -> Result<Vec<LineBalance>> {
        let schedule = self.schedule()?;
        let ranks = self.due_installments()?;

        Ok(self
            .fee_lines
            .iter()
            .zip(ranks)
            .map(|(line, rank)| {
                let paid = self.paid_on_line(&line.fee_id);
                // a rank past the schedule falls due with the last installment
                let due_date = schedule
                    .iter()
                    .find(|i| i.number == rank)
                    .or_else(|| schedule.last())
                    .map(|i| i.due_date)
                    .unwrap_or(self.schedule_start);
                LineBalance {
                    fee_id: line.fee_id.clone(),
                    name: line.name.clone(),
                    kind: line.kind,
                    required: line.required,
                    assessed: line.assessed_amount,
                    paid,
                    remaining: line.assessed_amount.saturating_sub(paid),
                    due_installment: rank,
                    due_date,
                }
            })
            .collect())
    }

    pub fn has_late_fee_for(&self, installment: u32) -> bool {
        self.fee_lines
            .iter()
            .any(|l| l.kind == FeeKind::LateFee && l.due_installment == Some(installment))
    }

    /// switch to another plan; the schedule is regenerated on next read
    pub fn change_plan(&mut self, plan: Option<PaymentPlan>) -> Result<()> {
        validate_plan(plan.as_ref())?;
        debug!(
            student_id = %self.student_id,
            plan = plan.as_ref().map(|p| p.name.as_str()).unwrap_or("none"),
            "plan changed"
        );
        self.plan = plan;
        Ok(())
    }

    /// Archive the current term's lines and payments.
    ///
    /// Pending transactions must be resolved first. Stored credit stays on
    /// the account for the next assessment.
    pub fn close_term(&mut self, closed_at: DateTime<Utc>) -> Result<TermClosing> {
        if let Some(pending) = self
            .transactions
            .iter()
            .find(|t| t.status() == TransactionStatus::Pending)
        {
            return Err(LedgerError::InvalidConfiguration {
                message: format!(
                    "pending transaction {} must be resolved before closing {}",
                    pending.tx_id, self.term
                ),
            });
        }

        let closing = TermClosing {
            term: self.term,
            unpaid_balance: self.balance(),
            carried_credit: self.credit,
            closed_at,
            fee_lines: std::mem::take(&mut self.fee_lines),
            transactions: std::mem::take(&mut self.transactions),
            credit_applications: std::mem::take(&mut self.credit_applications),
        };

        self.events.emit(Event::TermClosed {
            student_id: self.student_id.clone(),
            term: closing.term,
            unpaid_balance: closing.unpaid_balance,
            carried_credit: closing.carried_credit,
            timestamp: closed_at,
        });

        info!(
            student_id = %self.student_id,
            term = %closing.term,
            unpaid = %closing.unpaid_balance,
            credit = %closing.carried_credit,
            "term closed"
        );

        self.closed_terms.push(closing.clone());
        Ok(closing)
    }

    /// start a new term on a closed account
    pub fn open_term(
        &mut self,
        term: Term,
        fee_lines: Vec<FeeLine>,
        plan: Option<PaymentPlan>,
        schedule_start: NaiveDate,
    ) -> Result<()> {
        if !self.fee_lines.is_empty() || !self.transactions.is_empty() {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("term {} must be closed before opening {}", self.term, term),
            });
        }

        validate_lines(&fee_lines, self.currency)?;
        validate_plan(plan.as_ref())?;

        self.term = term;
        self.fee_lines = fee_lines;
        self.plan = plan;
        self.schedule_start = schedule_start;

        self.events.emit(Event::FeesAssessed {
            student_id: self.student_id.clone(),
            term,
            line_count: self.fee_lines.len(),
            total_assessed: self.total_assessed(),
        });

        Ok(())
    }

    pub(crate) fn contains_transaction(&self, tx_id: TxId) -> bool {
        self.transactions.iter().any(|t| t.tx_id == tx_id)
    }

    pub(crate) fn push_transaction(&mut self, tx: PaymentTransaction) {
        self.transactions.push(tx);
    }

    pub(crate) fn transaction_mut(&mut self, tx_id: TxId) -> Option<&mut PaymentTransaction> {
        self.transactions.iter_mut().find(|t| t.tx_id == tx_id)
    }

    /// replace the stored credit with a balance computed by the caller
    pub(crate) fn set_credit(&mut self, credit: Money) {
        self.credit = credit;
    }

    pub(crate) fn record_credit_application(&mut self, application: CreditApplication) -> Result<()> {
        self.credit = self.credit.subtract(application.amount)?;
        self.credit_applications.push(application);
        Ok(())
    }

    pub(crate) fn add_fee_line(&mut self, line: FeeLine) -> Result<()> {
        let mut lines = self.fee_lines.clone();
        lines.push(line);
        validate_lines(&lines, self.currency)?;
        self.fee_lines = lines;
        Ok(())
    }
}

fn validate_lines(lines: &[FeeLine], currency: Currency) -> Result<()> {
    let mut ids = BTreeSet::new();
    for line in lines {
        if !ids.insert(line.fee_id.as_str()) {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("duplicate fee line: {}", line.fee_id),
            });
        }
        if line.assessed_amount.currency() != currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: currency,
                found: line.assessed_amount.currency(),
            });
        }
    }
    Ok(())
}

fn validate_plan(plan: Option<&PaymentPlan>) -> Result<()> {
    if let Some(plan) = plan {
        plan.validate()?;
        if !plan.active {
            return Err(LedgerError::InvalidPlanParameters {
                message: format!("plan {} is not active", plan.name),
            });
        }
    }
    Ok(())
}
