use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{LedgerError, Result};

/// student number as issued by the registrar (e.g. "2024-0001")
pub type StudentId = String;

/// unique identifier for a payment transaction
pub type TxId = Uuid;

/// catalog identifier of a fee (e.g. "tuition", "lab")
pub type FeeId = String;

/// senior high grade level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    Grade11,
    Grade12,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Grade11 => write!(f, "Grade 11"),
            Grade::Grade12 => write!(f, "Grade 12"),
        }
    }
}

/// academic strand
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strand {
    Stem,
    Abm,
    Ict,
    Humss,
    Gas,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strand::Stem => "STEM",
            Strand::Abm => "ABM",
            Strand::Ict => "ICT",
            Strand::Humss => "HUMSS",
            Strand::Gas => "GAS",
        };
        write!(f, "{}", s)
    }
}

/// semester within a school year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Semester {
    First,
    Second,
}

/// billing term: school year (by starting calendar year) and semester
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term {
    pub school_year: u16,
    pub semester: Semester,
}

impl Term {
    pub fn new(school_year: u16, semester: Semester) -> Self {
        Self { school_year, semester }
    }

    /// the term that follows this one
    pub fn next(&self) -> Term {
        match self.semester {
            Semester::First => Term::new(self.school_year, Semester::Second),
            Semester::Second => Term::new(self.school_year + 1, Semester::First),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sem = match self.semester {
            Semester::First => 1,
            Semester::Second => 2,
        };
        write!(f, "SY {}-{} S{}", self.school_year, self.school_year + 1, sem)
    }
}

/// enrollment record supplied by the registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: StudentId,
    pub name: String,
    pub grade: Grade,
    pub strand: Strand,
}

/// payment channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    GCash,
    BankTransfer,
    Cash,
    CreditCard,
    Other,
}

impl PaymentMethod {
    /// prefix used for generated payment references
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentMethod::GCash => "GC",
            PaymentMethod::BankTransfer => "BT",
            PaymentMethod::Cash => "CA",
            PaymentMethod::CreditCard => "CC",
            PaymentMethod::Other => "OT",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::GCash => "GCash",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    /// accepts both display names and the short form-select values
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gcash" => Ok(PaymentMethod::GCash),
            "bank" | "bank transfer" | "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit card" | "credit/debit card" | "credit_card" => {
                Ok(PaymentMethod::CreditCard)
            }
            "other" => Ok(PaymentMethod::Other),
            _ => Err(LedgerError::InvalidConfiguration {
                message: format!("unknown payment method: {}", s),
            }),
        }
    }
}

/// transaction status; Pending moves to exactly one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// origin of a fee line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FeeKind {
    /// assessed from the catalog at enrollment
    #[default]
    Assessed,
    /// penalty for an installment paid after its grace period
    LateFee,
}
