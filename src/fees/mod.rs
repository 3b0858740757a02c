pub mod catalog;
pub mod late;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{FeeId, FeeKind, Grade, Semester, Strand};

pub use catalog::{assess, FeeCatalog};
pub use late::{LateFeeEngine, LateFeePolicy};

/// catalog entry describing a fee before it is assessed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeDefinition {
    pub fee_id: FeeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount: Money,
    pub required: bool,
    /// empty means every grade
    #[serde(default)]
    pub applicable_grades: BTreeSet<Grade>,
    /// empty means every strand
    #[serde(default)]
    pub applicable_strands: BTreeSet<Strand>,
    /// charged only in this semester when set
    #[serde(default)]
    pub semester: Option<Semester>,
    /// installment the fee falls due with; derived from the plan when absent
    #[serde(default)]
    pub due_installment: Option<u32>,
}

impl FeeDefinition {
    pub fn new(fee_id: impl Into<FeeId>, name: impl Into<String>, amount: Money, required: bool) -> Self {
        Self {
            fee_id: fee_id.into(),
            name: name.into(),
            description: String::new(),
            amount,
            required,
            applicable_grades: BTreeSet::new(),
            applicable_strands: BTreeSet::new(),
            semester: None,
            due_installment: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn for_grades(mut self, grades: impl IntoIterator<Item = Grade>) -> Self {
        self.applicable_grades = grades.into_iter().collect();
        self
    }

    pub fn for_strands(mut self, strands: impl IntoIterator<Item = Strand>) -> Self {
        self.applicable_strands = strands.into_iter().collect();
        self
    }

    pub fn in_semester(mut self, semester: Semester) -> Self {
        self.semester = Some(semester);
        self
    }

    pub fn due_with_installment(mut self, installment: u32) -> Self {
        self.due_installment = Some(installment);
        self
    }

    /// grade and strand applicability; empty sets are unconditional
    pub fn applies_to(&self, grade: Grade, strand: Strand) -> bool {
        (self.applicable_grades.is_empty() || self.applicable_grades.contains(&grade))
            && (self.applicable_strands.is_empty() || self.applicable_strands.contains(&strand))
    }
}

/// a fee obligation assessed on one account for one term; immutable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLine {
    pub fee_id: FeeId,
    pub name: String,
    pub assessed_amount: Money,
    pub required: bool,
    pub applicable_grades: BTreeSet<Grade>,
    pub applicable_strands: BTreeSet<Strand>,
    #[serde(default)]
    pub kind: FeeKind,
    #[serde(default)]
    pub due_installment: Option<u32>,
}

impl FeeLine {
    /// a standalone line, mostly useful for tests and ad-hoc charges
    pub fn new(fee_id: impl Into<FeeId>, name: impl Into<String>, amount: Money, required: bool) -> Self {
        Self {
            fee_id: fee_id.into(),
            name: name.into(),
            assessed_amount: amount,
            required,
            applicable_grades: BTreeSet::new(),
            applicable_strands: BTreeSet::new(),
            kind: FeeKind::Assessed,
            due_installment: None,
        }
    }

    pub fn due_with_installment(mut self, installment: u32) -> Self {
        self.due_installment = Some(installment);
        self
    }

    pub fn from_definition(def: &FeeDefinition) -> Self {
        Self {
            fee_id: def.fee_id.clone(),
            name: def.name.clone(),
            assessed_amount: def.amount,
            required: def.required,
            applicable_grades: def.applicable_grades.clone(),
            applicable_strands: def.applicable_strands.clone(),
            kind: FeeKind::Assessed,
            due_installment: def.due_installment,
        }
    }

    pub fn is_late_fee(&self) -> bool {
        self.kind == FeeKind::LateFee
    }
}
