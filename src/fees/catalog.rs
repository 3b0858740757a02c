use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::{Currency, Money};
use crate::errors::{LedgerError, Result};
use crate::types::{FeeId, Grade, Semester, Strand, Student, Term};

use super::{FeeDefinition, FeeLine};

/// ordered fee definitions supplied by the registrar
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCatalog {
    pub definitions: Vec<FeeDefinition>,
    /// fees every assessment must contain regardless of grade or strand
    #[serde(default)]
    pub mandatory_fee_ids: BTreeSet<FeeId>,
}

impl FeeCatalog {
    pub fn new(definitions: Vec<FeeDefinition>) -> Self {
        Self {
            definitions,
            mandatory_fee_ids: BTreeSet::new(),
        }
    }

    pub fn with_mandatory(mut self, fee_id: impl Into<FeeId>) -> Self {
        self.mandatory_fee_ids.insert(fee_id.into());
        self
    }

    /// senior high fee structure used by the admin settings screen
    pub fn senior_high_default() -> Self {
        FeeCatalog::new(vec![
            FeeDefinition::new("tuition", "Tuition Fee", Money::php(35_000), true)
                .with_description("Basic tuition fee per semester")
                .for_strands([Strand::Stem, Strand::Abm, Strand::Ict]),
            FeeDefinition::new("misc", "Miscellaneous", Money::php(8_000), true)
                .with_description("Registration, library and student services"),
            FeeDefinition::new("lab", "Laboratory Fee", Money::php(5_000), true)
                .with_description("Laboratory equipment and materials")
                .for_strands([Strand::Stem]),
            FeeDefinition::new("development", "Development Fee", Money::php(2_000), false)
                .with_description("Campus development fund")
                .in_semester(Semester::First),
        ])
        .with_mandatory("tuition")
        .with_mandatory("misc")
    }

    pub fn get(&self, fee_id: &str) -> Option<&FeeDefinition> {
        self.definitions.iter().find(|d| d.fee_id == fee_id)
    }

    /// structural checks: unique ids, single currency, positive amounts,
    /// mandatory ids defined and flagged required
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        let mut currency: Option<Currency> = None;

        for def in &self.definitions {
            if !seen.insert(def.fee_id.as_str()) {
                return Err(LedgerError::InvalidConfiguration {
                    message: format!("duplicate fee id in catalog: {}", def.fee_id),
                });
            }
            if def.amount.is_zero() {
                return Err(LedgerError::InvalidConfiguration {
                    message: format!("fee {} has zero amount", def.fee_id),
                });
            }
            match currency {
                Some(c) if c != def.amount.currency() => {
                    return Err(LedgerError::CurrencyMismatch {
                        expected: c,
                        found: def.amount.currency(),
                    });
                }
                None => currency = Some(def.amount.currency()),
                _ => {}
            }
        }

        for fee_id in &self.mandatory_fee_ids {
            match self.get(fee_id) {
                Some(def) if def.required => {}
                Some(_) => {
                    return Err(LedgerError::InvalidConfiguration {
                        message: format!("mandatory fee {} is not flagged required", fee_id),
                    });
                }
                None => {
                    return Err(LedgerError::MissingRequiredFee {
                        fee_id: fee_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: FeeCatalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn applies(def: &FeeDefinition, grade: Grade, strand: Strand, term: Term) -> bool {
    def.applies_to(grade, strand) && def.semester.map_or(true, |s| s == term.semester)
}

/// Assess the fee lines that apply to a student for a term.
///
/// Pure and deterministic: catalog order is preserved. Every mandatory fee
/// must be assessed for this student, otherwise `MissingRequiredFee`.
pub fn assess(student: &Student, catalog: &FeeCatalog, term: Term) -> Result<Vec<FeeLine>> {
    catalog.validate()?;

    let lines: Vec<FeeLine> = catalog
        .definitions
        .iter()
        .filter(|def| applies(def, student.grade, student.strand, term))
        .map(FeeLine::from_definition)
        .collect();

    let assessed: BTreeSet<&str> = lines.iter().map(|l| l.fee_id.as_str()).collect();

    for fee_id in &catalog.mandatory_fee_ids {
        if !assessed.contains(fee_id.as_str()) {
            return Err(LedgerError::MissingRequiredFee {
                fee_id: fee_id.clone(),
            });
        }
    }

    debug!(
        student_id = %student.student_id,
        term = %term,
        lines = lines.len(),
        "fees assessed"
    );

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(strand: Strand) -> Student {
        Student {
            student_id: "2024-0001".to_string(),
            name: "John Doe".to_string(),
            grade: Grade::Grade11,
            strand,
        }
    }

    fn first_sem() -> Term {
        Term::new(2024, Semester::First)
    }

    #[test]
    fn test_stem_student_gets_lab_fee() {
        let catalog = FeeCatalog::senior_high_default();
        let lines = assess(&student(Strand::Stem), &catalog, first_sem()).unwrap();

        let ids: Vec<&str> = lines.iter().map(|l| l.fee_id.as_str()).collect();
        assert_eq!(ids, vec!["tuition", "misc", "lab", "development"]);
        let total: Money = lines.iter().map(|l| l.assessed_amount).sum();
        assert_eq!(total, Money::php(50_000));
    }

    #[test]
    fn test_abm_student_skips_lab_fee() {
        let catalog = FeeCatalog::senior_high_default();
        let lines = assess(&student(Strand::Abm), &catalog, first_sem()).unwrap();

        assert!(lines.iter().all(|l| l.fee_id != "lab"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_semester_restricted_fee() {
        let catalog = FeeCatalog::senior_high_default();
        let second = Term::new(2024, Semester::Second);
        let lines = assess(&student(Strand::Abm), &catalog, second).unwrap();

        assert!(lines.iter().all(|l| l.fee_id != "development"));
    }

    #[test]
    fn test_mandatory_fee_not_applicable_fails() {
        // tuition is limited to STEM/ABM/ICT, so a HUMSS student lacks it
        let catalog = FeeCatalog::senior_high_default();
        let result = assess(&student(Strand::Humss), &catalog, first_sem());

        match result {
            Err(LedgerError::MissingRequiredFee { fee_id }) => assert_eq!(fee_id, "tuition"),
            other => panic!("expected MissingRequiredFee, got {:?}", other),
        }
    }

    #[test]
    fn test_mandatory_fee_absent_from_catalog() {
        let catalog = FeeCatalog::new(vec![FeeDefinition::new(
            "misc",
            "Miscellaneous",
            Money::php(8_000),
            true,
        )])
        .with_mandatory("tuition");

        assert!(matches!(
            catalog.validate(),
            Err(LedgerError::MissingRequiredFee { .. })
        ));
    }

    #[test]
    fn test_duplicate_fee_id_rejected() {
        let catalog = FeeCatalog::new(vec![
            FeeDefinition::new("tuition", "Tuition", Money::php(1), true),
            FeeDefinition::new("tuition", "Tuition again", Money::php(2), true),
        ]);
        assert!(matches!(
            catalog.validate(),
            Err(LedgerError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let catalog = FeeCatalog::senior_high_default();
        let s = student(Strand::Stem);
        assert_eq!(
            assess(&s, &catalog, first_sem()).unwrap(),
            assess(&s, &catalog, first_sem()).unwrap()
        );
    }

    #[test]
    fn test_catalog_json_roundtrip_validates() {
        let catalog = FeeCatalog::senior_high_default();
        let json = catalog.to_json_pretty().unwrap();
        let loaded = FeeCatalog::from_json(&json).unwrap();
        assert_eq!(loaded, catalog);
    }
}
