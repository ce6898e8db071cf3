//! Region-specific audit checklists, kept as data.

pub mod store;

pub use store::ChecklistStore;

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::DocumentType;

/// Audit regions the engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "AU")]
    Au,
    #[serde(rename = "NZ")]
    Nz,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Au => "AU",
            Region::Nz => "NZ",
        }
    }

    /// Case-insensitive parse; anything but AU/NZ is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "AU" => Some(Region::Au),
            "NZ" => Some(Region::Nz),
            _ => None,
        }
    }

    /// `au_checklist.json` / `nz_checklist.json`.
    pub fn checklist_filename(&self) -> String {
        format!("{}_checklist.json", self.as_str().to_ascii_lowercase())
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field reference on one side of a comparison: a single field name or
/// an ordered list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRef {
    One(String),
    Many(Vec<String>),
}

impl FieldRef {
    pub fn names(&self) -> Vec<&str> {
        match self {
            FieldRef::One(name) => vec![name.as_str()],
            FieldRef::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn joined(&self) -> String {
        self.names().join(", ")
    }
}

/// The documents and fields a check compares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareFields {
    pub source_doc: DocumentType,
    pub source_field: FieldRef,
    pub target_doc: DocumentType,
    pub target_field: FieldRef,
}

/// A single checklist item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub auditing_criteria: String,
    pub description: String,
    pub checking_logic: String,
    pub pass_conditions: String,
    pub compare_fields: CompareFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

/// A named category of checks (header or valuation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistCategory {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Categories {
    #[serde(default)]
    pub header: ChecklistCategory,
    #[serde(default)]
    pub valuation: ChecklistCategory,
}

/// A full region checklist. Check order is meaningful: the validator
/// reports verdicts in exactly this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub version: String,
    pub region: Region,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub last_updated: String,
    /// Relative tolerance for numeric comparisons in line-item checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_tolerance: Option<f64>,
    pub categories: Categories,
}

impl Checklist {
    pub fn header_checks(&self) -> &[Check] {
        &self.categories.header.checks
    }

    pub fn valuation_checks(&self) -> &[Check] {
        &self.categories.valuation.checks
    }

    pub fn tolerance(&self) -> f64 {
        self.numeric_tolerance.unwrap_or(0.01)
    }

    /// Structural validation beyond what serde enforces: check ids must be
    /// unique across the whole checklist.
    pub fn validate(&self) -> Result<(), ChecklistError> {
        let mut seen = HashSet::new();
        for check in self.header_checks().iter().chain(self.valuation_checks()) {
            if !seen.insert(check.id.as_str()) {
                return Err(ChecklistError::DuplicateCheckId(check.id.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("checklist file not found for region {region}: {path}")]
    NotFound { region: Region, path: PathBuf },

    #[error("invalid checklist: {0}")]
    Parse(String),

    #[error("duplicate check id `{0}`")]
    DuplicateCheckId(String),

    #[error("checklist region {found} does not match requested region {expected}")]
    RegionMismatch { expected: Region, found: Region },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_parses_case_insensitively() {
        assert_eq!(Region::parse("AU"), Some(Region::Au));
        assert_eq!(Region::parse("nz"), Some(Region::Nz));
        assert_eq!(Region::parse("Au"), Some(Region::Au));
        assert_eq!(Region::parse("UK"), None);
        assert_eq!(Region::parse(""), None);
    }

    #[test]
    fn region_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Region::Au).unwrap(), "\"AU\"");
        assert_eq!(serde_json::to_string(&Region::Nz).unwrap(), "\"NZ\"");
    }

    #[test]
    fn checklist_filename_is_lowercased() {
        assert_eq!(Region::Au.checklist_filename(), "au_checklist.json");
        assert_eq!(Region::Nz.checklist_filename(), "nz_checklist.json");
    }

    #[test]
    fn field_ref_accepts_string_or_list() {
        let one: FieldRef = serde_json::from_str("\"supplierName\"").unwrap();
        assert_eq!(one.names(), vec!["supplierName"]);

        let many: FieldRef = serde_json::from_str(r#"["fob", "fobAUD"]"#).unwrap();
        assert_eq!(many.names(), vec!["fob", "fobAUD"]);
        assert_eq!(many.joined(), "fob, fobAUD");
    }

    #[test]
    fn duplicate_ids_across_categories_are_rejected() {
        let checklist = fixtures::checklist(Region::Au, &["H1", "H2"], &["H1"]);
        assert!(matches!(
            checklist.validate(),
            Err(ChecklistError::DuplicateCheckId(id)) if id == "H1"
        ));
    }

    #[test]
    fn unique_ids_validate() {
        let checklist = fixtures::checklist(Region::Au, &["H1", "H2"], &["V1"]);
        assert!(checklist.validate().is_ok());
    }

    #[test]
    fn missing_categories_default_to_empty() {
        let json = r#"{"version": "1.0", "region": "NZ", "categories": {}}"#;
        let checklist: Checklist = serde_json::from_str(json).unwrap();
        assert!(checklist.header_checks().is_empty());
        assert!(checklist.valuation_checks().is_empty());
        assert_eq!(checklist.tolerance(), 0.01);
    }

    #[test]
    fn explicit_tolerance_overrides_the_default() {
        let json = r#"{"version": "1.0", "region": "AU", "numeric_tolerance": 0.05, "categories": {}}"#;
        let checklist: Checklist = serde_json::from_str(json).unwrap();
        assert_eq!(checklist.tolerance(), 0.05);
    }

    #[test]
    fn checklist_round_trips_through_serde() {
        let checklist = fixtures::checklist(Region::Nz, &["H1"], &["V1"]);
        let json = serde_json::to_string_pretty(&checklist).unwrap();
        let back: Checklist = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checklist);
    }
}
