use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MetadataError;
use crate::doi::is_valid_doi;
use crate::model::Reference;

/// Earliest publication year accepted at [`ValidationLevel::Standard`].
pub const MIN_YEAR: i32 = 1800;

/// How thorough reference validation is. Each level implies the checks of
/// the levels below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Raw text present.
    Basic,
    /// Plus well-formed DOI and plausible year.
    #[default]
    Standard,
    /// Plus authors, title and venue.
    Strict,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown validation level `{0}` (expected basic, standard or strict)")]
pub struct UnknownLevel(pub String);

impl FromStr for ValidationLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(ValidationLevel::Basic),
            "standard" => Ok(ValidationLevel::Standard),
            "strict" => Ok(ValidationLevel::Strict),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationLevel::Basic => "basic",
            ValidationLevel::Standard => "standard",
            ValidationLevel::Strict => "strict",
        })
    }
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub reason: String,
}

impl ValidationIssue {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Outcome of validating one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub level: ValidationLevel,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    /// Whether any issue concerns `field`.
    pub fn has_issue(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

/// Checks references against the rules of a [`ValidationLevel`].
#[derive(Debug, Clone)]
pub struct ReferenceValidator {
    level: ValidationLevel,
    current_year: i32,
}

impl ReferenceValidator {
    pub fn new(level: ValidationLevel) -> Self {
        Self {
            level,
            current_year: chrono::Utc::now().year(),
        }
    }

    /// Pin the reference year used for the upper bound on publication years.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    pub fn level(&self) -> ValidationLevel {
        self.level
    }

    pub fn validate(&self, reference: &Reference) -> ValidationReport {
        let mut issues = Vec::new();

        if reference.raw_text.trim().is_empty() {
            issues.push(ValidationIssue::new("raw_text", "raw text is empty"));
        }

        if self.level >= ValidationLevel::Standard {
            if let Some(doi) = &reference.doi {
                if !is_valid_doi(doi) {
                    issues.push(ValidationIssue::new(
                        "doi",
                        format!("`{doi}` is not a well-formed DOI"),
                    ));
                }
            }
            if let Some(year) = reference.year {
                let max_year = self.current_year + 1;
                if !(MIN_YEAR..=max_year).contains(&year) {
                    issues.push(ValidationIssue::new(
                        "year",
                        format!("{year} is outside {MIN_YEAR}..={max_year}"),
                    ));
                }
            }
        }

        if self.level >= ValidationLevel::Strict {
            if reference.authors.is_empty() {
                issues.push(ValidationIssue::new("authors", "no authors"));
            } else if let Some(pos) = reference.authors.iter().position(|a| !a.is_valid()) {
                issues.push(ValidationIssue::new(
                    "authors",
                    format!("author #{} has no name", pos + 1),
                ));
            }
            if is_blank(reference.title.as_deref()) {
                issues.push(ValidationIssue::new("title", "title is missing"));
            }
            if is_blank(reference.venue.as_deref()) {
                issues.push(ValidationIssue::new("venue", "venue is missing"));
            }
        }

        ValidationReport {
            level: self.level,
            issues,
        }
    }

    /// Validate a reference supplied as untyped JSON.
    ///
    /// Structurally broken input (not an object, or fields of the wrong
    /// type) is a [`MetadataError::Malformed`]; everything else is reported.
    pub fn validate_value(
        &self,
        value: &serde_json::Value,
    ) -> Result<ValidationReport, MetadataError> {
        if !value.is_object() {
            return Err(MetadataError::Malformed {
                what: "reference",
                reason: format!("expected a JSON object, got {}", json_kind(value)),
            });
        }
        let reference: Reference =
            serde_json::from_value(value.clone()).map_err(|e| MetadataError::Malformed {
                what: "reference",
                reason: e.to_string(),
            })?;
        Ok(self.validate(&reference))
    }
}

/// Validate untyped JSON at `level` with the current calendar year.
pub fn validate_reference_value(
    value: &serde_json::Value,
    level: ValidationLevel,
) -> Result<ValidationReport, MetadataError> {
    ReferenceValidator::new(level).validate_value(value)
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
