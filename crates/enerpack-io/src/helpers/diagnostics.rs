use enerpack_core::EnergySystem;
use enerpack_ts::{TemporalWeights, TsaParameters};
use serde::Serialize;

use crate::constraints::ConstraintFacade;

/// Severity level for import issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning, // Unusual but imported (e.g., heuristic expansion applied)
    Error,   // Could not import element (e.g., malformed row)
}

/// A single issue encountered during deserialization
#[derive(Debug, Clone, Serialize)]
pub struct ImportIssue {
    pub severity: Severity,
    pub category: String, // "descriptor", "parse", "expansion", "validation"
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>, // CSV row number (for detailed mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>, // "storage 'battery-1'", "resource 'load'"
}

/// Statistics about the deserialized package
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub buses: usize,
    pub components: usize,
    pub subnodes: usize,
    pub sequences: usize,
    pub constraints: usize,
    pub skipped_rows: usize,
    pub defaulted_values: usize,
}

/// Complete diagnostics for one deserialization call
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportDiagnostics {
    pub stats: ImportStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ImportIssue>,
}

impl ImportDiagnostics {
    /// Create new empty diagnostics
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning issue
    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Warning,
            category: category.to_string(),
            message: message.to_string(),
            row: None,
            entity: None,
        });
    }

    /// Add a warning with an entity reference (e.g., "storage 'battery-1'")
    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Warning,
            category: category.to_string(),
            message: message.to_string(),
            row: None,
            entity: Some(entity.to_string()),
        });
    }

    /// Add a warning with a CSV row number
    pub fn add_warning_at_row(&mut self, category: &str, message: &str, row: usize) {
        self.issues.push(ImportIssue {
            severity: Severity::Warning,
            category: category.to_string(),
            message: message.to_string(),
            row: Some(row),
            entity: None,
        });
        self.stats.defaulted_values += 1;
    }

    /// Add an error (skipped element)
    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues.push(ImportIssue {
            severity: Severity::Error,
            category: category.to_string(),
            message: message.to_string(),
            row: None,
            entity: None,
        });
    }

    /// Count warnings
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Count errors
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Check if there are any issues
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Merge another diagnostics into this one
    pub fn merge(&mut self, other: ImportDiagnostics) {
        self.issues.extend(other.issues);
        // Stats are not merged - they are set by the deserializer
    }
}

/// Result of one deserialization call
#[derive(Debug)]
pub struct ImportResult {
    pub system: EnergySystem,
    pub constraints: Vec<ConstraintFacade>,
    /// Aggregation metadata when the package pairs a periods resource with
    /// tsa_parameters
    pub tsa_parameters: Option<TsaParameters>,
    /// Reduced-index weights when a temporal resource drove the time index
    pub temporal_weights: Option<TemporalWeights>,
    pub diagnostics: ImportDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_counts() {
        let mut diag = ImportDiagnostics::new();
        diag.add_warning("expansion", "test warning");
        diag.add_error("parse", "test error");
        diag.add_warning_at_row("parse", "row warning", 7);

        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_issues());
        assert_eq!(diag.stats.defaulted_values, 1);
    }

    #[test]
    fn test_diagnostics_serialization() {
        let mut diag = ImportDiagnostics::new();
        diag.stats.buses = 3;
        diag.stats.components = 12;
        diag.add_warning_at_row("parse", "defaulted efficiency", 47);

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"buses\": 3"));
        assert!(json.contains("\"warning\""));
        assert!(json.contains("\"row\": 47"));
    }
}
