use crate::types::Severity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate a deterministic finding ID from detector name, file path, and
/// line number. Random ids would defeat dedup across runs.
pub fn finding_id(detector: &str, file: &str, line: u32) -> String {
    let mut hasher = DefaultHasher::new();
    detector.hash(&mut hasher);
    file.hash(&mut hasher);
    line.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Evidence a detector attaches for cross-detector collaboration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationMetadata {
    pub detector: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub evidence: Vec<String>,
}

/// A single issue reported by a detector.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub detector: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub affected_nodes: Vec<String>,
    pub affected_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    /// Detector-specific evidence.
    pub graph_context: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaboration: Option<CollaborationMetadata>,

    // Root-cause annotations (set by the root-cause analyzer).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_root_cause: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cascading_count: u32,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub impact_score: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub caused_by_root_cause: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause_detector: Option<String>,

    /// Ids of findings this one absorbed during deduplication.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<String>,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

impl Finding {
    pub fn new(detector: &str, severity: Severity, title: impl Into<String>) -> Self {
        Self {
            detector: detector.to_string(),
            severity,
            title: title.into(),
            ..Default::default()
        }
    }

    /// Primary affected node, used by the deduplicator to key overlaps.
    pub fn primary_node(&self) -> Option<&str> {
        self.affected_nodes.first().map(String::as_str)
    }
}

/// Per-severity counts for the report header.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindingsSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub total: usize,
}

impl FindingsSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = FindingsSummary::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
            summary.total += 1;
        }
        summary
    }
}
