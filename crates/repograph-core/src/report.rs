use crate::finding::{Finding, FindingsSummary};
use crate::types::Grade;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detailed metric breakdown computed after detection from graph statistics
/// and finding counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBreakdown {
    pub total_files: usize,
    pub total_classes: usize,
    pub total_functions: usize,
    pub total_loc: usize,

    // Structure
    pub modularity: f64,
    pub avg_coupling: f64,
    pub circular_dependencies: usize,
    pub bottleneck_count: usize,

    // Quality
    pub dead_code_percentage: f64,
    pub duplication_percentage: f64,
    pub god_class_count: usize,

    // Architecture
    pub layer_violations: usize,
    pub boundary_violations: usize,
    pub abstraction_ratio: f64,
}

/// Deduplication statistics surfaced in the report.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DedupStats {
    pub original_count: usize,
    pub merged_count: usize,
    pub duplicates_removed: usize,
}

/// The health report. A tree of plain values; report writers can serialize
/// it without cycle handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub grade: Grade,
    pub overall_score: f64,
    pub structure_score: f64,
    pub quality_score: f64,
    pub architecture_score: f64,
    pub metrics: MetricsBreakdown,
    pub findings_summary: FindingsSummary,
    pub findings: Vec<Finding>,
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_stats: Option<DedupStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn report_serializes_camel_case() {
        let report = HealthReport {
            grade: Grade::B,
            overall_score: 84.5,
            structure_score: 80.0,
            quality_score: 90.0,
            architecture_score: 85.0,
            metrics: MetricsBreakdown::default(),
            findings_summary: FindingsSummary::default(),
            findings: vec![Finding::new("DeadCodeDetector", Severity::Low, "Unused")],
            analyzed_at: Utc::now(),
            dedup_stats: None,
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["grade"], "B");
        assert_eq!(value["overallScore"], 84.5);
        assert!(value["metrics"]["deadCodePercentage"].is_number());
        assert!(value.get("dedupStats").is_none());
        assert_eq!(value["findings"][0]["severity"], "low");
    }
}
