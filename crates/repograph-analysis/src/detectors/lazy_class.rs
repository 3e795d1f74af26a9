use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::{methods_of, repository_classes};
use repograph_core::{finding_id, Finding, Result, Severity};
use serde_json::json;

/// Name fragments marking intentionally thin classes (adapters, configs,
/// DTOs, markers) that are not worth flagging.
const EXCLUDED_NAME_PATTERNS: &[&str] = &[
    "adapter", "config", "settings", "dto", "error", "exception", "test", "stub", "mock",
    "marker", "enum",
];

/// Detects classes that do too little to justify their existence.
#[derive(Debug, Default)]
pub struct LazyClassDetector;

impl LazyClassDetector {
    fn is_excluded(name: &str) -> bool {
        let lower = name.to_lowercase();
        lower.is_empty() || EXCLUDED_NAME_PATTERNS.iter().any(|p| lower.contains(p))
    }
}

impl Detector for LazyClassDetector {
    fn name(&self) -> &'static str {
        "LazyClassDetector"
    }

    fn description(&self) -> &'static str {
        "Finds classes that do too little"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let max_methods = ctx.overrides().get_u64("lazy-class", "max_methods", 1) as usize;
        let max_loc = ctx.overrides().get_u64("lazy-class", "max_loc", 30);

        let mut findings = Vec::new();
        for class in repository_classes(ctx.store) {
            let name = class.name().to_string();
            if Self::is_excluded(&name) {
                continue;
            }
            if class.bool_prop("isAbstract") {
                continue;
            }

            let substantive_methods = methods_of(ctx.store, &class)
                .into_iter()
                .filter(|m| m.name() != "__init__")
                .count();
            let loc = (class.line_end().saturating_sub(class.line_start())) as u64;
            if substantive_methods > max_methods || loc > max_loc {
                continue;
            }
            // A documented class with behavior is a deliberate design
            // element, not an accident of under-refactoring.
            if class.props.get("docstring").is_some() && substantive_methods >= 1 {
                continue;
            }

            ctx.enricher().try_flag(
                class.qualified_name(),
                self.name(),
                0.5,
                &["minimal_behavior".to_string()],
                Severity::Low,
            );

            let mut finding =
                Finding::new(self.name(), Severity::Low, format!("Lazy class: {name}"));
            finding.id = finding_id(self.name(), class.file_path(), class.line_start());
            finding.description = format!(
                "Class '{name}' has {substantive_methods} substantive methods in {loc} lines; \
                 it may not carry its weight."
            );
            finding.affected_nodes = vec![class.qualified_name().to_string()];
            finding.affected_files = vec![class.file_path().to_string()];
            finding.line_start = Some(class.line_start());
            finding.line_end = Some(class.line_end());
            finding
                .graph_context
                .insert("methodCount".into(), json!(substantive_methods));
            finding.graph_context.insert("loc".into(), json!(loc));
            finding.suggested_fix = Some(format!(
                "Inline '{name}' into its caller, or merge it with the class it supports."
            ));
            findings.push(finding);
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intentional_thin_classes_are_excluded() {
        assert!(LazyClassDetector::is_excluded("JsonAdapter"));
        assert!(LazyClassDetector::is_excluded("AppConfig"));
        assert!(LazyClassDetector::is_excluded("UserDTO"));
        assert!(LazyClassDetector::is_excluded("ParseError"));
        assert!(LazyClassDetector::is_excluded("TestHelper"));
        assert!(LazyClassDetector::is_excluded(""));
        assert!(!LazyClassDetector::is_excluded("Widget"));
    }
}
