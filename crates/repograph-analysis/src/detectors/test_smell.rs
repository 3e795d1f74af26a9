use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::repository_functions;
use lazy_static::lazy_static;
use regex::Regex;
use repograph_core::{finding_id, Finding, RelType, Result, Severity};
use serde_json::json;

lazy_static! {
    static ref ASSERTION: Regex =
        Regex::new(r"(?m)^\s*assert\b|\.assert_|self\.assert[A-Z]|pytest\.raises")
            .expect("valid regex");
}

/// Calls that make a test time-dependent.
const FLAKY_CALLS: &[&str] = &["time.sleep", "datetime.now", "datetime.datetime.now"];

/// Detects smelly tests: over-mocked, time-dependent, or assertion-free.
#[derive(Debug, Default)]
pub struct TestSmellDetector;

impl Detector for TestSmellDetector {
    fn name(&self) -> &'static str {
        "TestSmellDetector"
    }

    fn description(&self) -> &'static str {
        "Finds over-mocked, flaky or assertion-free tests"
    }

    fn category(&self) -> &'static str {
        "testing"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let max_mocks = ctx.overrides().get_u64("test-smell", "max_mocks", 5) as usize;

        let mut findings = Vec::new();
        for func in repository_functions(ctx.store) {
            if !func.name().starts_with("test_") {
                continue;
            }
            let name = func.name().to_string();

            // Over-mocking: patch decorators or mock-named parameters.
            let decorators = func.string_list("decorators");
            let patch_count = decorators.iter().filter(|d| d.contains("patch")).count();
            let mock_params = func
                .string_list("parameters")
                .iter()
                .filter(|p| p.to_lowercase().contains("mock"))
                .count();
            let mock_count = patch_count.max(mock_params);
            if mock_count >= max_mocks {
                let mut finding = Finding::new(
                    self.name(),
                    Severity::Medium,
                    format!("Over-mocked test: {name}"),
                );
                finding.id = finding_id(self.name(), func.file_path(), func.line_start());
                finding.description = format!(
                    "Test '{name}' mocks {mock_count} collaborators; it verifies wiring rather \
                     than behavior."
                );
                finding.affected_nodes = vec![func.qualified_name().to_string()];
                finding.affected_files = vec![func.file_path().to_string()];
                finding.line_start = Some(func.line_start());
                finding
                    .graph_context
                    .insert("smellType".into(), json!("over_mocked"));
                finding
                    .graph_context
                    .insert("mockCount".into(), json!(mock_count));
                finding.suggested_fix =
                    Some("Test a larger unit with real collaborators where practical.".into());
                findings.push(finding);
            }

            // Flakiness: wall-clock dependencies.
            let flaky: Vec<String> = ctx
                .store
                .outgoing(func.id, RelType::Calls)
                .into_iter()
                .filter_map(|(rel, _)| rel.str_prop("callName").map(str::to_string))
                .filter(|call| FLAKY_CALLS.contains(&call.as_str()))
                .collect();
            if !flaky.is_empty() {
                let severity = if flaky.iter().any(|c| c.contains("sleep")) {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let mut finding = Finding::new(
                    self.name(),
                    severity,
                    format!("Time-dependent test: {name}"),
                );
                finding.id = finding_id(self.name(), func.file_path(), func.line_start() + 1);
                finding.description = format!(
                    "Test '{name}' depends on wall-clock time via {}.",
                    flaky.join(", ")
                );
                finding.affected_nodes = vec![func.qualified_name().to_string()];
                finding.affected_files = vec![func.file_path().to_string()];
                finding.line_start = Some(func.line_start());
                finding
                    .graph_context
                    .insert("smellType".into(), json!("flaky_time"));
                finding
                    .graph_context
                    .insert("flakyCalls".into(), json!(flaky));
                finding.suggested_fix =
                    Some("Inject a clock or use event-based synchronization.".into());
                findings.push(finding);
            }

            // Missing assertions, correlated back to the source text.
            if let Some(source) = ctx.read_source(func.file_path()) {
                let body: String = source
                    .lines()
                    .skip(func.line_start().saturating_sub(1) as usize)
                    .take((func.line_end().saturating_sub(func.line_start()) + 1) as usize)
                    .collect::<Vec<_>>()
                    .join("\n");
                if !ASSERTION.is_match(&body) {
                    let mut finding = Finding::new(
                        self.name(),
                        Severity::Medium,
                        format!("Test without assertions: {name}"),
                    );
                    finding.id =
                        finding_id(self.name(), func.file_path(), func.line_start() + 2);
                    finding.description = format!(
                        "Test '{name}' contains no assertions; it only proves the code does not \
                         crash."
                    );
                    finding.affected_nodes = vec![func.qualified_name().to_string()];
                    finding.affected_files = vec![func.file_path().to_string()];
                    finding.line_start = Some(func.line_start());
                    finding
                        .graph_context
                        .insert("smellType".into(), json!("no_assertions"));
                    finding.suggested_fix =
                        Some("Assert on the observable outcome of the call.".into());
                    findings.push(finding);
                }
            }
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_regex_matches_common_forms() {
        assert!(ASSERTION.is_match("    assert result == 1"));
        assert!(ASSERTION.is_match("    self.assertEqual(a, b)"));
        assert!(ASSERTION.is_match("    mock.assert_called_once()"));
        assert!(ASSERTION.is_match("    with pytest.raises(ValueError):"));
        assert!(!ASSERTION.is_match("    result = compute()"));
    }
}
