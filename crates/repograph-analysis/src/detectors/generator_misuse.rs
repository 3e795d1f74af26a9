use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::repository_functions;
use lazy_static::lazy_static;
use regex::Regex;
use repograph_core::{finding_id, Finding, Result, Severity};
use serde_json::json;

lazy_static! {
    /// `list(<genexp>)`: the comprehension should be a list comprehension.
    static ref LIST_OF_GENEXP: Regex =
        Regex::new(r"list\(\s*[^()\n]*\bfor\b[^()\n]*\)").expect("valid regex");
    /// A generator expression in boolean position is always truthy.
    static ref GENEXP_IN_CONDITION: Regex =
        Regex::new(r"(?m)^\s*(?:if|while)\s+\([^()\n]*\bfor\b[^()\n]*\)\s*:").expect("valid regex");
}

/// Detects misused generators: single-yield generator functions, immediate
/// list conversion of generator expressions, and generators tested for
/// truthiness. The source-level patterns correlate back to graph nodes by
/// (filePath, line).
#[derive(Debug, Default)]
pub struct GeneratorMisuseDetector;

impl Detector for GeneratorMisuseDetector {
    fn name(&self) -> &'static str {
        "GeneratorMisuseDetector"
    }

    fn description(&self) -> &'static str {
        "Finds pointless or dangerous generator usage"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let functions = repository_functions(ctx.store);

        for func in &functions {
            if func.u64_prop("yieldCount") != 1 {
                continue;
            }
            // contextmanager generators legitimately yield once.
            let decorators = func.string_list("decorators");
            if decorators.iter().any(|d| d.contains("contextmanager")) {
                continue;
            }

            let name = func.name().to_string();
            let mut finding = Finding::new(
                self.name(),
                Severity::Low,
                format!("Single-yield generator: {name}"),
            );
            finding.id = finding_id(self.name(), func.file_path(), func.line_start());
            finding.description = format!(
                "Generator '{name}' yields exactly once; a plain return is simpler and avoids \
                 the iterator protocol."
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![func.file_path().to_string()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding
                .graph_context
                .insert("patternType".into(), json!("single_yield"));
            finding.suggested_fix =
                Some(format!("Return the value from '{name}' directly."));
            findings.push(finding);
        }

        // Source-level patterns within each function's line range.
        for func in &functions {
            let Some(source) = ctx.read_source(func.file_path()) else {
                continue;
            };
            let Some(body) = function_body(&source, func.line_start(), func.line_end()) else {
                continue;
            };

            if LIST_OF_GENEXP.is_match(body) {
                let mut finding = Finding::new(
                    self.name(),
                    Severity::Medium,
                    format!("Generator wrapped in list() in {}", func.name()),
                );
                finding.id = finding_id(self.name(), func.file_path(), func.line_start() + 1);
                finding.description = format!(
                    "Function '{}' builds a generator only to convert it with list(); a list \
                     comprehension is clearer and faster.",
                    func.name()
                );
                finding.affected_nodes = vec![func.qualified_name().to_string()];
                finding.affected_files = vec![func.file_path().to_string()];
                finding.line_start = Some(func.line_start());
                finding.line_end = Some(func.line_end());
                finding
                    .graph_context
                    .insert("patternType".into(), json!("list_conversion"));
                finding.suggested_fix =
                    Some("Replace list(x for ...) with [x for ...].".into());
                findings.push(finding);
            }

            if GENEXP_IN_CONDITION.is_match(body) {
                let mut finding = Finding::new(
                    self.name(),
                    Severity::High,
                    format!("Generator in boolean context in {}", func.name()),
                );
                finding.id = finding_id(self.name(), func.file_path(), func.line_start() + 2);
                finding.description = format!(
                    "Function '{}' tests a generator expression for truthiness; a generator is \
                     always truthy, so the condition never varies.",
                    func.name()
                );
                finding.affected_nodes = vec![func.qualified_name().to_string()];
                finding.affected_files = vec![func.file_path().to_string()];
                finding.line_start = Some(func.line_start());
                finding.line_end = Some(func.line_end());
                finding
                    .graph_context
                    .insert("patternType".into(), json!("boolean_context"));
                finding.suggested_fix =
                    Some("Use any(...) or collect the generator before testing it.".into());
                findings.push(finding);
            }
        }

        Ok(findings)
    }
}

/// Slice of source covering lines [start, end], 1-based inclusive.
fn function_body(source: &str, start: u32, end: u32) -> Option<&str> {
    if start == 0 || end < start {
        return None;
    }
    let mut offsets = vec![0usize];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            offsets.push(i + 1);
        }
    }
    let start_offset = *offsets.get(start as usize - 1)?;
    let end_offset = offsets
        .get(end as usize)
        .copied()
        .unwrap_or(source.len());
    source.get(start_offset..end_offset)
}
