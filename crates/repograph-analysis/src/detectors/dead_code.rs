use crate::detector::{is_fixture_or_example_path, is_test_path, AnalysisContext, Detector};
use crate::detectors::util::{
    called_names, class_of, imported_names, methods_of, repository_classes,
    repository_functions,
};
use crate::severity_rules::complexity_to_severity;
use repograph_core::{finding_id, Finding, RelType, Result, Severity};
use repograph_graph::NodeRecord;
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;

/// Entry points never reported as dead.
const ENTRY_POINTS: &[&str] = &["main", "__main__", "__init__", "setUp", "tearDown"];

/// Decorator fragments implying external invocation (routes, tasks,
/// callbacks, descriptors).
const USAGE_IMPLIED_DECORATORS: &[&str] = &[
    "route", "app", "task", "api", "endpoint", "command", "listener", "handler", "callback",
    "register", "property", "classmethod", "staticmethod", "fixture",
];

/// Name fragments presumed implicitly used. Tuned against the reference
/// corpus to cut false positives from registry and callback patterns;
/// overridable via the `dead-code.implicit_use_patterns` config key.
const IMPLICIT_USE_PATTERNS: &[&str] = &[
    "handle", "on_", "callback", "loader", "load_", "create_", "build_", "make_", "generate_",
    "validate_", "setup_", "initialize_", "to_dict", "to_json", "from_dict", "from_json",
    "serialize", "deserialize", "_extract_", "_find_", "_calculate_", "_get_", "_set_",
    "_check_", "_parse_", "_process_",
];

/// Base-class names whose subclasses are raised or registered implicitly.
const EXEMPT_CLASS_SUFFIXES: &[&str] = &["Error", "Exception", "Mixin", "Test"];

/// Detects functions and classes with zero incoming references that are not
/// exported, imported by name, decorated into use, or overriding a parent.
#[derive(Debug, Default)]
pub struct DeadCodeDetector;

impl Detector for DeadCodeDetector {
    fn name(&self) -> &'static str {
        "DeadCodeDetector"
    }

    fn description(&self) -> &'static str {
        "Finds unused functions and classes"
    }

    fn category(&self) -> &'static str {
        "dead_code"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let implicit_patterns = ctx
            .overrides()
            .get_string_list("dead-code", "implicit_use_patterns")
            .unwrap_or_else(|| {
                IMPLICIT_USE_PATTERNS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let imported = imported_names(ctx.store);
        let called = called_names(ctx.store);

        let mut findings = Vec::new();
        findings.extend(self.dead_functions(ctx, &imported, &implicit_patterns));
        findings.extend(self.dead_classes(ctx, &imported, &called));
        debug!(count = findings.len(), "dead code detection done");
        Ok(findings)
    }
}

impl DeadCodeDetector {
    fn dead_functions(
        &self,
        ctx: &AnalysisContext<'_>,
        imported: &HashSet<String>,
        implicit_patterns: &[String],
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        for func in repository_functions(ctx.store) {
            let name = func.name().to_string();
            let path = func.file_path().to_string();

            if is_test_path(&path) || is_fixture_or_example_path(&path) {
                continue;
            }
            if name.starts_with("__") && name.ends_with("__") {
                continue;
            }
            if ENTRY_POINTS.contains(&name.as_str()) || name.starts_with("test_") {
                continue;
            }

            if !ctx.store.incoming(func.id, RelType::Calls).is_empty() {
                continue;
            }
            if !ctx.store.incoming(func.id, RelType::Uses).is_empty() {
                continue;
            }
            // Overriding a parent method means polymorphic dispatch.
            if !ctx.store.outgoing(func.id, RelType::Overrides).is_empty() {
                continue;
            }
            if imported.contains(&name) {
                continue;
            }

            let decorators = func.string_list("decorators");
            if decorators.iter().any(|d| {
                let lower = d.to_lowercase();
                USAGE_IMPLIED_DECORATORS.iter().any(|p| lower.contains(p))
            }) {
                continue;
            }

            // Public methods are part of the class's API surface.
            let is_method = func.bool_prop("isMethod");
            if is_method && !name.starts_with('_') {
                continue;
            }

            let lower = name.to_lowercase();
            if implicit_patterns.iter().any(|p| lower.contains(p.as_str())) {
                continue;
            }

            if self.is_exported(ctx, &func) {
                continue;
            }

            let complexity = func.u64_prop("complexity") as u32;
            let severity = complexity_to_severity(complexity).unwrap_or(Severity::Low);

            ctx.enricher().try_flag(
                func.qualified_name(),
                self.name(),
                0.7,
                &["no_incoming_references".to_string()],
                severity,
            );

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Unused function: {name}"),
            );
            finding.id = finding_id(self.name(), &path, func.line_start());
            finding.description = format!(
                "Function '{name}' is never called in the codebase. It has complexity \
                 {complexity} and may be safe to remove."
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![path.clone()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding.graph_context.insert("type".into(), json!("function"));
            finding.graph_context.insert("name".into(), json!(name));
            finding
                .graph_context
                .insert("complexity".into(), json!(complexity));
            finding.suggested_fix = Some(format!(
                "If '{name}' is truly unused, remove it; first check for dynamic calls \
                 (getattr, eval) and callback registration."
            ));
            finding.estimated_effort = Some("Small (15-30 minutes)".into());
            findings.push(finding);
        }

        findings
    }

    fn dead_classes(
        &self,
        ctx: &AnalysisContext<'_>,
        imported: &HashSet<String>,
        called: &HashSet<String>,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        for class in repository_classes(ctx.store) {
            let name = class.name().to_string();
            let path = class.file_path().to_string();

            if is_test_path(&path) || is_fixture_or_example_path(&path) {
                continue;
            }
            if EXEMPT_CLASS_SUFFIXES.iter().any(|s| name.ends_with(s))
                || name.starts_with("Test")
                || name.contains("Mixin")
            {
                continue;
            }

            if !ctx.store.incoming(class.id, RelType::Calls).is_empty() {
                continue;
            }
            if !ctx.store.incoming(class.id, RelType::Inherits).is_empty() {
                continue;
            }
            if !ctx.store.incoming(class.id, RelType::Uses).is_empty() {
                continue;
            }
            // Instantiation from another file shows up as a textual call
            // name even when the edge landed on a placeholder.
            if called.contains(&name) {
                continue;
            }
            if imported.contains(&name) {
                continue;
            }
            if !class.string_list("decorators").is_empty() {
                continue;
            }
            if self.is_exported(ctx, &class) {
                continue;
            }

            let methods = methods_of(ctx.store, &class);
            let method_count = methods.len();
            let complexity = class.u64_prop("complexity") as u32;
            let severity = class_severity(method_count, complexity);

            let mut finding =
                Finding::new(self.name(), severity, format!("Unused class: {name}"));
            finding.id = finding_id(self.name(), &path, class.line_start());
            finding.description = format!(
                "Class '{name}' is never instantiated, inherited from, or referenced. It has \
                 {method_count} methods and complexity {complexity}."
            );
            finding.affected_nodes = vec![class.qualified_name().to_string()];
            finding.affected_files = vec![path];
            finding.line_start = Some(class.line_start());
            finding.line_end = Some(class.line_end());
            finding.graph_context.insert("type".into(), json!("class"));
            finding.graph_context.insert("name".into(), json!(name));
            finding
                .graph_context
                .insert("methodCount".into(), json!(method_count));
            finding
                .graph_context
                .insert("complexity".into(), json!(complexity));
            finding.suggested_fix = Some(format!(
                "If '{name}' is truly unused, remove the class and its {method_count} methods; \
                 check for factory or plugin registration first."
            ));
            finding.estimated_effort = Some(
                match method_count {
                    0..=4 => "Small (30 minutes)",
                    5..=9 => "Small (1-2 hours)",
                    _ => "Medium (2-4 hours)",
                }
                .into(),
            );
            findings.push(finding);
        }

        findings
    }

    fn is_exported(&self, ctx: &AnalysisContext<'_>, node: &NodeRecord) -> bool {
        let file = if node.label == repograph_core::NodeLabel::Function {
            class_of(ctx.store, node)
                .map(|c| c.file_path().to_string())
                .unwrap_or_else(|| node.file_path().to_string())
        } else {
            node.file_path().to_string()
        };
        ctx.store
            .node_by_qualified_name(&file)
            .map(|f| f.string_list("exports").contains(&node.name().to_string()))
            .unwrap_or(false)
    }
}

fn class_severity(method_count: usize, complexity: u32) -> Severity {
    if method_count >= 10 || complexity >= 50 {
        Severity::High
    } else if method_count >= 5 || complexity >= 20 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
