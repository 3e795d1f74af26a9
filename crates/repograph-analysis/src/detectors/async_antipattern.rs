use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::repository_functions;
use repograph_core::{finding_id, Finding, RelType, Result, Severity};
use serde_json::json;

/// Callables that block the event loop when awaited code runs them.
const BLOCKING_CALLS: &[&str] = &[
    "time.sleep",
    "requests.get",
    "requests.post",
    "requests.put",
    "requests.delete",
    "requests.request",
    "urllib.request.urlopen",
    "subprocess.run",
    "subprocess.call",
    "subprocess.check_output",
    "socket.create_connection",
    "open",
];

/// Detects async functions that make blocking calls.
#[derive(Debug, Default)]
pub struct AsyncAntipatternDetector;

impl Detector for AsyncAntipatternDetector {
    fn name(&self) -> &'static str {
        "AsyncAntipatternDetector"
    }

    fn description(&self) -> &'static str {
        "Finds blocking calls inside async functions"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        for func in repository_functions(ctx.store) {
            if !func.bool_prop("isAsync") {
                continue;
            }

            let blocking: Vec<String> = ctx
                .store
                .outgoing(func.id, RelType::Calls)
                .into_iter()
                .filter_map(|(rel, _)| {
                    rel.str_prop("callName").map(str::to_string)
                })
                .filter(|call| BLOCKING_CALLS.contains(&call.as_str()))
                .collect();
            if blocking.is_empty() {
                continue;
            }

            let severity = if blocking.len() >= 3 {
                Severity::High
            } else {
                Severity::Medium
            };
            let name = func.name().to_string();

            ctx.enricher().try_flag(
                func.qualified_name(),
                self.name(),
                0.85,
                &["blocking_in_async".to_string()],
                severity,
            );

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Blocking call in async function {name}"),
            );
            finding.id = finding_id(self.name(), func.file_path(), func.line_start());
            finding.description = format!(
                "Async function '{name}' calls {} which block the event loop.",
                blocking.join(", ")
            );
            finding.affected_nodes = vec![func.qualified_name().to_string()];
            finding.affected_files = vec![func.file_path().to_string()];
            finding.line_start = Some(func.line_start());
            finding.line_end = Some(func.line_end());
            finding
                .graph_context
                .insert("blockingCalls".into(), json!(blocking));
            finding.suggested_fix = Some(
                "Use the async equivalents (asyncio.sleep, an async HTTP client) or move the \
                 blocking work to a thread executor."
                    .into(),
            );
            findings.push(finding);
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AnalysisContext;
    use repograph_core::{Entity, EntityKind, GraphConfig, Relationship, RepographConfig, Severity};
    use repograph_graph::GraphStore;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn function(name: &str, is_async: bool) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("a.py::{name}:1"),
            file_path: "a.py".into(),
            line_start: 1,
            line_end: 6,
            docstring: None,
            kind: EntityKind::Function {
                parameters: vec![],
                parameter_types: BTreeMap::new(),
                return_type: None,
                complexity: 1,
                is_async,
                is_method: false,
                decorators: vec![],
                yield_count: 0,
                max_chain_depth: 0,
            },
        }
    }

    fn store_with_calls(func: Entity, calls: &[&str]) -> GraphStore {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        let qname = func.qualified_name.clone();
        let ids = store.batch_create_nodes(&[func]).unwrap();
        let rels: Vec<Relationship> = calls
            .iter()
            .map(|call| {
                Relationship::new(qname.clone(), call.to_string(), RelType::Calls)
                    .with_property("callName", serde_json::json!(call))
            })
            .collect();
        store.batch_create_relationships(&rels, &ids).unwrap();
        store
    }

    fn detect(store: &GraphStore) -> Vec<Finding> {
        let config = RepographConfig::default();
        let ctx = AnalysisContext::new(store, &config, Path::new("."));
        AsyncAntipatternDetector.detect(&ctx, &[]).unwrap()
    }

    #[test]
    fn blocking_sleep_in_async_is_medium() {
        let store = store_with_calls(function("fetch", true), &["time.sleep"]);
        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(
            findings[0].graph_context["blockingCalls"],
            serde_json::json!(["time.sleep"])
        );
    }

    #[test]
    fn three_blocking_calls_are_high() {
        let store = store_with_calls(
            function("fetch", true),
            &["time.sleep", "requests.get", "subprocess.run"],
        );
        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn sync_functions_are_ignored() {
        let store = store_with_calls(function("fetch", false), &["time.sleep"]);
        assert!(detect(&store).is_empty());
    }

    #[test]
    fn non_blocking_calls_are_fine() {
        let store = store_with_calls(
            function("fetch", true),
            &["asyncio.sleep", "httpx.get", "logger.info"],
        );
        assert!(detect(&store).is_empty());
    }
}
