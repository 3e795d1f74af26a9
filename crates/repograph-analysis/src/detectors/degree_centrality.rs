use crate::detector::{AnalysisContext, Detector};
use repograph_core::{finding_id, Finding, NodeLabel, RelType, Result, Severity};
use repograph_graph::{degrees, GraphAlgorithms, NodeRecord};
use serde_json::json;
use uuid::Uuid;

/// In/out-degree heuristics over the call graph: god functions (high
/// fan-in plus complexity), feature-envy candidates (high fan-out), and
/// coupling hotspots (both).
#[derive(Debug, Default)]
pub struct DegreeCentralityDetector;

impl Detector for DegreeCentralityDetector {
    fn name(&self) -> &'static str {
        "DegreeCentralityDetector"
    }

    fn description(&self) -> &'static str {
        "Finds degree-based coupling hotspots"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let in_threshold = ctx.overrides().get_u64("degree-centrality", "in_degree", 30) as usize;
        let out_threshold =
            ctx.overrides().get_u64("degree-centrality", "out_degree", 25) as usize;

        let algorithms = GraphAlgorithms::new(ctx.store);
        let projection_name = format!("degree-{}", Uuid::new_v4().simple());
        let degree_map = algorithms.scoped(
            &projection_name,
            NodeLabel::Function,
            RelType::Calls,
            |projection| Ok(degrees(projection)),
        )?;

        let mut findings = Vec::new();
        for (id, (fan_in, fan_out)) in &degree_map {
            let Some(func) = ctx.store.node_by_id(*id) else {
                continue;
            };
            let complexity = func.u64_prop("complexity");

            let hotspot = *fan_in >= in_threshold && *fan_out >= out_threshold;
            let god_function = *fan_in >= in_threshold && complexity >= 20;
            let envious = *fan_out >= out_threshold && complexity >= 10;
            if !(hotspot || god_function || envious) {
                continue;
            }

            let (kind, severity) = if hotspot {
                (
                    "coupling_hotspot",
                    if complexity >= 20 {
                        Severity::Critical
                    } else {
                        Severity::High
                    },
                )
            } else if god_function {
                (
                    "god_function",
                    if *fan_in >= in_threshold * 2 {
                        Severity::Critical
                    } else if complexity >= 30 {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                )
            } else {
                ("high_fan_out", Severity::Medium)
            };

            findings.push(self.build_finding(
                ctx, &func, kind, severity, *fan_in, *fan_out, complexity,
            ));
        }

        Ok(findings)
    }
}

impl DegreeCentralityDetector {
    #[allow(clippy::too_many_arguments)]
    fn build_finding(
        &self,
        ctx: &AnalysisContext<'_>,
        func: &NodeRecord,
        kind: &str,
        severity: Severity,
        fan_in: usize,
        fan_out: usize,
        complexity: u64,
    ) -> Finding {
        let name = func.name().to_string();
        ctx.enricher().try_flag(
            func.qualified_name(),
            self.name(),
            0.7,
            &[kind.to_string()],
            severity,
        );

        let mut finding = Finding::new(
            self.name(),
            severity,
            format!("Coupling hotspot: {name}"),
        );
        finding.id = finding_id(self.name(), func.file_path(), func.line_start());
        finding.description = format!(
            "Function '{name}' has fan-in {fan_in} and fan-out {fan_out} with complexity \
             {complexity}."
        );
        finding.affected_nodes = vec![func.qualified_name().to_string()];
        finding.affected_files = vec![func.file_path().to_string()];
        finding.line_start = Some(func.line_start());
        finding.line_end = Some(func.line_end());
        finding.graph_context.insert("kind".into(), json!(kind));
        finding.graph_context.insert("fanIn".into(), json!(fan_in));
        finding.graph_context.insert("fanOut".into(), json!(fan_out));
        finding
            .graph_context
            .insert("complexity".into(), json!(complexity));
        finding.suggested_fix = Some(format!(
            "Reduce the number of collaborators '{name}' touches, or split it along its \
             call clusters."
        ));
        finding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::{Entity, EntityKind, GraphConfig, Relationship, RepographConfig, Severity};
    use repograph_graph::GraphStore;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn function(name: &str, complexity: u32) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("a.py::{name}:1"),
            file_path: "a.py".into(),
            line_start: 1,
            line_end: 4,
            docstring: None,
            kind: EntityKind::Function {
                parameters: vec![],
                parameter_types: BTreeMap::new(),
                return_type: None,
                complexity,
                is_async: false,
                is_method: false,
                decorators: vec![],
                yield_count: 0,
                max_chain_depth: 0,
            },
        }
    }

    fn store_with(functions: Vec<Entity>, calls: &[(&str, &str)]) -> GraphStore {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        let ids = store.batch_create_nodes(&functions).unwrap();
        let rels: Vec<Relationship> = calls
            .iter()
            .map(|(from, to)| {
                Relationship::new(
                    format!("a.py::{from}:1"),
                    format!("a.py::{to}:1"),
                    RelType::Calls,
                )
            })
            .collect();
        store.batch_create_relationships(&rels, &ids).unwrap();
        store
    }

    /// Thresholds lowered so small fixtures can cross them.
    fn config() -> RepographConfig {
        let mut config = RepographConfig::default();
        config.detectors.set("degree-centrality", "in_degree", json!(3));
        config.detectors.set("degree-centrality", "out_degree", json!(3));
        config
    }

    fn detect(store: &GraphStore) -> Vec<Finding> {
        let config = config();
        let ctx = AnalysisContext::new(store, &config, Path::new("."));
        DegreeCentralityDetector.detect(&ctx, &[]).unwrap()
    }

    #[test]
    fn god_function_needs_fan_in_and_complexity() {
        let mut functions = vec![function("hub", 20)];
        let mut calls = Vec::new();
        for i in 0..3 {
            let caller = format!("caller{i}");
            functions.push(function(&caller, 1));
            calls.push((caller, "hub".to_string()));
        }
        let call_refs: Vec<(&str, &str)> =
            calls.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let store = store_with(functions, &call_refs);

        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].graph_context["kind"], json!("god_function"));
        assert_eq!(findings[0].graph_context["fanIn"], json!(3));
    }

    #[test]
    fn double_fan_in_escalates_god_function_to_critical() {
        let mut functions = vec![function("hub", 20)];
        let mut calls = Vec::new();
        for i in 0..6 {
            let caller = format!("caller{i}");
            functions.push(function(&caller, 1));
            calls.push((caller, "hub".to_string()));
        }
        let call_refs: Vec<(&str, &str)> =
            calls.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let store = store_with(functions, &call_refs);

        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn high_fan_out_with_complexity_is_medium() {
        let functions = vec![
            function("envious", 10),
            function("t0", 1),
            function("t1", 1),
            function("t2", 1),
        ];
        let store = store_with(
            functions,
            &[("envious", "t0"), ("envious", "t1"), ("envious", "t2")],
        );

        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].graph_context["kind"], json!("high_fan_out"));
    }

    #[test]
    fn hotspot_combines_both_directions() {
        let mut functions = vec![function("hot", 5)];
        let mut calls = Vec::new();
        for i in 0..3 {
            let caller = format!("in{i}");
            let callee = format!("out{i}");
            functions.push(function(&caller, 1));
            functions.push(function(&callee, 1));
            calls.push((caller, "hot".to_string()));
            calls.push(("hot".to_string(), callee));
        }
        let call_refs: Vec<(&str, &str)> =
            calls.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let store = store_with(functions, &call_refs);

        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].graph_context["kind"], json!("coupling_hotspot"));
    }

    #[test]
    fn quiet_functions_stay_quiet() {
        let functions = vec![function("a", 30), function("b", 30)];
        let store = store_with(functions, &[("a", "b")]);
        assert!(detect(&store).is_empty());
    }
}
