use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::{caller_files, methods_of, repository_classes};
use repograph_core::{finding_id, Finding, Result, Severity};
use serde_json::json;
use std::collections::HashSet;

/// Detects classes so widely referenced that a change ripples across many
/// files.
#[derive(Debug, Default)]
pub struct ShotgunSurgeryDetector;

impl Detector for ShotgunSurgeryDetector {
    fn name(&self) -> &'static str {
        "ShotgunSurgeryDetector"
    }

    fn description(&self) -> &'static str {
        "Finds classes whose changes ripple across many files"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let medium = ctx.overrides().get_u64("shotgun-surgery", "medium", 10) as usize;
        let high = ctx.overrides().get_u64("shotgun-surgery", "high", 20) as usize;
        let critical = ctx.overrides().get_u64("shotgun-surgery", "critical", 30) as usize;

        let mut findings = Vec::new();

        for class in repository_classes(ctx.store) {
            let mut referencing_files: HashSet<String> = caller_files(ctx.store, class.id);
            for method in methods_of(ctx.store, &class) {
                referencing_files.extend(caller_files(ctx.store, method.id));
            }
            referencing_files.remove(class.file_path());

            let count = referencing_files.len();
            if count < medium {
                continue;
            }

            let base_severity = if count >= critical {
                Severity::Critical
            } else if count >= high {
                Severity::High
            } else {
                Severity::Medium
            };

            // In-graph collaboration: entities other detectors already
            // flagged carry additional risk factors, which escalate the
            // severity (one factor bumps a level, two or more go critical).
            let risk_factors: HashSet<String> = ctx
                .enricher()
                .flags_for(class.qualified_name())
                .into_iter()
                .map(|flag| flag.detector)
                .filter(|detector| detector != self.name())
                .collect();
            let severity = base_severity.escalate(risk_factors.len());

            let name = class.name().to_string();
            ctx.enricher().try_flag(
                class.qualified_name(),
                self.name(),
                0.75,
                &["widely_referenced".to_string()],
                severity,
            );

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Shotgun surgery risk: {name}"),
            );
            finding.id = finding_id(self.name(), class.file_path(), class.line_start());
            finding.description = format!(
                "Class '{name}' is referenced from {count} files; a change to it forces edits \
                 across all of them."
            );
            finding.affected_nodes = vec![class.qualified_name().to_string()];
            finding.affected_files = vec![class.file_path().to_string()];
            finding.line_start = Some(class.line_start());
            finding.line_end = Some(class.line_end());
            finding
                .graph_context
                .insert("referencingFileCount".into(), json!(count));
            if !risk_factors.is_empty() {
                let mut factors: Vec<&String> = risk_factors.iter().collect();
                factors.sort();
                finding
                    .graph_context
                    .insert("escalatedBy".into(), json!(factors));
            }
            finding.suggested_fix = Some(format!(
                "Put an interface in front of '{name}' or split it so callers depend on \
                 narrower pieces."
            ));
            findings.push(finding);
        }

        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AnalysisContext;
    use repograph_core::{
        Entity, EntityKind, GraphConfig, RelType, Relationship, RepographConfig,
    };
    use repograph_graph::{GraphEnricher, GraphStore};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn function(file: &str, name: &str, line: u32) -> Entity {
        Entity {
            name: name.into(),
            qualified_name: format!("{file}::{name}:{line}"),
            file_path: file.into(),
            line_start: line,
            line_end: line + 2,
            docstring: None,
            kind: EntityKind::Function {
                parameters: vec![],
                parameter_types: BTreeMap::new(),
                return_type: None,
                complexity: 1,
                is_async: false,
                is_method: false,
                decorators: vec![],
                yield_count: 0,
                max_chain_depth: 0,
            },
        }
    }

    fn widely_used_class() -> GraphStore {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        let mut entities = vec![Entity {
            name: "Widget".into(),
            qualified_name: "w.py::Widget:1".into(),
            file_path: "w.py".into(),
            line_start: 1,
            line_end: 20,
            docstring: None,
            kind: EntityKind::Class {
                is_abstract: false,
                complexity: 1,
                decorators: vec![],
            },
        }];
        let mut rels = Vec::new();
        for i in 0..3 {
            let file = format!("caller{i}.py");
            entities.push(function(&file, "run", 1));
            rels.push(
                Relationship::new(format!("{file}::run:1"), "w.py::Widget:1", RelType::Calls)
                    .with_property("callName", json!("Widget")),
            );
        }
        let ids = store.batch_create_nodes(&entities).unwrap();
        store.batch_create_relationships(&rels, &ids).unwrap();
        store
    }

    fn config_with_low_threshold() -> RepographConfig {
        let mut config = RepographConfig::default();
        config.detectors.set("shotgun-surgery", "medium", json!(2));
        config
    }

    #[test]
    fn flags_widely_referenced_class() {
        let store = widely_used_class();
        let config = config_with_low_threshold();
        let ctx = AnalysisContext::new(&store, &config, Path::new("."));
        let findings = ShotgunSurgeryDetector.detect(&ctx, &[]).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn prior_flags_escalate_severity() {
        let store = widely_used_class();
        let enricher = GraphEnricher::new(&store);
        enricher.try_flag("w.py::Widget:1", "GodClassDetector", 0.9, &[], Severity::High);

        let config = config_with_low_threshold();
        let ctx = AnalysisContext::new(&store, &config, Path::new("."));
        let findings = ShotgunSurgeryDetector.detect(&ctx, &[]).unwrap();
        assert_eq!(findings.len(), 1);
        // One risk factor: one level up from MEDIUM.
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(
            findings[0].graph_context["escalatedBy"],
            json!(["GodClassDetector"])
        );

        enricher.try_flag(
            "w.py::Widget:1",
            "CircularDependencyDetector",
            0.9,
            &[],
            Severity::Low,
        );
        let findings = ShotgunSurgeryDetector.detect(&ctx, &[]).unwrap();
        // Two factors go straight to CRITICAL.
        assert_eq!(findings[0].severity, Severity::Critical);
    }
}
