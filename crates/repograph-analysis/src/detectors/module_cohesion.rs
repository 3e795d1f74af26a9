use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::file_import_graph;
use repograph_core::{finding_id, Finding, Result, Severity};
use repograph_graph::{louvain_communities, GraphAlgorithms};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

/// Groups files by import co-occurrence with Louvain community detection;
/// low modularity means the codebase resists clean partitioning.
#[derive(Debug, Default)]
pub struct ModuleCohesionDetector;

impl Detector for ModuleCohesionDetector {
    fn name(&self) -> &'static str {
        "ModuleCohesionDetector"
    }

    fn description(&self) -> &'static str {
        "Scores how cleanly files partition into communities"
    }

    fn category(&self) -> &'static str {
        "architecture"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let algorithms = GraphAlgorithms::new(ctx.store);
        if !algorithms.is_available() {
            return Ok(Vec::new());
        }

        let (nodes, edges) = file_import_graph(ctx.store);
        let projection_name = format!("communities-{}", Uuid::new_v4().simple());
        let result = algorithms
            .create_projection_from_edges(&projection_name, &nodes, &edges)
            .map(|projection| louvain_communities(&projection));

        let Ok(Some(communities)) = result else {
            // Algorithm unavailable or the graph has no imports; other
            // signals cover those repos.
            debug!("community detection unavailable, skipping");
            return Ok(Vec::new());
        };

        for (id, community) in &communities.communities {
            ctx.store
                .set_node_property(*id, "communityId", json!(community))?;
        }

        let modularity = communities.modularity;
        if modularity >= 0.3 {
            return Ok(Vec::new());
        }

        let severity = if modularity < 0.2 {
            Severity::High
        } else {
            Severity::Medium
        };

        // Evidence: edges crossing community boundaries.
        let mut inter_community = 0usize;
        for (source, target) in &edges {
            let (Some(&sc), Some(&tc)) = (
                communities.communities.get(source),
                communities.communities.get(target),
            ) else {
                continue;
            };
            if sc != tc {
                inter_community += 1;
            }
        }

        let mut finding = Finding::new(
            self.name(),
            severity,
            format!("Poor module cohesion (modularity {modularity:.2})"),
        );
        finding.id = finding_id(self.name(), "modularity", communities.community_count as u32);
        finding.description = format!(
            "Import structure partitions into {} communities with modularity {modularity:.2}; \
             {inter_community} imports cross community boundaries.",
            communities.community_count
        );
        finding.affected_files = nodes
            .iter()
            .filter_map(|id| ctx.store.node_by_id(*id))
            .map(|n| n.file_path().to_string())
            .collect();
        finding.affected_nodes = finding.affected_files.clone();
        finding
            .graph_context
            .insert("modularityScore".into(), json!(modularity));
        finding
            .graph_context
            .insert("communityCount".into(), json!(communities.community_count));
        finding
            .graph_context
            .insert("interCommunityEdges".into(), json!(inter_community));
        finding.suggested_fix = Some(
            "Regroup files so most imports stay within a package, and route cross-package \
             needs through explicit interfaces."
                .into(),
        );
        Ok(vec![finding])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::{
        Entity, EntityKind, GraphConfig, RelType, Relationship, RepographConfig, Severity,
    };
    use repograph_graph::GraphStore;
    use serde_json::json;
    use std::path::Path;

    fn file(path: &str) -> Entity {
        Entity {
            name: path.into(),
            qualified_name: path.into(),
            file_path: path.into(),
            line_start: 1,
            line_end: 5,
            docstring: None,
            kind: EntityKind::File {
                language: "python".into(),
                loc: 5,
                hash: String::new(),
                last_modified: None,
                exports: vec![],
            },
        }
    }

    fn store_with_imports(paths: &[&str], imports: &[(&str, &str)]) -> GraphStore {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        let entities: Vec<Entity> = paths.iter().map(|p| file(p)).collect();
        let ids = store.batch_create_nodes(&entities).unwrap();
        let rels: Vec<Relationship> = imports
            .iter()
            .map(|(s, t)| Relationship::new(*s, *t, RelType::Imports))
            .collect();
        store.batch_create_relationships(&rels, &ids).unwrap();
        store
    }

    fn detect(store: &GraphStore) -> Vec<Finding> {
        let config = RepographConfig::default();
        let ctx = AnalysisContext::new(store, &config, Path::new("."));
        ModuleCohesionDetector.detect(&ctx, &[]).unwrap()
    }

    #[test]
    fn tangled_pair_scores_zero_modularity_and_high() {
        let store = store_with_imports(
            &["a.py", "b.py"],
            &[("a.py", "b.py"), ("b.py", "a.py")],
        );
        let findings = detect(&store);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].graph_context["modularityScore"], json!(0.0));
    }

    #[test]
    fn community_ids_are_written_back() {
        let store = store_with_imports(
            &["a.py", "b.py"],
            &[("a.py", "b.py"), ("b.py", "a.py")],
        );
        detect(&store);
        let node = store.node_by_qualified_name("a.py").unwrap();
        assert!(node.props.get("communityId").is_some());
    }

    #[test]
    fn well_partitioned_imports_stay_quiet() {
        // Two import triangles joined by a single bridge partition cleanly.
        let files = ["a1.py", "a2.py", "a3.py", "b1.py", "b2.py", "b3.py"];
        let imports = [
            ("a1.py", "a2.py"),
            ("a2.py", "a3.py"),
            ("a3.py", "a1.py"),
            ("b1.py", "b2.py"),
            ("b2.py", "b3.py"),
            ("b3.py", "b1.py"),
            ("a1.py", "b1.py"),
        ];
        let store = store_with_imports(&files, &imports);
        assert!(detect(&store).is_empty());
    }

    #[test]
    fn import_free_repositories_are_skipped() {
        let store = store_with_imports(&["a.py", "b.py"], &[]);
        assert!(detect(&store).is_empty());
    }
}
