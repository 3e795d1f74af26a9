use crate::memory::NodeRecord;
use crate::store::GraphStore;
use repograph_core::{NodeLabel, RelType, Result, Severity};
use serde_json::{json, Map};
use tracing::{debug, warn};

/// Attaches transient `DetectorMetadata` nodes to flagged entities so later
/// detectors can see earlier detectors' results in-graph. All metadata is
/// removed by `cleanup` at the end of a run unless retention is requested.
pub struct GraphEnricher<'a> {
    store: &'a GraphStore,
}

/// One flag read back from the graph.
#[derive(Debug, Clone)]
pub struct DetectorFlag {
    pub detector: String,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub severity: Severity,
}

impl<'a> GraphEnricher<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    /// Flag an entity with detector metadata. Failures are reported to the
    /// caller, but call sites swallow them: enrichment never aborts
    /// detection.
    pub fn flag_entity(
        &self,
        qualified_name: &str,
        detector: &str,
        confidence: f64,
        evidence: &[String],
        severity: Severity,
    ) -> Result<()> {
        let Some(entity) = self.store.node_by_qualified_name(qualified_name) else {
            debug!(qualified_name, detector, "cannot flag unknown entity");
            return Ok(());
        };

        let mut props = Map::new();
        props.insert(
            "qualifiedName".into(),
            json!(format!("__meta__::{detector}::{qualified_name}")),
        );
        props.insert("name".into(), json!(detector));
        props.insert("detector".into(), json!(detector));
        props.insert("confidence".into(), json!(confidence.clamp(0.0, 1.0)));
        props.insert("evidence".into(), json!(evidence));
        props.insert("severity".into(), json!(severity.as_str()));

        let metadata = self.store.create_node(NodeLabel::DetectorMetadata, props)?;
        self.store
            .create_relationship(RelType::FlaggedBy, entity.id, metadata, Map::new())?;
        Ok(())
    }

    /// Flags previously attached to an entity, in creation order.
    pub fn flags_for(&self, qualified_name: &str) -> Vec<DetectorFlag> {
        let Some(entity) = self.store.node_by_qualified_name(qualified_name) else {
            return Vec::new();
        };
        self.store
            .outgoing(entity.id, RelType::FlaggedBy)
            .into_iter()
            .map(|(_, meta)| flag_from_node(&meta))
            .collect()
    }

    /// Delete all metadata nodes and their FLAGGED_BY edges. Returns the
    /// number of nodes removed.
    pub fn cleanup(&self) -> Result<usize> {
        let removed = self
            .store
            .delete_nodes_with_label(NodeLabel::DetectorMetadata)?;
        if removed > 0 {
            debug!(removed, "cleaned up detector metadata");
        }
        Ok(removed)
    }

    /// Best-effort flagging used inside detectors: logs and swallows errors.
    pub fn try_flag(
        &self,
        qualified_name: &str,
        detector: &str,
        confidence: f64,
        evidence: &[String],
        severity: Severity,
    ) {
        if let Err(e) = self.flag_entity(qualified_name, detector, confidence, evidence, severity)
        {
            warn!(qualified_name, detector, error = %e, "failed to enrich graph");
        }
    }
}

fn flag_from_node(node: &NodeRecord) -> DetectorFlag {
    DetectorFlag {
        detector: node
            .props
            .get("detector")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
            .to_string(),
        confidence: node
            .props
            .get("confidence")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0),
        evidence: node.string_list("evidence"),
        severity: node
            .props
            .get("severity")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| serde_json::from_value(json!(s)).ok())
            .unwrap_or(Severity::Info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::{Entity, EntityKind, GraphConfig};

    fn store_with_class() -> GraphStore {
        let store = GraphStore::connect(GraphConfig::default()).unwrap();
        store
            .batch_create_nodes(&[Entity {
                name: "Widget".into(),
                qualified_name: "a.py::Widget:1".into(),
                file_path: "a.py".into(),
                line_start: 1,
                line_end: 40,
                docstring: None,
                kind: EntityKind::Class {
                    is_abstract: false,
                    complexity: 5,
                    decorators: vec![],
                },
            }])
            .unwrap();
        store
    }

    #[test]
    fn flag_and_read_back() {
        let store = store_with_class();
        let enricher = GraphEnricher::new(&store);
        enricher
            .flag_entity(
                "a.py::Widget:1",
                "GodClassDetector",
                0.9,
                &["method_count".into()],
                Severity::High,
            )
            .unwrap();

        let flags = enricher.flags_for("a.py::Widget:1");
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].detector, "GodClassDetector");
        assert_eq!(flags[0].severity, Severity::High);
        assert_eq!(flags[0].evidence, vec!["method_count".to_string()]);
    }

    #[test]
    fn flagging_unknown_entity_is_a_noop() {
        let store = store_with_class();
        let enricher = GraphEnricher::new(&store);
        enricher
            .flag_entity("nope", "D", 0.5, &[], Severity::Low)
            .unwrap();
        assert!(enricher.flags_for("nope").is_empty());
    }

    #[test]
    fn cleanup_removes_metadata_and_edges() {
        let store = store_with_class();
        let enricher = GraphEnricher::new(&store);
        enricher.try_flag("a.py::Widget:1", "D1", 0.5, &[], Severity::Low);
        enricher.try_flag("a.py::Widget:1", "D2", 0.5, &[], Severity::Low);

        assert_eq!(enricher.cleanup().unwrap(), 2);
        assert!(enricher.flags_for("a.py::Widget:1").is_empty());
        assert!(store
            .nodes_with_label(NodeLabel::DetectorMetadata)
            .is_empty());
        // The entity itself is untouched.
        assert!(store.node_by_qualified_name("a.py::Widget:1").is_some());
    }

    #[test]
    fn confidence_is_clamped() {
        let store = store_with_class();
        let enricher = GraphEnricher::new(&store);
        enricher
            .flag_entity("a.py::Widget:1", "D", 7.0, &[], Severity::Low)
            .unwrap();
        assert_eq!(enricher.flags_for("a.py::Widget:1")[0].confidence, 1.0);
    }
}
