use crate::memory::{GraphStats, MemoryGraph, NodeId, NodeRecord, RelRecord};
use crate::schema::Schema;
use parking_lot::RwLock;
use repograph_core::{
    validate_identifier, Entity, GraphConfig, NodeLabel, RelType, Relationship, RepographError,
    Result,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// The graph store. Opens on construction with exponential-backoff retries;
/// every operation runs under the same retry policy, but only transient
/// failures are retried — everything else surfaces immediately.
pub struct GraphStore {
    graph: RwLock<MemoryGraph>,
    config: GraphConfig,
}

impl GraphStore {
    pub fn connect(config: GraphConfig) -> Result<Self> {
        let store = Self {
            graph: RwLock::new(MemoryGraph::default()),
            config,
        };
        // Verify connectivity the way a remote driver would; the embedded
        // backend opens trivially but keeps the lifecycle identical.
        store.with_retry("connect", |g| {
            let _ = g.stats();
            Ok(())
        })?;
        info!(uri = %store.config.uri, "connected to graph store");
        Ok(store)
    }

    /// Run `op` under the retry policy: transient errors back off
    /// exponentially up to `max_retries`, then surface as `Unavailable`;
    /// non-transient errors fail fast.
    pub fn retry_policy<T>(
        &self,
        name: &str,
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        warn!(operation = name, attempts = attempt, error = %e, "retries exhausted");
                        return Err(RepographError::Unavailable(format!(
                            "{name} failed after {} retries: {e}",
                            self.config.max_retries
                        )));
                    }
                    let delay = self.config.backoff_delay(attempt);
                    warn!(
                        operation = name,
                        attempt,
                        max = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn with_retry<T>(
        &self,
        name: &str,
        mut op: impl FnMut(&mut MemoryGraph) -> Result<T>,
    ) -> Result<T> {
        self.retry_policy(name, || {
            let mut graph = self.graph.write();
            op(&mut graph)
        })
    }

    fn read<T>(&self, op: impl FnOnce(&MemoryGraph) -> T) -> T {
        op(&self.graph.read())
    }

    /// Create uniqueness constraints, qualified-name and language indexes,
    /// and the docstring full-text indexes. Idempotent; individual failures
    /// are logged and skipped.
    pub fn initialize_schema(&self) -> Result<()> {
        let schema = Schema::default();
        for constraint in schema.constraints() {
            debug!(constraint = constraint.name, "ensuring constraint");
        }
        for index in schema.indexes() {
            if let Err(e) = validate_identifier(index.name, "index name") {
                warn!(index = index.name, error = %e, "could not create index");
                continue;
            }
            debug!(index = index.name, "ensuring index");
        }
        self.with_retry("initialize_schema", |g| {
            g.build_docstring_index();
            Ok(())
        })?;
        info!("graph schema initialized");
        Ok(())
    }

    /// Create nodes in batch, grouped by label. `Module` entities are merged
    /// by qualified name; all other labels are straight creates. Returns the
    /// qualified-name -> id map that keys relationship resolution.
    pub fn batch_create_nodes(&self, entities: &[Entity]) -> Result<HashMap<String, NodeId>> {
        let mut by_label: HashMap<NodeLabel, Vec<&Entity>> = HashMap::new();
        for entity in entities {
            by_label.entry(entity.label()).or_default().push(entity);
        }

        let mut id_map = HashMap::new();
        for (label, group) in by_label {
            let merge = label == NodeLabel::Module;
            self.with_retry("batch_create_nodes", |g| {
                for entity in &group {
                    match g.create_node(label, entity.to_properties(), merge) {
                        Ok(id) => {
                            id_map.insert(entity.qualified_name.clone(), id);
                        }
                        Err(e @ RepographError::Schema(_)) => {
                            // Idempotent re-ingest: log and continue.
                            warn!(qualified_name = %entity.qualified_name, error = %e, "skipping node");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            })?;
        }

        info!(count = id_map.len(), "created nodes");
        Ok(id_map)
    }

    /// Create relationships in batch, grouped by type. Sources resolve
    /// through the id map then the qualified-name index; unresolvable
    /// sources are dropped with a debug log. Missing targets materialize an
    /// external placeholder node.
    pub fn batch_create_relationships(
        &self,
        relationships: &[Relationship],
        id_map: &HashMap<String, NodeId>,
    ) -> Result<usize> {
        if relationships.is_empty() {
            return Ok(0);
        }

        let mut by_type: HashMap<RelType, Vec<&Relationship>> = HashMap::new();
        for rel in relationships {
            by_type.entry(rel.rel_type).or_default().push(rel);
        }

        let mut total = 0usize;
        for (rel_type, group) in by_type {
            // The relationship-type identifier comes from the closed enum;
            // the allowlist check still runs as a formal invariant.
            validate_identifier(rel_type.as_str(), "relationship type")?;

            self.with_retry("batch_create_relationships", |g| {
                for rel in &group {
                    let source = id_map
                        .get(&rel.source)
                        .copied()
                        .or_else(|| g.resolve_qualified_name(&rel.source));
                    let Some(source) = source else {
                        debug!(source = %rel.source, rel_type = %rel_type, "dropping relationship with unknown source");
                        continue;
                    };
                    let target = id_map
                        .get(&rel.target)
                        .copied()
                        .or_else(|| g.resolve_qualified_name(&rel.target))
                        .unwrap_or_else(|| g.materialize_placeholder(&rel.target));
                    g.create_relationship(rel_type, source, target, rel.properties.clone());
                    total += 1;
                }
                Ok(())
            })?;
        }

        info!(count = total, "created relationships");
        Ok(total)
    }

    /// Delete all nodes and relationships. Used by full re-ingestion.
    pub fn clear(&self) -> Result<()> {
        self.with_retry("clear", |g| {
            g.clear();
            Ok(())
        })?;
        warn!("cleared all nodes from graph");
        Ok(())
    }

    pub fn stats(&self) -> GraphStats {
        self.read(|g| g.stats())
    }

    pub fn nodes_with_label(&self, label: NodeLabel) -> Vec<NodeRecord> {
        self.read(|g| g.nodes_with_label(label))
    }

    pub fn node_by_qualified_name(&self, qname: &str) -> Option<NodeRecord> {
        self.read(|g| g.resolve_qualified_name(qname).and_then(|id| g.node(id)))
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<NodeRecord> {
        self.read(|g| g.node(id))
    }

    pub fn relationships(&self, rel_type: RelType) -> Vec<RelRecord> {
        self.read(|g| g.relationships(rel_type))
    }

    pub fn outgoing(&self, id: NodeId, rel_type: RelType) -> Vec<(RelRecord, NodeRecord)> {
        self.read(|g| g.outgoing(id, rel_type))
    }

    pub fn incoming(&self, id: NodeId, rel_type: RelType) -> Vec<(RelRecord, NodeRecord)> {
        self.read(|g| g.incoming(id, rel_type))
    }

    /// Write one property back onto a node (used by algorithm write-back).
    /// The property key passes the identifier allowlist.
    pub fn set_node_property(&self, id: NodeId, key: &str, value: Value) -> Result<()> {
        validate_identifier(key, "property name")?;
        self.with_retry("set_node_property", |g| g.set_property(id, key, value.clone()))
    }

    /// Create a node directly (enricher metadata). Same constraint handling
    /// as batch creation.
    pub fn create_node(
        &self,
        label: NodeLabel,
        props: serde_json::Map<String, Value>,
    ) -> Result<NodeId> {
        self.with_retry("create_node", |g| g.create_node(label, props.clone(), false))
    }

    pub fn create_relationship(
        &self,
        rel_type: RelType,
        source: NodeId,
        target: NodeId,
        props: serde_json::Map<String, Value>,
    ) -> Result<u64> {
        self.with_retry("create_relationship", |g| {
            Ok(g.create_relationship(rel_type, source, target, props.clone()))
        })
    }

    /// Detach-delete every node with the given label; returns deleted count.
    pub fn delete_nodes_with_label(&self, label: NodeLabel) -> Result<usize> {
        self.with_retry("delete_nodes_with_label", |g| {
            Ok(g.delete_nodes_with_label(label))
        })
    }

    /// Full-text lookup over Function/Class docstrings.
    pub fn search_docstrings(&self, token: &str) -> Vec<NodeRecord> {
        self.read(|g| g.search_docstrings(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::EntityKind;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn store() -> GraphStore {
        GraphStore::connect(GraphConfig {
            retry_base_delay_ms: 1,
            ..Default::default()
        })
        .unwrap()
    }

    fn file_entity(path: &str) -> Entity {
        Entity {
            name: path.to_string(),
            qualified_name: path.to_string(),
            file_path: path.to_string(),
            line_start: 1,
            line_end: 10,
            docstring: None,
            kind: EntityKind::File {
                language: "python".into(),
                loc: 10,
                hash: "abc".into(),
                last_modified: None,
                exports: vec![],
            },
        }
    }

    fn function_entity(file: &str, name: &str, line: u32) -> Entity {
        Entity {
            name: name.to_string(),
            qualified_name: format!("{file}::{name}:{line}"),
            file_path: file.to_string(),
            line_start: line,
            line_end: line + 3,
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

    fn module_entity(qname: &str, file: &str) -> Entity {
        Entity {
            name: qname.rsplit('.').next().unwrap().to_string(),
            qualified_name: qname.to_string(),
            file_path: file.to_string(),
            line_start: 1,
            line_end: 1,
            docstring: None,
            kind: EntityKind::Module {
                is_external: true,
                package: None,
                is_dynamic_import: false,
            },
        }
    }

    #[test]
    fn batch_create_returns_id_map() {
        let store = store();
        let ids = store
            .batch_create_nodes(&[file_entity("a.py"), function_entity("a.py", "run", 3)])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(store.node_by_qualified_name("a.py").is_some());
        assert_eq!(store.stats().files, 1);
        assert_eq!(store.stats().functions, 1);
    }

    #[test]
    fn modules_merge_by_qualified_name() {
        let store = store();
        store
            .batch_create_nodes(&[module_entity("os.path", "a.py")])
            .unwrap();
        store
            .batch_create_nodes(&[module_entity("os.path", "b.py")])
            .unwrap();
        let modules = store.nodes_with_label(NodeLabel::Module);
        assert_eq!(modules.len(), 1);
        // ON MATCH overlays the later properties.
        assert_eq!(modules[0].file_path(), "b.py");
    }

    #[test]
    fn duplicate_create_is_skipped_not_fatal() {
        let store = store();
        store.batch_create_nodes(&[file_entity("a.py")]).unwrap();
        let ids = store.batch_create_nodes(&[file_entity("a.py")]).unwrap();
        assert!(ids.is_empty());
        assert_eq!(store.stats().files, 1);
    }

    #[test]
    fn missing_target_materializes_placeholder() {
        let store = store();
        let ids = store.batch_create_nodes(&[file_entity("a.py")]).unwrap();
        let rel = Relationship::new("a.py", "os.path", RelType::Imports)
            .with_property("line", json!(1));
        let count = store.batch_create_relationships(&[rel], &ids).unwrap();
        assert_eq!(count, 1);

        let placeholder = store.node_by_qualified_name("os.path").unwrap();
        assert!(placeholder.is_external());
        assert_eq!(placeholder.name(), "path");
    }

    #[test]
    fn placeholder_upgrades_on_real_create() {
        let store = store();
        let ids = store.batch_create_nodes(&[file_entity("a.py")]).unwrap();
        let rel = Relationship::new("a.py", "b.py", RelType::Imports);
        store.batch_create_relationships(&[rel], &ids).unwrap();
        assert!(store.node_by_qualified_name("b.py").unwrap().is_external());

        store.batch_create_nodes(&[file_entity("b.py")]).unwrap();
        let upgraded = store.node_by_qualified_name("b.py").unwrap();
        assert_eq!(upgraded.label, NodeLabel::File);
        // The placeholder's incoming edge survived the upgrade.
        assert_eq!(store.incoming(upgraded.id, RelType::Imports).len(), 1);
        assert_eq!(store.stats().files, 2);
    }

    #[test]
    fn unknown_source_drops_relationship() {
        let store = store();
        let rel = Relationship::new("ghost.py", "os", RelType::Imports);
        let count = store
            .batch_create_relationships(&[rel], &HashMap::new())
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn retry_policy_recovers_from_transient_errors() {
        let store = store();
        let mut failures_left = 2;
        let result = store.retry_policy("flaky", || {
            if failures_left > 0 {
                failures_left -= 1;
                Err(RepographError::Connection("connection reset".into()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn retry_policy_exhausts_into_unavailable() {
        let store = store();
        let result: Result<()> = store.retry_policy("down", || {
            Err(RepographError::Connection("refused".into()))
        });
        assert!(matches!(result, Err(RepographError::Unavailable(_))));
    }

    #[test]
    fn retry_policy_fails_fast_on_non_transient() {
        let store = store();
        let mut calls = 0;
        let result: Result<()> = store.retry_policy("broken", || {
            calls += 1;
            Err(RepographError::Validation("bad identifier".into()))
        });
        assert!(matches!(result, Err(RepographError::Validation(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn property_write_back_validates_key() {
        let store = store();
        let ids = store.batch_create_nodes(&[file_entity("a.py")]).unwrap();
        let id = ids["a.py"];
        store.set_node_property(id, "pagerank", json!(0.5)).unwrap();
        assert_eq!(
            store.node_by_id(id).unwrap().props["pagerank"],
            json!(0.5)
        );
        assert!(store
            .set_node_property(id, "bad key; DROP", json!(1))
            .is_err());
    }

    #[test]
    fn clear_removes_everything() {
        let store = store();
        store.batch_create_nodes(&[file_entity("a.py")]).unwrap();
        store.clear().unwrap();
        assert_eq!(store.stats(), GraphStats::default());
    }

    #[test]
    fn docstring_index_finds_tokens() {
        let store = store();
        let mut entity = function_entity("a.py", "run", 3);
        entity.docstring = Some("Compute the betweenness centrality".into());
        store.batch_create_nodes(&[entity]).unwrap();
        store.initialize_schema().unwrap();
        assert_eq!(store.search_docstrings("betweenness").len(), 1);
        assert!(store.search_docstrings("missingword").is_empty());
    }
}
