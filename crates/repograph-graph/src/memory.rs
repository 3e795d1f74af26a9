use repograph_core::{NodeLabel, RelType, RepographError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Opaque node identifier handed back by batch creation; keys relationship
/// resolution the way element ids did in the reference store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A node read back out of the store.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub id: NodeId,
    pub label: NodeLabel,
    pub props: Map<String, Value>,
}

impl NodeRecord {
    fn str_prop(&self, key: &str) -> &str {
        self.props.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.str_prop("name")
    }

    pub fn qualified_name(&self) -> &str {
        self.str_prop("qualifiedName")
    }

    pub fn file_path(&self) -> &str {
        self.str_prop("filePath")
    }

    pub fn line_start(&self) -> u32 {
        self.props
            .get("lineStart")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }

    pub fn line_end(&self) -> u32 {
        self.props
            .get("lineEnd")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }

    pub fn u64_prop(&self, key: &str) -> u64 {
        self.props.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn bool_prop(&self, key: &str) -> bool {
        self.props.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.props
            .get(key)
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_external(&self) -> bool {
        self.label == NodeLabel::External || self.bool_prop("external")
    }
}

/// A relationship read back out of the store.
#[derive(Debug, Clone)]
pub struct RelRecord {
    pub id: u64,
    pub rel_type: RelType,
    pub source: NodeId,
    pub target: NodeId,
    pub props: Map<String, Value>,
}

impl RelRecord {
    pub fn str_prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    pub fn line(&self) -> Option<u32> {
        self.props.get("line").and_then(Value::as_u64).map(|l| l as u32)
    }
}

/// Node and relationship counts for the ingestion summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub files: usize,
    pub classes: usize,
    pub functions: usize,
    pub relationships: usize,
}

#[derive(Debug, Clone)]
struct StoredNode {
    label: NodeLabel,
    props: Map<String, Value>,
}

#[derive(Debug, Clone)]
struct StoredRel {
    rel_type: RelType,
    source: u64,
    target: u64,
    props: Map<String, Value>,
}

/// The embedded labeled property graph. All access goes through
/// `GraphStore`, which layers the retry policy and logging on top.
#[derive(Debug, Default)]
pub(crate) struct MemoryGraph {
    nodes: BTreeMap<u64, StoredNode>,
    rels: BTreeMap<u64, StoredRel>,
    qname_index: HashMap<String, u64>,
    label_index: HashMap<NodeLabel, BTreeSet<u64>>,
    outgoing: HashMap<u64, Vec<u64>>,
    incoming: HashMap<u64, Vec<u64>>,
    docstring_index: HashMap<String, BTreeSet<u64>>,
    docstring_index_ready: bool,
    next_node_id: u64,
    next_rel_id: u64,
}

impl MemoryGraph {
    fn record(&self, id: u64) -> Option<NodeRecord> {
        self.nodes.get(&id).map(|n| NodeRecord {
            id: NodeId(id),
            label: n.label,
            props: n.props.clone(),
        })
    }

    fn qname_of(props: &Map<String, Value>) -> Result<&str> {
        props
            .get("qualifiedName")
            .and_then(Value::as_str)
            .ok_or_else(|| RepographError::Schema("node is missing qualifiedName".into()))
    }

    fn insert_node(&mut self, label: NodeLabel, props: Map<String, Value>) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        if let Some(qname) = props.get("qualifiedName").and_then(Value::as_str) {
            self.qname_index.insert(qname.to_string(), id);
        }
        self.index_docstring(id, &props);
        self.label_index.entry(label).or_default().insert(id);
        self.nodes.insert(id, StoredNode { label, props });
        id
    }

    fn index_docstring(&mut self, id: u64, props: &Map<String, Value>) {
        if !self.docstring_index_ready {
            return;
        }
        if let Some(doc) = props.get("docstring").and_then(Value::as_str) {
            for token in doc
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| t.len() > 2)
            {
                self.docstring_index
                    .entry(token.to_lowercase())
                    .or_default()
                    .insert(id);
            }
        }
    }

    /// Build the docstring full-text index over existing nodes. Idempotent.
    pub(crate) fn build_docstring_index(&mut self) {
        self.docstring_index.clear();
        self.docstring_index_ready = true;
        let entries: Vec<(u64, Map<String, Value>)> = self
            .nodes
            .iter()
            .filter(|(_, n)| matches!(n.label, NodeLabel::Function | NodeLabel::Class))
            .map(|(id, n)| (*id, n.props.clone()))
            .collect();
        for (id, props) in entries {
            self.index_docstring(id, &props);
        }
    }

    /// Create one node, honoring merge semantics for `Module` and upgrading
    /// `External` placeholders in place so qualified names stay unique.
    pub(crate) fn create_node(
        &mut self,
        label: NodeLabel,
        props: Map<String, Value>,
        merge: bool,
    ) -> Result<NodeId> {
        let qname = Self::qname_of(&props)?.to_string();

        if let Some(&existing) = self.qname_index.get(&qname) {
            let existing_label = self
                .nodes
                .get(&existing)
                .expect("qname index out of sync")
                .label;

            if merge {
                // ON MATCH SET n += entity
                let node = self.nodes.get_mut(&existing).expect("node present");
                for (k, v) in props {
                    node.props.insert(k, v);
                }
                if existing_label == NodeLabel::External {
                    self.relabel(existing, label);
                }
                return Ok(NodeId(existing));
            }

            if existing_label == NodeLabel::External {
                // Upgrade the placeholder: keep id and edges, take the real
                // label and property set.
                self.nodes.get_mut(&existing).expect("node present").props = props.clone();
                self.relabel(existing, label);
                self.index_docstring(existing, &props);
                return Ok(NodeId(existing));
            }

            return Err(RepographError::Schema(format!(
                "uniqueness violation: {qname} already exists as {existing_label}"
            )));
        }

        Ok(NodeId(self.insert_node(label, props)))
    }

    fn relabel(&mut self, id: u64, label: NodeLabel) {
        let old = self.nodes.get(&id).map(|n| n.label);
        if let Some(old) = old {
            if let Some(set) = self.label_index.get_mut(&old) {
                set.remove(&id);
            }
        }
        self.label_index.entry(label).or_default().insert(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.label = label;
        }
    }

    /// Materialize an external placeholder for a missing relationship target.
    pub(crate) fn materialize_placeholder(&mut self, qname: &str) -> NodeId {
        if let Some(&id) = self.qname_index.get(qname) {
            return NodeId(id);
        }
        let name = qname
            .rsplit("::")
            .next()
            .unwrap_or(qname)
            .rsplit('.')
            .next()
            .unwrap_or(qname)
            .to_string();
        let mut props = Map::new();
        props.insert("name".into(), json!(name));
        props.insert("qualifiedName".into(), json!(qname));
        props.insert("external".into(), json!(true));
        NodeId(self.insert_node(NodeLabel::External, props))
    }

    pub(crate) fn create_relationship(
        &mut self,
        rel_type: RelType,
        source: NodeId,
        target: NodeId,
        props: Map<String, Value>,
    ) -> u64 {
        let id = self.next_rel_id;
        self.next_rel_id += 1;
        self.rels.insert(
            id,
            StoredRel {
                rel_type,
                source: source.0,
                target: target.0,
                props,
            },
        );
        self.outgoing.entry(source.0).or_default().push(id);
        self.incoming.entry(target.0).or_default().push(id);
        id
    }

    pub(crate) fn resolve_qualified_name(&self, qname: &str) -> Option<NodeId> {
        self.qname_index.get(qname).copied().map(NodeId)
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<NodeRecord> {
        self.record(id.0)
    }

    pub(crate) fn nodes_with_label(&self, label: NodeLabel) -> Vec<NodeRecord> {
        self.label_index
            .get(&label)
            .map(|set| set.iter().filter_map(|id| self.record(*id)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn relationships(&self, rel_type: RelType) -> Vec<RelRecord> {
        self.rels
            .iter()
            .filter(|(_, r)| r.rel_type == rel_type)
            .map(|(id, r)| RelRecord {
                id: *id,
                rel_type: r.rel_type,
                source: NodeId(r.source),
                target: NodeId(r.target),
                props: r.props.clone(),
            })
            .collect()
    }

    fn adjacent(
        &self,
        ids: Option<&Vec<u64>>,
        rel_type: RelType,
        pick: impl Fn(&StoredRel) -> u64,
    ) -> Vec<(RelRecord, NodeRecord)> {
        let mut out = Vec::new();
        if let Some(ids) = ids {
            for rel_id in ids {
                if let Some(rel) = self.rels.get(rel_id) {
                    if rel.rel_type != rel_type {
                        continue;
                    }
                    if let Some(node) = self.record(pick(rel)) {
                        out.push((
                            RelRecord {
                                id: *rel_id,
                                rel_type: rel.rel_type,
                                source: NodeId(rel.source),
                                target: NodeId(rel.target),
                                props: rel.props.clone(),
                            },
                            node,
                        ));
                    }
                }
            }
        }
        out
    }

    pub(crate) fn outgoing(&self, id: NodeId, rel_type: RelType) -> Vec<(RelRecord, NodeRecord)> {
        self.adjacent(self.outgoing.get(&id.0), rel_type, |r| r.target)
    }

    pub(crate) fn incoming(&self, id: NodeId, rel_type: RelType) -> Vec<(RelRecord, NodeRecord)> {
        self.adjacent(self.incoming.get(&id.0), rel_type, |r| r.source)
    }

    pub(crate) fn set_property(&mut self, id: NodeId, key: &str, value: Value) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id.0)
            .ok_or_else(|| RepographError::Schema(format!("no node {id}")))?;
        node.props.insert(key.to_string(), value);
        Ok(())
    }

    /// Detach-delete every node carrying `label`; returns deleted node count.
    pub(crate) fn delete_nodes_with_label(&mut self, label: NodeLabel) -> usize {
        let ids: Vec<u64> = self
            .label_index
            .get(&label)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        for id in &ids {
            let rel_ids: Vec<u64> = self
                .outgoing
                .remove(id)
                .unwrap_or_default()
                .into_iter()
                .chain(self.incoming.remove(id).unwrap_or_default())
                .collect();
            for rel_id in rel_ids {
                if let Some(rel) = self.rels.remove(&rel_id) {
                    if let Some(out) = self.outgoing.get_mut(&rel.source) {
                        out.retain(|r| *r != rel_id);
                    }
                    if let Some(inc) = self.incoming.get_mut(&rel.target) {
                        inc.retain(|r| *r != rel_id);
                    }
                }
            }
            if let Some(node) = self.nodes.remove(id) {
                if let Some(qname) = node.props.get("qualifiedName").and_then(Value::as_str) {
                    self.qname_index.remove(qname);
                }
            }
        }
        self.label_index.remove(&label);
        ids.len()
    }

    pub(crate) fn clear(&mut self) {
        *self = MemoryGraph::default();
    }

    pub(crate) fn stats(&self) -> GraphStats {
        let count = |label: NodeLabel| {
            self.label_index
                .get(&label)
                .map(BTreeSet::len)
                .unwrap_or(0)
        };
        GraphStats {
            files: count(NodeLabel::File),
            classes: count(NodeLabel::Class),
            functions: count(NodeLabel::Function),
            relationships: self.rels.len(),
        }
    }

    pub(crate) fn search_docstrings(&self, token: &str) -> Vec<NodeRecord> {
        self.docstring_index
            .get(&token.to_lowercase())
            .map(|set| set.iter().filter_map(|id| self.record(*id)).collect())
            .unwrap_or_default()
    }
}
