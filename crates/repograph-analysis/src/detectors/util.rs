use repograph_core::{NodeLabel, RelType};
use repograph_graph::{GraphStore, NodeId, NodeRecord};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Functions defined in the repository (external placeholders excluded).
pub fn repository_functions(store: &GraphStore) -> Vec<NodeRecord> {
    store.nodes_with_label(NodeLabel::Function)
}

pub fn repository_classes(store: &GraphStore) -> Vec<NodeRecord> {
    store.nodes_with_label(NodeLabel::Class)
}

pub fn repository_files(store: &GraphStore) -> Vec<NodeRecord> {
    store.nodes_with_label(NodeLabel::File)
}

/// Methods contained by a class node.
pub fn methods_of(store: &GraphStore, class: &NodeRecord) -> Vec<NodeRecord> {
    store
        .outgoing(class.id, RelType::Contains)
        .into_iter()
        .map(|(_, node)| node)
        .filter(|node| node.label == NodeLabel::Function)
        .collect()
}

/// The class containing a method, if any.
pub fn class_of(store: &GraphStore, method: &NodeRecord) -> Option<NodeRecord> {
    store
        .incoming(method.id, RelType::Contains)
        .into_iter()
        .map(|(_, node)| node)
        .find(|node| node.label == NodeLabel::Class)
}

/// Distinct caller functions of a node.
pub fn callers_of(store: &GraphStore, id: NodeId) -> Vec<NodeRecord> {
    store
        .incoming(id, RelType::Calls)
        .into_iter()
        .map(|(_, node)| node)
        .collect()
}

/// Distinct files containing callers of a node.
pub fn caller_files(store: &GraphStore, id: NodeId) -> HashSet<String> {
    callers_of(store, id)
        .into_iter()
        .map(|caller| caller.file_path().to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

/// Simple names referenced by any IMPORTS edge's `importedName` property.
pub fn imported_names(store: &GraphStore) -> HashSet<String> {
    store
        .relationships(RelType::Imports)
        .into_iter()
        .filter_map(|rel| {
            rel.props
                .get("importedName")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect()
}

/// Textual `callName`s appearing on any CALLS edge; matches cross-file
/// references that did not resolve to a node.
pub fn called_names(store: &GraphStore) -> HashSet<String> {
    store
        .relationships(RelType::Calls)
        .into_iter()
        .filter_map(|rel| {
            rel.props
                .get("callName")
                .and_then(Value::as_str)
                .map(|name| name.rsplit('.').next().unwrap_or(name).to_string())
        })
        .collect()
}

/// The file-level import graph: File nodes and File -> File edges derived
/// from IMPORTS relationships. Module targets are resolved back to
/// repository files (absolute and relative imports); unresolvable imports
/// are external and dropped.
pub fn file_import_graph(store: &GraphStore) -> (Vec<NodeId>, Vec<(NodeId, NodeId)>) {
    let files = repository_files(store);
    let by_path: HashMap<String, NodeId> = files
        .iter()
        .map(|f| (f.file_path().to_string(), f.id))
        .collect();
    let nodes: Vec<NodeId> = files.iter().map(|f| f.id).collect();

    let mut edges = HashSet::new();
    for rel in store.relationships(RelType::Imports) {
        let Some(source) = store.node_by_id(rel.source) else {
            continue;
        };
        if source.label != NodeLabel::File {
            continue;
        }
        let Some(target) = store.node_by_id(rel.target) else {
            continue;
        };

        let target_file = if target.label == NodeLabel::File {
            Some(target.id)
        } else {
            let module = rel
                .props
                .get("fromModule")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| target.qualified_name());
            let level = rel
                .props
                .get("relativeLevel")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;
            resolve_module_to_file(module, source.file_path(), level, &by_path)
                // `from pkg import name` may name a submodule directly.
                .or_else(|| {
                    resolve_module_to_file(
                        target.qualified_name(),
                        source.file_path(),
                        level,
                        &by_path,
                    )
                })
        };

        if let Some(target_id) = target_file {
            if target_id != source.id {
                edges.insert((source.id, target_id));
            }
        }
    }

    (nodes, edges.into_iter().collect())
}

/// Resolve a dotted module name to a repository file path, trying the
/// repository root and the importing file's package directory.
fn resolve_module_to_file(
    module: &str,
    importer: &str,
    relative_level: usize,
    by_path: &HashMap<String, NodeId>,
) -> Option<NodeId> {
    if module.is_empty() {
        return None;
    }
    let module_path = module.replace('.', "/");

    let mut bases: Vec<String> = Vec::new();
    if relative_level > 0 {
        // Level 1 is the importing file's package, each further level one
        // directory up.
        let mut dir: Vec<&str> = importer.rsplit_once('/').map(|(d, _)| d).unwrap_or("").split('/').filter(|s| !s.is_empty()).collect();
        for _ in 1..relative_level {
            dir.pop();
        }
        bases.push(dir.join("/"));
    } else {
        bases.push(String::new());
        if let Some((dir, _)) = importer.rsplit_once('/') {
            bases.push(dir.to_string());
        }
    }

    for base in bases {
        let prefix = if base.is_empty() {
            module_path.clone()
        } else {
            format!("{base}/{module_path}")
        };
        for candidate in [format!("{prefix}.py"), format!("{prefix}/__init__.py")] {
            if let Some(&id) = by_path.get(&candidate) {
                return Some(id);
            }
        }
    }
    None
}
