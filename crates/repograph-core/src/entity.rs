use crate::types::{NodeLabel, RelType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// An entity extracted from one source file. References between entities are
/// textual qualified names until the batch loader resolves them; the
/// extractor never builds a pointer graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub qualified_name: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub docstring: Option<String>,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntityKind {
    File {
        language: String,
        loc: u32,
        hash: String,
        last_modified: Option<DateTime<Utc>>,
        exports: Vec<String>,
    },
    Module {
        is_external: bool,
        package: Option<String>,
        is_dynamic_import: bool,
    },
    Class {
        is_abstract: bool,
        complexity: u32,
        decorators: Vec<String>,
    },
    Function {
        parameters: Vec<String>,
        parameter_types: BTreeMap<String, String>,
        return_type: Option<String>,
        complexity: u32,
        is_async: bool,
        is_method: bool,
        decorators: Vec<String>,
        yield_count: u32,
        max_chain_depth: u32,
    },
    Attribute {
        is_class_attribute: bool,
    },
}

impl Entity {
    pub fn label(&self) -> NodeLabel {
        match self.kind {
            EntityKind::File { .. } => NodeLabel::File,
            EntityKind::Module { .. } => NodeLabel::Module,
            EntityKind::Class { .. } => NodeLabel::Class,
            EntityKind::Function { .. } => NodeLabel::Function,
            EntityKind::Attribute { .. } => NodeLabel::Attribute,
        }
    }

    /// Flatten into the property map the graph store persists.
    pub fn to_properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("name".into(), json!(self.name));
        props.insert("qualifiedName".into(), json!(self.qualified_name));
        props.insert("filePath".into(), json!(self.file_path));
        props.insert("lineStart".into(), json!(self.line_start));
        props.insert("lineEnd".into(), json!(self.line_end));
        if let Some(doc) = &self.docstring {
            props.insert("docstring".into(), json!(doc));
        }

        match &self.kind {
            EntityKind::File {
                language,
                loc,
                hash,
                last_modified,
                exports,
            } => {
                props.insert("language".into(), json!(language));
                props.insert("loc".into(), json!(loc));
                props.insert("hash".into(), json!(hash));
                if let Some(ts) = last_modified {
                    props.insert("lastModified".into(), json!(ts.to_rfc3339()));
                }
                props.insert("exports".into(), json!(exports));
            }
            EntityKind::Module {
                is_external,
                package,
                is_dynamic_import,
            } => {
                props.insert("isExternal".into(), json!(is_external));
                props.insert("package".into(), json!(package));
                props.insert("isDynamicImport".into(), json!(is_dynamic_import));
            }
            EntityKind::Class {
                is_abstract,
                complexity,
                decorators,
            } => {
                props.insert("isAbstract".into(), json!(is_abstract));
                props.insert("complexity".into(), json!(complexity));
                props.insert("decorators".into(), json!(decorators));
            }
            EntityKind::Function {
                parameters,
                parameter_types,
                return_type,
                complexity,
                is_async,
                is_method,
                decorators,
                yield_count,
                max_chain_depth,
            } => {
                props.insert("parameters".into(), json!(parameters));
                props.insert("parameterTypes".into(), json!(parameter_types));
                if let Some(rt) = return_type {
                    props.insert("returnType".into(), json!(rt));
                }
                props.insert("complexity".into(), json!(complexity));
                props.insert("isAsync".into(), json!(is_async));
                props.insert("isMethod".into(), json!(is_method));
                props.insert("decorators".into(), json!(decorators));
                props.insert("yieldCount".into(), json!(yield_count));
                props.insert("maxChainDepth".into(), json!(max_chain_depth));
            }
            EntityKind::Attribute { is_class_attribute } => {
                props.insert("isClassAttribute".into(), json!(is_class_attribute));
            }
        }

        props
    }
}

/// A relationship between two entities, addressed by qualified name until
/// the loader resolves endpoints through the node-id map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub rel_type: RelType,
    pub properties: Map<String, Value>,
}

impl Relationship {
    pub fn new(source: impl Into<String>, target: impl Into<String>, rel_type: RelType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            rel_type,
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_properties_flatten() {
        let entity = Entity {
            name: "run".into(),
            qualified_name: "a.py::run:3".into(),
            file_path: "a.py".into(),
            line_start: 3,
            line_end: 9,
            docstring: Some("Run it.".into()),
            kind: EntityKind::Function {
                parameters: vec!["self".into(), "count".into()],
                parameter_types: BTreeMap::from([("count".into(), "int".into())]),
                return_type: Some("None".into()),
                complexity: 4,
                is_async: false,
                is_method: true,
                decorators: vec![],
                yield_count: 0,
                max_chain_depth: 2,
            },
        };

        let props = entity.to_properties();
        assert_eq!(props["qualifiedName"], json!("a.py::run:3"));
        assert_eq!(props["isMethod"], json!(true));
        assert_eq!(props["complexity"], json!(4));
        assert_eq!(entity.label(), NodeLabel::Function);
    }

    #[test]
    fn file_without_docstring_omits_key() {
        let entity = Entity {
            name: "a.py".into(),
            qualified_name: "a.py".into(),
            file_path: "a.py".into(),
            line_start: 1,
            line_end: 10,
            docstring: None,
            kind: EntityKind::File {
                language: "python".into(),
                loc: 10,
                hash: "deadbeef".into(),
                last_modified: None,
                exports: vec!["run".into()],
            },
        };

        let props = entity.to_properties();
        assert!(!props.contains_key("docstring"));
        assert_eq!(props["exports"], json!(["run"]));
    }
}
