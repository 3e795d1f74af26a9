use repograph_core::NodeLabel;

/// A uniqueness constraint declaration.
#[derive(Debug, Clone, Copy)]
pub struct Constraint {
    pub name: &'static str,
    pub label: NodeLabel,
    pub property: &'static str,
}

/// An index declaration.
#[derive(Debug, Clone, Copy)]
pub struct Index {
    pub name: &'static str,
    pub label: NodeLabel,
    pub property: &'static str,
    pub fulltext: bool,
}

/// The graph schema: uniqueness constraints and indexes the store ensures
/// at ingestion time. Initialization is idempotent.
#[derive(Debug, Default)]
pub struct Schema;

impl Schema {
    pub fn constraints(&self) -> &'static [Constraint] {
        &[
            Constraint {
                name: "file_path_unique",
                label: NodeLabel::File,
                property: "filePath",
            },
            Constraint {
                name: "class_qualified_name_unique",
                label: NodeLabel::Class,
                property: "qualifiedName",
            },
            Constraint {
                name: "function_qualified_name_unique",
                label: NodeLabel::Function,
                property: "qualifiedName",
            },
        ]
    }

    pub fn indexes(&self) -> &'static [Index] {
        &[
            Index {
                name: "file_path_idx",
                label: NodeLabel::File,
                property: "filePath",
                fulltext: false,
            },
            Index {
                name: "file_language_idx",
                label: NodeLabel::File,
                property: "language",
                fulltext: false,
            },
            Index {
                name: "class_name_idx",
                label: NodeLabel::Class,
                property: "qualifiedName",
                fulltext: false,
            },
            Index {
                name: "function_name_idx",
                label: NodeLabel::Function,
                property: "qualifiedName",
                fulltext: false,
            },
            Index {
                name: "function_docstring_idx",
                label: NodeLabel::Function,
                property: "docstring",
                fulltext: true,
            },
            Index {
                name: "class_docstring_idx",
                label: NodeLabel::Class,
                property: "docstring",
                fulltext: true,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::validate_identifier;

    #[test]
    fn all_schema_identifiers_pass_the_allowlist() {
        let schema = Schema;
        for c in schema.constraints() {
            assert!(validate_identifier(c.name, "constraint").is_ok());
        }
        for i in schema.indexes() {
            assert!(validate_identifier(i.name, "index").is_ok());
        }
    }
}
