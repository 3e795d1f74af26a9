use crate::complexity::cyclomatic_complexity;
use chrono::{DateTime, Utc};
use repograph_core::{
    apply_secrets_policy, Entity, EntityKind, NoopSecretsScanner, RelType, Relationship,
    RepographError, Result, SecretsPolicy, SecretsScanner,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tree_sitter::{Node, Parser};

/// Output of extracting one source file.
#[derive(Debug, Default)]
pub struct Extraction {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

/// Extracts entities and relationships from Python sources. Entity
/// extraction walks the AST once; relationship extraction walks it again
/// with scope tracking. Every qualified name is deterministic given
/// (filePath, node start line, parent scope).
pub struct PythonExtractor {
    policy: SecretsPolicy,
    scanner: Arc<dyn SecretsScanner>,
}

impl PythonExtractor {
    pub fn new(policy: SecretsPolicy) -> Self {
        Self {
            policy,
            scanner: Arc::new(NoopSecretsScanner),
        }
    }

    pub fn with_scanner(policy: SecretsPolicy, scanner: Arc<dyn SecretsScanner>) -> Self {
        Self { policy, scanner }
    }

    /// Extract from a file on disk; `rel_path` is the repository-relative
    /// path stored in the graph.
    pub fn extract_file(&self, rel_path: &str, abs_path: &Path) -> Result<Extraction> {
        let source = std::fs::read_to_string(abs_path)?;
        let last_modified = std::fs::metadata(abs_path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        self.extract_source(rel_path, &source, last_modified)
    }

    pub fn extract_source(
        &self,
        rel_path: &str,
        source: &str,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<Extraction> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| RepographError::Parse {
                file: rel_path.to_string(),
                message: format!("failed to load grammar: {e}"),
            })?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| RepographError::Parse {
                file: rel_path.to_string(),
                message: "parser returned no tree".into(),
            })?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(RepographError::Parse {
                file: rel_path.to_string(),
                message: "syntax error".into(),
            });
        }

        let ctx = FileContext {
            file: rel_path,
            source,
            policy: self.policy,
            scanner: self.scanner.as_ref(),
        };

        let entities = ctx.collect_entities(root, last_modified)?;
        let relationships = ctx.collect_relationships(root, &entities);

        Ok(Extraction {
            entities,
            relationships,
        })
    }
}

struct FileContext<'a> {
    file: &'a str,
    source: &'a str,
    policy: SecretsPolicy,
    scanner: &'a dyn SecretsScanner,
}

impl<'a> FileContext<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn line(&self, node: Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    fn end_line(&self, node: Node) -> u32 {
        node.end_position().row as u32 + 1
    }

    // ---- entity pass -------------------------------------------------

    fn collect_entities(
        &self,
        root: Node,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();
        entities.push(self.file_entity(root, last_modified));

        for class_node in find_classes(root) {
            let decorators = self.decorator_texts(class_node);
            entities.push(self.class_entity(class_node, &decorators)?);
            let class_scope = format!(
                "{}:{}",
                self.class_name(class_node),
                self.line(class_node)
            );
            if let Some(body) = class_node.child_by_field_name("body") {
                for func in direct_functions(body) {
                    let func_decorators = self.decorator_texts(func);
                    entities.push(self.function_entity(
                        func,
                        &func_decorators,
                        Some(&class_scope),
                    )?);
                }
            }
        }

        for func in direct_functions(root) {
            let decorators = self.decorator_texts(func);
            entities.push(self.function_entity(func, &decorators, None)?);
        }

        entities.extend(self.module_entities(root));
        entities.extend(self.attribute_entities(root));

        Ok(entities)
    }

    fn file_entity(&self, root: Node, last_modified: Option<DateTime<Utc>>) -> Entity {
        let loc = self
            .source
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count() as u32;
        let hash = format!("{:x}", Sha256::digest(self.source.as_bytes()));
        let name = Path::new(self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.file)
            .to_string();

        Entity {
            name,
            qualified_name: self.file.to_string(),
            file_path: self.file.to_string(),
            line_start: 1,
            line_end: loc.max(1),
            docstring: None,
            kind: EntityKind::File {
                language: "python".into(),
                loc,
                hash,
                last_modified,
                exports: self.extract_exports(root),
            },
        }
    }

    fn decorator_texts(&self, definition: Node) -> Vec<String> {
        decorators_of(definition)
            .into_iter()
            .map(|d| self.text(d).to_string())
            .collect()
    }

    fn class_name(&self, class_node: Node) -> String {
        class_node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default()
    }

    fn class_entity(&self, node: Node, decorators: &[String]) -> Result<Entity> {
        let name = self.class_name(node);
        let line = self.line(node);
        let qualified_name = format!("{}::{}:{}", self.file, name, line);
        let docstring = self.docstring_of(node)?;

        let is_abstract = self
            .base_expressions(node)
            .iter()
            .any(|b| b == "ABC" || b == "abc.ABC");

        Ok(Entity {
            name,
            qualified_name,
            file_path: self.file.to_string(),
            line_start: line,
            line_end: self.end_line(node),
            docstring,
            kind: EntityKind::Class {
                is_abstract,
                complexity: cyclomatic_complexity(&node),
                decorators: decorators.to_vec(),
            },
        })
    }

    fn function_entity(
        &self,
        node: Node,
        decorators: &[String],
        class_scope: Option<&str>,
    ) -> Result<Entity> {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let line = self.line(node);
        let qualified_name = function_qualified_name(
            self.file,
            class_scope,
            &name,
            &decorator_suffix(decorators),
            line,
        );
        let docstring = self.docstring_of(node)?;

        let mut parameters = Vec::new();
        let mut parameter_types = BTreeMap::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for child in params.named_children(&mut cursor) {
                match child.kind() {
                    "identifier" => parameters.push(self.text(child).to_string()),
                    "typed_parameter" => {
                        let pname = child
                            .named_child(0)
                            .map(|n| self.text(n).to_string())
                            .unwrap_or_default();
                        if let Some(ty) = child.child_by_field_name("type") {
                            parameter_types.insert(pname.clone(), self.text(ty).to_string());
                        }
                        parameters.push(pname);
                    }
                    "default_parameter" | "typed_default_parameter" => {
                        let pname = child
                            .child_by_field_name("name")
                            .map(|n| self.text(n).to_string())
                            .unwrap_or_default();
                        if let Some(ty) = child.child_by_field_name("type") {
                            parameter_types.insert(pname.clone(), self.text(ty).to_string());
                        }
                        parameters.push(pname);
                    }
                    "list_splat_pattern" | "dictionary_splat_pattern" => {
                        parameters.push(self.text(child).to_string());
                    }
                    _ => {}
                }
            }
        }

        let return_type = node
            .child_by_field_name("return_type")
            .map(|n| self.text(n).to_string());
        let is_async = has_keyword_child(node, "async");
        let yield_count = self.count_yields(node);
        let max_chain_depth = self.max_chain_depth(node);

        Ok(Entity {
            name,
            qualified_name,
            file_path: self.file.to_string(),
            line_start: line,
            line_end: self.end_line(node),
            docstring,
            kind: EntityKind::Function {
                parameters,
                parameter_types,
                return_type,
                complexity: cyclomatic_complexity(&node),
                is_async,
                is_method: class_scope.is_some(),
                decorators: decorators.to_vec(),
                yield_count,
                max_chain_depth,
            },
        })
    }

    /// Docstring passes the secrets policy before storage; FAIL aborts the
    /// file with a recoverable error.
    fn docstring_of(&self, node: Node) -> Result<Option<String>> {
        let Some(doc) = raw_docstring(node, self.source) else {
            return Ok(None);
        };
        let context = format!("{}:{}", self.file, self.line(node));
        let scan = self.scanner.scan(&doc, &context);
        apply_secrets_policy(scan, self.policy, &context)
    }

    fn count_yields(&self, func: Node) -> u32 {
        let mut count = 0;
        let Some(body) = func.child_by_field_name("body") else {
            return 0;
        };
        visit_skipping_nested_functions(body, &mut |node| {
            if node.kind() == "yield" {
                count += 1;
            }
        });
        count
    }

    fn max_chain_depth(&self, func: Node) -> u32 {
        let mut max_depth = 0u32;
        let Some(body) = func.child_by_field_name("body") else {
            return 0;
        };
        visit_skipping_nested_functions(body, &mut |node| {
            if node.kind() == "attribute" {
                let mut depth = 0u32;
                let mut current = node;
                loop {
                    match current.kind() {
                        "attribute" => {
                            depth += 1;
                            match current.child_by_field_name("object") {
                                Some(obj) => current = obj,
                                None => break,
                            }
                        }
                        "call" => match current.child_by_field_name("function") {
                            Some(f) => current = f,
                            None => break,
                        },
                        _ => break,
                    }
                }
                max_depth = max_depth.max(depth);
            }
        });
        max_depth
    }

    fn module_entities(&self, root: Node) -> Vec<Entity> {
        let mut modules: Vec<Entity> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut push = |name: String, line: u32, dynamic: bool, modules: &mut Vec<Entity>| {
            if name.is_empty() || !seen.insert(name.clone()) {
                return;
            }
            let package = name.rsplit_once('.').map(|(pkg, _)| pkg.to_string());
            modules.push(Entity {
                name: name.rsplit('.').next().unwrap_or(&name).to_string(),
                qualified_name: name,
                file_path: self.file.to_string(),
                line_start: line,
                line_end: line,
                docstring: None,
                kind: EntityKind::Module {
                    is_external: true,
                    package,
                    is_dynamic_import: dynamic,
                },
            });
        };

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "import_statement" => {
                    for (module, _alias) in self.import_names(child) {
                        push(module, self.line(child), false, &mut modules);
                    }
                }
                "import_from_statement" => {
                    if let Some(module) = self.from_module(child) {
                        push(module, self.line(child), false, &mut modules);
                    }
                }
                _ => {}
            }
        }

        // Dynamic imports with a literal-string argument, anywhere in the
        // file.
        visit_all(root, &mut |node| {
            if node.kind() == "call" {
                if let Some(module) = self.dynamic_import_target(node) {
                    push(module, self.line(node), true, &mut modules);
                }
            }
        });

        modules
    }

    /// `import a.b [as c], d` -> [("a.b", Some("c")), ("d", None)]
    fn import_names(&self, node: Node) -> Vec<(String, Option<String>)> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => out.push((self.text(child).to_string(), None)),
                "aliased_import" => {
                    let module = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| self.text(n).to_string());
                    out.push((module, alias));
                }
                _ => {}
            }
        }
        out
    }

    fn from_module(&self, node: Node) -> Option<String> {
        let module_node = node.child_by_field_name("module_name")?;
        match module_node.kind() {
            "dotted_name" => Some(self.text(module_node).to_string()),
            "relative_import" => {
                // `from .pkg import x` keeps the dotted part; bare `from .`
                // has no module of its own.
                let mut cursor = module_node.walk();
                let result = module_node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "dotted_name")
                    .map(|c| self.text(c).to_string());
                result
            }
            _ => None,
        }
    }

    fn relative_level(&self, node: Node) -> u32 {
        node.child_by_field_name("module_name")
            .filter(|m| m.kind() == "relative_import")
            .map(|m| self.text(m).chars().take_while(|c| *c == '.').count() as u32)
            .unwrap_or(0)
    }

    fn dynamic_import_target(&self, call: Node) -> Option<String> {
        let function = call.child_by_field_name("function")?;
        let is_dynamic = match function.kind() {
            "identifier" => self.text(function) == "__import__",
            "attribute" => self.dotted_name(function).as_deref() == Some("importlib.import_module"),
            _ => false,
        };
        if !is_dynamic {
            return None;
        }
        let args = call.child_by_field_name("arguments")?;
        let first = args.named_child(0)?;
        if first.kind() == "string" {
            string_literal_value(first, self.source)
        } else {
            None
        }
    }

    fn attribute_entities(&self, root: Node) -> Vec<Entity> {
        let mut attributes = Vec::new();
        let mut seen = HashSet::new();

        for class_node in find_classes(root) {
            let class_name = self.class_name(class_node);
            let class_line = self.line(class_node);
            for attr in self.self_attributes_of_class(class_node) {
                let qualified_name =
                    format!("{}::{}:{}.{}", self.file, class_name, class_line, attr);
                if seen.insert(qualified_name.clone()) {
                    attributes.push(Entity {
                        name: attr,
                        qualified_name,
                        file_path: self.file.to_string(),
                        line_start: class_line,
                        line_end: class_line,
                        docstring: None,
                        kind: EntityKind::Attribute {
                            is_class_attribute: false,
                        },
                    });
                }
            }
        }

        attributes
    }

    fn self_attributes_of_class(&self, class_node: Node) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let Some(body) = class_node.child_by_field_name("body") else {
            return out;
        };
        for func in direct_functions(body) {
            for attr in self.self_attributes_of_function(func) {
                if seen.insert(attr.clone()) {
                    out.push(attr);
                }
            }
        }
        out
    }

    fn self_attributes_of_function(&self, func: Node) -> Vec<String> {
        let mut out = Vec::new();
        visit_all(func, &mut |node| {
            if node.kind() == "attribute" {
                if let (Some(object), Some(attr)) = (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("attribute"),
                ) {
                    if object.kind() == "identifier" && self.text(object) == "self" {
                        out.push(self.text(attr).to_string());
                    }
                }
            }
        });
        out
    }

    fn extract_exports(&self, root: Node) -> Vec<String> {
        let mut exports = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() != "expression_statement" {
                continue;
            }
            let Some(assignment) = child.named_child(0).filter(|n| n.kind() == "assignment")
            else {
                continue;
            };
            let Some(left) = assignment.child_by_field_name("left") else {
                continue;
            };
            if left.kind() != "identifier" || self.text(left) != "__all__" {
                continue;
            }
            if let Some(right) = assignment.child_by_field_name("right") {
                if matches!(right.kind(), "list" | "tuple") {
                    let mut rc = right.walk();
                    for element in right.named_children(&mut rc) {
                        if element.kind() == "string" {
                            if let Some(value) = string_literal_value(element, self.source) {
                                exports.push(value);
                            }
                        }
                    }
                }
            }
        }
        exports
    }

    // ---- relationship pass -------------------------------------------

    fn collect_relationships(&self, root: Node, entities: &[Entity]) -> Vec<Relationship> {
        let mut relationships = Vec::new();

        self.import_relationships(root, &mut relationships);
        self.call_relationships(root, entities, &mut relationships);
        self.inheritance_relationships(root, &mut relationships);
        self.override_relationships(root, &mut relationships);
        self.attribute_usage_relationships(root, &mut relationships);
        self.contains_relationships(entities, &mut relationships);

        relationships
    }

    fn import_relationships(&self, root: Node, out: &mut Vec<Relationship>) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "import_statement" => {
                    for (module, alias) in self.import_names(child) {
                        out.push(
                            Relationship::new(self.file, module, RelType::Imports)
                                .with_property("alias", json!(alias))
                                .with_property("line", json!(self.line(child))),
                        );
                    }
                }
                "import_from_statement" => {
                    let module = self.from_module(child).unwrap_or_default();
                    let level = self.relative_level(child);
                    for (imported, alias) in self.imported_items(child) {
                        let target = if module.is_empty() {
                            imported.clone()
                        } else {
                            format!("{module}.{imported}")
                        };
                        out.push(
                            Relationship::new(self.file, target, RelType::Imports)
                                .with_property("alias", json!(alias))
                                .with_property("fromModule", json!(module))
                                .with_property("importedName", json!(imported))
                                .with_property("relativeLevel", json!(level))
                                .with_property("line", json!(self.line(child))),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    /// Names imported by a `from x import ...` statement.
    fn imported_items(&self, node: Node) -> Vec<(String, Option<String>)> {
        let mut out = Vec::new();
        let module = node.child_by_field_name("module_name");
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if Some(child) == module {
                continue;
            }
            match child.kind() {
                "dotted_name" => out.push((self.text(child).to_string(), None)),
                "aliased_import" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| self.text(n).to_string());
                    out.push((name, alias));
                }
                "wildcard_import" => out.push(("*".into(), None)),
                _ => {}
            }
        }
        out
    }

    fn call_relationships(
        &self,
        root: Node,
        entities: &[Entity],
        out: &mut Vec<Relationship>,
    ) {
        // Simple-name lookup for intra-file callee resolution; first entity
        // with a name wins, matching the reference extractor's first-match
        // scan.
        let mut by_name: HashMap<&str, &str> = HashMap::new();
        for entity in entities {
            by_name
                .entry(entity.name.as_str())
                .or_insert(entity.qualified_name.as_str());
        }

        let mut visitor = CallVisitor {
            ctx: self,
            class_stack: Vec::new(),
            function_stack: Vec::new(),
            calls: Vec::new(),
        };
        visitor.visit(root);

        for (caller, callee, line) in visitor.calls {
            let resolved = by_name
                .get(callee.as_str())
                .map(|q| q.to_string())
                .unwrap_or_else(|| callee.clone());
            out.push(
                Relationship::new(caller, resolved, RelType::Calls)
                    .with_property("callName", json!(callee))
                    .with_property("line", json!(line)),
            );
        }
    }

    fn base_expressions(&self, class_node: Node) -> Vec<String> {
        let mut bases = Vec::new();
        if let Some(superclasses) = class_node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for child in superclasses.named_children(&mut cursor) {
                if child.kind() == "keyword_argument" {
                    continue;
                }
                if let Some(base) = self.base_class_name(child) {
                    bases.push(base);
                }
            }
        }
        bases
    }

    fn base_class_name(&self, node: Node) -> Option<String> {
        match node.kind() {
            "identifier" => Some(self.text(node).to_string()),
            "attribute" => self.dotted_name(node),
            // Generic bases keep the unsubscripted type.
            "subscript" => node
                .child_by_field_name("value")
                .and_then(|v| self.base_class_name(v)),
            _ => None,
        }
    }

    fn dotted_name(&self, node: Node) -> Option<String> {
        let mut parts = Vec::new();
        let mut current = node;
        loop {
            match current.kind() {
                "attribute" => {
                    let attr = current.child_by_field_name("attribute")?;
                    parts.push(self.text(attr).to_string());
                    current = current.child_by_field_name("object")?;
                }
                "identifier" => {
                    parts.push(self.text(current).to_string());
                    break;
                }
                _ => break,
            }
        }
        if parts.is_empty() {
            return None;
        }
        parts.reverse();
        Some(parts.join("."))
    }

    fn inheritance_relationships(&self, root: Node, out: &mut Vec<Relationship>) {
        let local_classes: HashMap<String, u32> = find_classes(root)
            .into_iter()
            .map(|node| (self.class_name(node), self.line(node)))
            .collect();

        for class_node in find_classes(root) {
            let child_qualified = format!(
                "{}::{}:{}",
                self.file,
                self.class_name(class_node),
                self.line(class_node)
            );
            for (order, base) in self.base_expressions(class_node).iter().enumerate() {
                let target = match local_classes.get(base) {
                    Some(line) => format!("{}::{}:{}", self.file, base, line),
                    None => base.clone(),
                };
                out.push(
                    Relationship::new(child_qualified.clone(), target, RelType::Inherits)
                        .with_property("baseClass", json!(base))
                        .with_property("order", json!(order))
                        .with_property("line", json!(self.line(class_node))),
                );
            }
        }
    }

    fn override_relationships(&self, root: Node, out: &mut Vec<Relationship>) {
        struct ClassMethods {
            name: String,
            bases: Vec<String>,
            methods: HashMap<String, String>,
        }

        let mut classes: Vec<ClassMethods> = Vec::new();
        for class_node in find_classes(root) {
            let name = self.class_name(class_node);
            let scope = format!("{}:{}", name, self.line(class_node));
            let mut methods = HashMap::new();
            if let Some(body) = class_node.child_by_field_name("body") {
                for func in direct_functions(body) {
                    let method_name = func
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_default();
                    let qualified = function_qualified_name(
                        self.file,
                        Some(&scope),
                        &method_name,
                        &decorator_suffix(&self.decorator_texts(func)),
                        self.line(func),
                    );
                    methods.insert(method_name, qualified);
                }
            }
            classes.push(ClassMethods {
                name,
                bases: self.base_expressions(class_node),
                methods,
            });
        }

        for child in &classes {
            for base in &child.bases {
                let Some(parent) = classes.iter().find(|c| &c.name == base) else {
                    continue;
                };
                for (method_name, child_method) in &child.methods {
                    if method_name.starts_with("__") && method_name.ends_with("__") {
                        continue;
                    }
                    if let Some(parent_method) = parent.methods.get(method_name) {
                        out.push(
                            Relationship::new(
                                child_method.clone(),
                                parent_method.clone(),
                                RelType::Overrides,
                            )
                            .with_property("methodName", json!(method_name))
                            .with_property("childClass", json!(child.name))
                            .with_property("parentClass", json!(base)),
                        );
                    }
                }
            }
        }
    }

    fn attribute_usage_relationships(&self, root: Node, out: &mut Vec<Relationship>) {
        for class_node in find_classes(root) {
            let class_name = self.class_name(class_node);
            let class_line = self.line(class_node);
            let scope = format!("{class_name}:{class_line}");
            let Some(body) = class_node.child_by_field_name("body") else {
                continue;
            };
            for func in direct_functions(body) {
                let method_name = func
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                let method_qualified = function_qualified_name(
                    self.file,
                    Some(&scope),
                    &method_name,
                    &decorator_suffix(&self.decorator_texts(func)),
                    self.line(func),
                );
                let mut seen = HashSet::new();
                for attr in self.self_attributes_of_function(func) {
                    if !seen.insert(attr.clone()) {
                        continue;
                    }
                    let attr_qualified =
                        format!("{}::{}:{}.{}", self.file, class_name, class_line, attr);
                    out.push(
                        Relationship::new(
                            method_qualified.clone(),
                            attr_qualified,
                            RelType::Uses,
                        )
                        .with_property("attributeName", json!(attr))
                        .with_property("className", json!(class_name)),
                    );
                }
            }
        }
    }

    /// Methods hang off their class; every other entity hangs off the file.
    fn contains_relationships(&self, entities: &[Entity], out: &mut Vec<Relationship>) {
        for entity in entities {
            match &entity.kind {
                EntityKind::File { .. } => {}
                EntityKind::Function { is_method, .. } if *is_method => {
                    // a.py::Widget:3.render:7 -> parent scope a.py::Widget:3
                    if let Some((class_part, _)) = entity.qualified_name.rsplit_once('.') {
                        out.push(Relationship::new(
                            class_part.to_string(),
                            entity.qualified_name.clone(),
                            RelType::Contains,
                        ));
                        continue;
                    }
                    out.push(Relationship::new(
                        self.file,
                        entity.qualified_name.clone(),
                        RelType::Contains,
                    ));
                }
                _ => {
                    out.push(Relationship::new(
                        self.file,
                        entity.qualified_name.clone(),
                        RelType::Contains,
                    ));
                }
            }
        }
    }
}

/// Call-site visitor with (class stack, function stack) scope tracking.
/// Calls at module level attribute to the File node so top-level usage is
/// visible to the dead-code analysis.
struct CallVisitor<'c, 'a> {
    ctx: &'c FileContext<'a>,
    class_stack: Vec<(String, u32)>,
    function_stack: Vec<String>,
    calls: Vec<(String, String, u32)>,
}

impl<'c, 'a> CallVisitor<'c, 'a> {
    fn visit(&mut self, node: Node) {
        match node.kind() {
            "class_definition" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.ctx.text(n).to_string())
                    .unwrap_or_default();
                self.class_stack.push((name, self.ctx.line(node)));
                self.visit_children(node);
                self.class_stack.pop();
                return;
            }
            "function_definition" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.ctx.text(n).to_string())
                    .unwrap_or_default();
                let decorators = decorators_of(node)
                    .iter()
                    .map(|d| self.ctx.text(*d).to_string())
                    .collect::<Vec<_>>();
                let scope = self
                    .class_stack
                    .last()
                    .map(|(c, l)| format!("{c}:{l}"));
                let qualified = function_qualified_name(
                    self.ctx.file,
                    scope.as_deref(),
                    &name,
                    &decorator_suffix(&decorators),
                    self.ctx.line(node),
                );
                self.function_stack.push(qualified);
                self.visit_children(node);
                self.function_stack.pop();
                return;
            }
            "call" => {
                let caller = self
                    .function_stack
                    .last()
                    .cloned()
                    .unwrap_or_else(|| self.ctx.file.to_string());
                if let Some(callee) = self.call_name(node) {
                    self.calls.push((caller, callee, self.ctx.line(node)));
                }
            }
            _ => {}
        }
        self.visit_children(node);
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    /// Best-effort callee name: identifier -> name, attribute chain ->
    /// dotted path. Unresolvable callees are dropped; resolvable ones stay
    /// textual on the edge for cross-file matching.
    fn call_name(&self, call: Node) -> Option<String> {
        let function = call.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(self.ctx.text(function).to_string()),
            "attribute" => {
                let mut parts = Vec::new();
                let mut current = function;
                loop {
                    match current.kind() {
                        "attribute" => {
                            parts.push(
                                self.ctx
                                    .text(current.child_by_field_name("attribute")?)
                                    .to_string(),
                            );
                            match current.child_by_field_name("object") {
                                Some(obj) => current = obj,
                                None => break,
                            }
                        }
                        "identifier" => {
                            parts.push(self.ctx.text(current).to_string());
                            break;
                        }
                        _ => break,
                    }
                }
                parts.reverse();
                Some(parts.join("."))
            }
            _ => None,
        }
    }
}

// ---- tree helpers ----------------------------------------------------

fn function_qualified_name(
    file: &str,
    class_scope: Option<&str>,
    name: &str,
    suffix: &str,
    line: u32,
) -> String {
    match class_scope {
        Some(scope) => format!("{file}::{scope}.{name}{suffix}:{line}"),
        None => format!("{file}::{name}{suffix}:{line}"),
    }
}

/// The descriptor-role suffix distinguishing same-name methods (`@property`
/// vs `@x.setter`).
fn decorator_suffix(decorators: &[String]) -> String {
    for decorator in decorators {
        if decorator == "property" {
            return "@property".into();
        }
        if let Some((_, role)) = decorator.rsplit_once('.') {
            if matches!(role, "setter" | "getter" | "deleter") {
                return format!("@{role}");
            }
        }
    }
    String::new()
}

fn has_keyword_child(node: Node, keyword: &str) -> bool {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            if cursor.node().kind() == keyword {
                return true;
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    false
}

fn decorators_of(definition: Node) -> Vec<Node> {
    let mut out = Vec::new();
    if let Some(parent) = definition.parent() {
        if parent.kind() == "decorated_definition" {
            let mut cursor = parent.walk();
            for child in parent.named_children(&mut cursor) {
                if child.kind() == "decorator" {
                    if let Some(expr) = child.named_child(0) {
                        out.push(expr);
                    }
                }
            }
        }
    }
    out
}

/// All class definitions in the file, any nesting.
fn find_classes(root: Node) -> Vec<Node> {
    let mut classes = Vec::new();
    collect_classes(root, &mut classes);
    classes
}

fn collect_classes<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    if node.kind() == "class_definition" {
        out.push(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        collect_classes(child, out);
    }
}

/// Direct function definitions of a block (module body or class body),
/// unwrapping decorated definitions.
fn direct_functions(body: Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        match child.kind() {
            "function_definition" => out.push(child),
            "decorated_definition" => {
                if let Some(definition) = child.child_by_field_name("definition") {
                    if definition.kind() == "function_definition" {
                        out.push(definition);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn visit_all<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    f(node);
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        visit_all(child, f);
    }
}

fn visit_skipping_nested_functions<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        if child.kind() == "function_definition" || child.kind() == "decorated_definition" {
            continue;
        }
        f(child);
        visit_skipping_nested_functions(child, f);
    }
}

fn raw_docstring(definition: Node, source: &str) -> Option<String> {
    let body = definition.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0).filter(|n| n.kind() == "string")?;
    string_literal_value(string, source)
}

fn string_literal_value(string: Node, source: &str) -> Option<String> {
    let text = string.utf8_text(source.as_bytes()).ok()?;
    let trimmed = text.trim_start_matches(|c: char| {
        matches!(c, 'r' | 'R' | 'b' | 'B' | 'f' | 'F' | 'u' | 'U')
    });
    let stripped = if let Some(inner) = trimmed
        .strip_prefix("\"\"\"")
        .and_then(|s| s.strip_suffix("\"\"\""))
    {
        inner
    } else if let Some(inner) = trimmed
        .strip_prefix("'''")
        .and_then(|s| s.strip_suffix("'''"))
    {
        inner
    } else if let Some(inner) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        inner
    } else if let Some(inner) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\''))
    {
        inner
    } else {
        trimmed
    };
    Some(stripped.to_string())
}
