//! Go extractor built on the tree-sitter syntax tree.
//!
//! Everything comes from one tree: top-level declarations from the root's
//! children, calls from a walk of each function body, and the control-flow
//! forest from an explicit-stack walk of the whole file.

use tracing::{debug, warn};
use tree_sitter::{Node, Tree};

use super::base::Extractor;
use crate::ast_engine::{check_parse_errors, node_kind, node_line, node_text, AstParser, NodeKind};
use crate::error::{DistillError, Result};
use crate::processing::Language;
use crate::registry::Registry;
use crate::scope::{BlockScope, SyntaxScope};
use crate::types::{
    AggregateType, ControlFlowForest, DistillerConfig, FileSummary, Function, Import, Interface,
    NodeId, Scope, Variable,
};

/// Extractor for Go source files.
#[derive(Debug, Clone)]
pub struct GoExtractor {
    parser: AstParser,
    max_depth: usize,
}

impl GoExtractor {
    pub fn new(config: &DistillerConfig) -> Self {
        Self {
            parser: AstParser::new(),
            max_depth: config.max_nesting_depth,
        }
    }

    /// Extract from a tree the caller already parsed.
    ///
    /// Any syntax error in the tree fails the whole file.
    pub fn extract_tree(
        &self,
        path: &str,
        content: &str,
        tree: &Tree,
        registry: &mut Registry,
    ) -> Result<FileSummary> {
        let root = tree.root_node();
        if root.has_error() {
            let message = check_parse_errors(tree)
                .into_iter()
                .next()
                .unwrap_or_else(|| "syntax error".to_string());
            return Err(DistillError::parse_failure(path, message));
        }

        let scope = SyntaxScope::new(tree);
        let mut summary = FileSummary::new(path, Language::Go);

        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            match node_kind(Language::Go, node.kind()) {
                NodeKind::Import => collect_imports(node, content, &mut summary.imports),
                NodeKind::TypeDeclaration => collect_types(node, content, &mut summary),
                NodeKind::Function => summary.functions.push(function_from(node, content, None)),
                NodeKind::Method => {
                    let owner = receiver_type(node, content);
                    summary.functions.push(function_from(node, content, owner));
                }
                _ => {}
            }
        }

        summary.variables = collect_globals(root, content, &scope);
        summary.control_flow = self.control_flow(path, root);

        for aggregate in &summary.types {
            registry.register_type(path, aggregate.clone());
        }
        for function in &summary.functions {
            if function.is_method() {
                registry.register_method(function.clone());
            }
            registry.register_function(path, function.clone());
        }

        debug!(
            path = %path,
            functions = summary.functions.len(),
            types = summary.types.len(),
            control_flow = summary.control_flow.len(),
            "Extracted Go file"
        );
        Ok(summary)
    }

    /// Walk the whole tree with an explicit stack, building the forest.
    ///
    /// An `if`'s `else` branch is walked with the outer parent so `else if`
    /// chains come out as siblings.
    fn control_flow(&self, path: &str, root: Node) -> ControlFlowForest {
        let mut forest = ControlFlowForest::new();
        let mut truncated = false;
        let mut stack: Vec<(Node, Option<NodeId>, usize)> = vec![(root, None, 0)];

        while let Some((node, parent, depth)) = stack.pop() {
            let mut child_parent = parent;
            let mut child_depth = depth;

            if let NodeKind::ControlFlow(kind) = node_kind(Language::Go, node.kind()) {
                let id = forest.push(kind, node_line(node), parent);
                if depth + 1 >= self.max_depth {
                    truncated = true;
                    continue;
                }
                child_parent = Some(id);
                child_depth = depth + 1;
            }

            let alternative = if node.kind() == "if_statement" {
                node.child_by_field_name("alternative")
            } else {
                None
            };

            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            for child in children.into_iter().rev() {
                if Some(child) == alternative {
                    stack.push((child, parent, depth));
                } else {
                    stack.push((child, child_parent, child_depth));
                }
            }
        }

        if truncated {
            warn!(path = %path, max_depth = self.max_depth, "Control-flow nesting truncated");
        }
        forest
    }
}

impl Extractor for GoExtractor {
    fn name(&self) -> &'static str {
        "go"
    }

    fn language(&self) -> Language {
        Language::Go
    }

    fn extract(&self, path: &str, content: &str, registry: &mut Registry) -> Result<FileSummary> {
        let parsed = self
            .parser
            .parse(content, Language::Go)
            .map_err(|e| DistillError::parse_failure(path, e.to_string()))?;
        self.extract_tree(path, content, &parsed.tree, registry)
    }

    fn description(&self) -> &'static str {
        "Syntax-tree extractor for Go"
    }
}

fn function_from(node: Node, src: &str, owner: Option<String>) -> Function {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, src))
        .unwrap_or_default();
    let mut function = Function::new(name, node_line(node));
    function.owner = owner;

    if let Some(params) = node.child_by_field_name("parameters") {
        function.args = parameters(params, src);
    }
    if let Some(result) = node.child_by_field_name("result") {
        function.returns = result_types(result, src);
    }
    if let Some(body) = node.child_by_field_name("body") {
        collect_calls(body, src, &mut function);
    }
    function
}

/// Receiver type name with pointer and type-parameter syntax stripped.
fn receiver_type(node: Node, src: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration")?;
    let type_text = node_text(param.child_by_field_name("type")?, src);
    let name = type_text
        .trim_matches(|c: char| c == '(' || c == ')')
        .trim_start_matches('*')
        .split('[')
        .next()
        .unwrap_or("")
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn parameters(list: Node, src: &str) -> Vec<Variable> {
    let mut args = Vec::new();
    let mut cursor = list.walk();
    for param in list.named_children(&mut cursor) {
        let variadic = match param.kind() {
            "parameter_declaration" => false,
            "variadic_parameter_declaration" => true,
            _ => continue,
        };
        let type_text = param
            .child_by_field_name("type")
            .map(|t| node_text(t, src))
            .unwrap_or_default();
        let type_name = if variadic {
            format!("...{}", type_text)
        } else {
            type_text.to_string()
        };
        let line = node_line(param);

        let mut names_cursor = param.walk();
        let names: Vec<&str> = param
            .children_by_field_name("name", &mut names_cursor)
            .map(|n| node_text(n, src))
            .collect();
        if names.is_empty() {
            args.push(Variable::new("_", type_name, Scope::Parameter, line));
        } else {
            for name in names {
                args.push(Variable::new(name, type_name.clone(), Scope::Parameter, line));
            }
        }
    }
    args
}

fn result_types(result: Node, src: &str) -> Vec<String> {
    if result.kind() != "parameter_list" {
        return vec![node_text(result, src).to_string()];
    }
    parameters(result, src)
        .into_iter()
        .map(|v| v.type_name)
        .collect()
}

/// Record calls to bare identifiers and one-level selectors (`pkg.Func`).
fn collect_calls(body: Node, src: &str, function: &mut Function) {
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if node_kind(Language::Go, node.kind()) == NodeKind::Call {
            if let Some(target) = node.child_by_field_name("function") {
                match target.kind() {
                    "identifier" => function.add_call(node_text(target, src)),
                    "selector_expression" => {
                        let operand = target.child_by_field_name("operand");
                        let field = target.child_by_field_name("field");
                        if let (Some(operand), Some(field)) = (operand, field) {
                            if operand.kind() == "identifier" {
                                function.add_call(format!(
                                    "{}.{}",
                                    node_text(operand, src),
                                    node_text(field, src)
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

fn collect_imports(decl: Node, src: &str, imports: &mut Vec<Import>) {
    for spec in specs(decl, "import_spec") {
        let Some(path) = spec.child_by_field_name("path") else {
            continue;
        };
        let module = node_text(path, src).trim_matches(|c: char| c == '"' || c == '`');
        let mut import = Import::new(module, node_line(spec));
        import.alias = spec
            .child_by_field_name("name")
            .map(|n| node_text(n, src).to_string());
        import.is_relative = module.starts_with("./") || module.starts_with("../");
        imports.push(import);
    }
}

/// Spec nodes of a declaration, looking through a parenthesised list.
fn specs<'t>(decl: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if child.kind() == kind {
            found.push(child);
        } else if child.kind().ends_with("_spec_list") {
            let mut inner = child.walk();
            found.extend(child.named_children(&mut inner).filter(|c| c.kind() == kind));
        }
    }
    found
}

/// `var` and `const` declarations outside any function body.
fn collect_globals(root: Node, src: &str, scope: &SyntaxScope) -> Vec<Variable> {
    let mut globals = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let spec_kind = match node_kind(Language::Go, node.kind()) {
            NodeKind::Variable => Some("var_spec"),
            NodeKind::Constant => Some("const_spec"),
            _ => None,
        };
        if let Some(spec_kind) = spec_kind {
            if !scope.is_within_callable(node.start_byte()) {
                for spec in specs(node, spec_kind) {
                    let type_name = spec
                        .child_by_field_name("type")
                        .map(|t| node_text(t, src).to_string())
                        .or_else(|| spec.child_by_field_name("value").and_then(literal_type))
                        .unwrap_or_else(|| "inferred".to_string());
                    let mut cursor = spec.walk();
                    for name in spec.children_by_field_name("name", &mut cursor) {
                        globals.push(Variable::new(
                            node_text(name, src),
                            type_name.clone(),
                            Scope::Global,
                            node_line(name),
                        ));
                    }
                }
            }
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    globals
}

fn literal_type(value: Node) -> Option<String> {
    let first = if value.kind() == "expression_list" {
        value.named_child(0)?
    } else {
        value
    };
    let type_name = match first.kind() {
        "int_literal" => "int",
        "float_literal" => "float64",
        "imaginary_literal" => "complex128",
        "rune_literal" => "rune",
        "interpreted_string_literal" | "raw_string_literal" => "string",
        "true" | "false" => "bool",
        _ => return None,
    };
    Some(type_name.to_string())
}

fn collect_types(decl: Node, src: &str, summary: &mut FileSummary) {
    let mut cursor = decl.walk();
    for spec in decl.named_children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let (Some(name), Some(ty)) = (spec.child_by_field_name("name"), spec.child_by_field_name("type")) else {
            continue;
        };
        let name = node_text(name, src);
        match ty.kind() {
            "struct_type" => {
                let mut aggregate = AggregateType::new(name, node_line(spec));
                for field in struct_fields(ty, src) {
                    aggregate.upsert_field(field);
                }
                summary.types.push(aggregate);
            }
            "interface_type" => summary.interfaces.push(Interface {
                name: name.to_string(),
                methods: interface_methods(ty, src),
                line: node_line(spec),
            }),
            _ => {}
        }
    }
}

fn struct_fields(struct_type: Node, src: &str) -> Vec<Variable> {
    let mut fields = Vec::new();
    let mut cursor = struct_type.walk();
    let Some(list) = struct_type
        .named_children(&mut cursor)
        .find(|c| c.kind() == "field_declaration_list")
    else {
        return fields;
    };

    let mut list_cursor = list.walk();
    for decl in list.named_children(&mut list_cursor) {
        if decl.kind() != "field_declaration" {
            continue;
        }
        let Some(ty) = decl.child_by_field_name("type") else {
            continue;
        };
        let type_text = node_text(ty, src);
        let line = node_line(decl);

        let mut names_cursor = decl.walk();
        let names: Vec<&str> = decl
            .children_by_field_name("name", &mut names_cursor)
            .map(|n| node_text(n, src))
            .collect();

        if names.is_empty() {
            let mut token_cursor = decl.walk();
            let pointer = decl.children(&mut token_cursor).any(|c| c.kind() == "*");
            let type_name = if pointer {
                format!("*{}", type_text)
            } else {
                type_text.to_string()
            };
            fields.push(Variable::new(embedded_name(type_text), type_name, Scope::Field, line));
        } else {
            for name in names {
                fields.push(Variable::new(name, type_text, Scope::Field, line));
            }
        }
    }
    fields
}

/// Field name Go gives an embedded type: the unqualified type name.
fn embedded_name(type_text: &str) -> &str {
    let base = type_text
        .trim_start_matches('*')
        .split('[')
        .next()
        .unwrap_or(type_text);
    base.rsplit('.').next().unwrap_or(base).trim()
}

fn interface_methods(interface: Node, src: &str) -> Vec<Function> {
    let mut methods = Vec::new();
    let mut stack = vec![interface];
    while let Some(node) = stack.pop() {
        if matches!(node.kind(), "method_elem" | "method_spec") {
            methods.push(function_from(node, src, None));
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    methods
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ControlFlowKind;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"package main

import (
	"fmt"
	str "strings"
	"./local"
)

const Limit = 10

var (
	name  string
	count = 3
)

type Base struct {
	ID int
}

type Point struct {
	*Base
	X, Y  int
	Label string
}

type Shape interface {
	Area() float64
	Scale(factor float64) error
}

func helper(values ...int) (int, error) {
	return 0, nil
}

func (p *Point) Move(dx, dy int) {
	var local = 1
	helper(dx)
	fmt.Println(str.ToUpper(p.Label))
	p.Base.Reset()
	helper(dy)
}
"#;

    fn extract(source: &str) -> (Result<FileSummary>, Registry) {
        let mut registry = Registry::new();
        let extractor = GoExtractor::new(&DistillerConfig::default());
        let summary = extractor.extract("main.go", source, &mut registry);
        (summary, registry)
    }

    fn names(vars: &[Variable]) -> Vec<(&str, &str)> {
        vars.iter()
            .map(|v| (v.name.as_str(), v.type_name.as_str()))
            .collect()
    }

    #[test]
    fn test_imports_keep_aliases() {
        let (summary, _) = extract(SOURCE);
        let summary = summary.unwrap();

        let imports: Vec<(&str, Option<&str>, bool)> = summary
            .imports
            .iter()
            .map(|i| (i.module.as_str(), i.alias.as_deref(), i.is_relative))
            .collect();
        assert_eq!(
            imports,
            vec![
                ("fmt", None, false),
                ("strings", Some("str"), false),
                ("./local", None, true),
            ]
        );
    }

    #[test]
    fn test_top_level_globals_only() {
        let (summary, _) = extract(SOURCE);
        let summary = summary.unwrap();

        assert_eq!(
            names(&summary.variables),
            vec![("Limit", "int"), ("name", "string"), ("count", "int")]
        );
        assert!(summary.variables.iter().all(|v| v.scope == Scope::Global));
    }

    #[test]
    fn test_struct_fields_flatten_embedded() {
        let (summary, _) = extract(SOURCE);
        let summary = summary.unwrap();

        let point = summary.aggregate_type("Point").unwrap();
        assert_eq!(
            names(&point.fields),
            vec![("Base", "*Base"), ("X", "int"), ("Y", "int"), ("Label", "string")]
        );
    }

    #[test]
    fn test_interface_signatures() {
        let (summary, _) = extract(SOURCE);
        let summary = summary.unwrap();

        let shape = &summary.interfaces[0];
        assert_eq!(shape.name, "Shape");
        assert_eq!(shape.methods.len(), 2);
        assert_eq!(shape.methods[0].name, "Area");
        assert_eq!(shape.methods[0].returns, vec!["float64"]);
        assert_eq!(names(&shape.methods[1].args), vec![("factor", "float64")]);
        assert_eq!(shape.methods[1].returns, vec!["error"]);
        assert!(shape.methods.iter().all(|m| m.calls.is_empty()));
    }

    #[test]
    fn test_functions_and_methods() {
        let (summary, registry) = extract(SOURCE);
        let summary = summary.unwrap();

        let helper = summary.function("helper").unwrap();
        assert_eq!(names(&helper.args), vec![("values", "...int")]);
        assert_eq!(helper.returns, vec!["int", "error"]);
        assert!(!helper.is_method());

        let mv = summary.function("Move").unwrap();
        assert_eq!(mv.owner.as_deref(), Some("Point"));
        assert_eq!(names(&mv.args), vec![("dx", "int"), ("dy", "int")]);
        assert_eq!(mv.calls, vec!["helper", "fmt.Println", "str.ToUpper"]);

        assert!(registry.contains_function("helper"));
        assert!(registry.contains_function("Move"));
        assert_eq!(registry.pending_method_count(), 1);
    }

    #[test]
    fn test_methods_bind_to_registered_type() {
        let (_, mut registry) = extract(SOURCE);

        assert_eq!(registry.bind_methods(), 0);
        let point = registry.aggregate_type("Point").unwrap();
        assert_eq!(point.methods[0].name, "Move");
    }

    #[test]
    fn test_control_flow_forest() {
        let source = "package main

func run(items []int, ch chan int) {
	for _, v := range items {
		if v > 0 {
			continue
		} else if v < -5 {
			break
		} else {
			for {
			}
		}
	}
	switch len(items) {
	case 0:
		if true {
		}
	default:
		select {
		case <-ch:
		}
	}
}
";
        let (summary, _) = extract(source);
        let forest = summary.unwrap().control_flow;

        let roots: Vec<(ControlFlowKind, usize)> =
            forest.root_nodes().map(|n| (n.kind, n.line)).collect();
        assert_eq!(
            roots,
            vec![(ControlFlowKind::For, 4), (ControlFlowKind::Switch, 14)]
        );

        let loop_children: Vec<(ControlFlowKind, usize)> = forest
            .children(forest.roots[0])
            .map(|n| (n.kind, n.line))
            .collect();
        assert_eq!(
            loop_children,
            vec![
                (ControlFlowKind::If, 5),
                (ControlFlowKind::If, 7),
                (ControlFlowKind::For, 10),
            ]
        );

        let switch_children: Vec<(ControlFlowKind, usize)> = forest
            .children(forest.roots[1])
            .map(|n| (n.kind, n.line))
            .collect();
        assert_eq!(
            switch_children,
            vec![(ControlFlowKind::If, 16), (ControlFlowKind::Select, 19)]
        );
    }

    fn nested_ifs(levels: usize) -> String {
        let mut body = String::new();
        for _ in 0..levels {
            body.push_str("if x {\n");
        }
        for _ in 0..levels {
            body.push_str("}\n");
        }
        format!("package main\n\nfunc f(x bool) {{\n{}}}\n", body)
    }

    #[test]
    fn test_nested_chain_has_sole_children() {
        let (summary, _) = extract(&nested_ifs(6));
        let forest = summary.unwrap().control_flow;

        assert_eq!(forest.len(), 6);
        assert_eq!(forest.roots.len(), 1);
        assert_eq!(forest.depth(), 6);
        for node in &forest.nodes {
            assert!(node.children.len() <= 1);
        }
    }

    #[test]
    fn test_depth_limit_truncates() {
        let mut registry = Registry::new();
        let config = DistillerConfig::default().with_max_nesting_depth(3);
        let summary = GoExtractor::new(&config)
            .extract("deep.go", &nested_ifs(10), &mut registry)
            .unwrap();

        assert_eq!(summary.control_flow.depth(), 3);
        assert_eq!(summary.control_flow.len(), 3);
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        let (summary, registry) = extract("package main\n\nfunc broken( {\n");

        assert!(matches!(summary, Err(DistillError::ParseFailure { .. })));
        assert!(registry.functions.is_empty());
    }
}
