use tree_sitter::Node;

/// Cyclomatic complexity: 1 + count of decision points in the subtree.
/// Decision points are branches, loops, boolean operators (n-ary chains
/// parse as nested binary nodes, giving the n-1 count), exception handlers,
/// context managers and assertions.
pub fn cyclomatic_complexity(node: &Node) -> u32 {
    1 + count_decision_points(node)
}

fn count_decision_points(node: &Node) -> u32 {
    let mut count = if is_decision_point(node.kind()) { 1 } else { 0 };

    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            count += count_decision_points(&cursor.node());
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    count
}

fn is_decision_point(kind: &str) -> bool {
    matches!(
        kind,
        "if_statement"
            | "elif_clause"
            | "while_statement"
            | "for_statement"
            | "except_clause"
            | "with_statement"
            | "assert_statement"
            | "boolean_operator"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("load python grammar");
        parser.parse(code, None).expect("parse code")
    }

    #[test]
    fn simple_function_is_one() {
        let code = "def f():\n    return 42\n";
        let tree = parse(code);
        assert_eq!(cyclomatic_complexity(&tree.root_node()), 1);
    }

    #[test]
    fn single_if_is_two() {
        let code = "def f(x):\n    if x:\n        return 1\n    return 0\n";
        let tree = parse(code);
        assert_eq!(cyclomatic_complexity(&tree.root_node()), 2);
    }

    #[test]
    fn elif_chain_counts_each_branch() {
        let code = "def f(x):\n    if x == 1:\n        pass\n    elif x == 2:\n        pass\n    elif x == 3:\n        pass\n";
        let tree = parse(code);
        // if + two elif clauses
        assert_eq!(cyclomatic_complexity(&tree.root_node()), 4);
    }

    #[test]
    fn boolean_chain_counts_n_minus_one() {
        let code = "def f(a, b, c):\n    return a and b and c\n";
        let tree = parse(code);
        // `a and b and c` parses as two nested boolean_operator nodes.
        assert_eq!(cyclomatic_complexity(&tree.root_node()), 3);
    }

    #[test]
    fn loops_handlers_and_context_managers_count() {
        let code = "def f(items):\n    for i in items:\n        pass\n    while True:\n        break\n    try:\n        pass\n    except ValueError:\n        pass\n    with open('x') as fh:\n        pass\n    assert items\n";
        let tree = parse(code);
        // for + while + except + with + assert
        assert_eq!(cyclomatic_complexity(&tree.root_node()), 6);
    }

    #[test]
    fn ternary_is_not_a_decision_point() {
        let code = "def f(x):\n    return 1 if x else 0\n";
        let tree = parse(code);
        assert_eq!(cyclomatic_complexity(&tree.root_node()), 1);
    }
}
