use miette::{IntoDiagnostic, Result};
use tree_sitter::{Node, Parser, Tree};

/// Parse Go source code into a tree-sitter Tree.
pub fn parse(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    let language = tree_sitter_go::LANGUAGE;
    parser.set_language(&language.into()).into_diagnostic()?;

    parser
        .parse(source, None)
        .ok_or_else(|| miette::miette!("Failed to parse Go source"))
}

/// Byte range of the first ERROR or MISSING node, in document order.
pub fn first_syntax_error(tree: &Tree) -> Option<(usize, usize)> {
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }
    find_error(root)
}

fn find_error(node: Node) -> Option<(usize, usize)> {
    if node.is_error() || node.is_missing() {
        return Some((node.start_byte(), node.end_byte()));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = find_error(child) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_struct_literal() {
        let source = r#"
package main

import "example.com/demo/users"

func main() {
    u := users.User{Name: "doej", ID: 101}
    _ = u
}
"#;
        let tree = parse(source).unwrap();
        assert!(!tree.root_node().has_error());
        assert_eq!(first_syntax_error(&tree), None);
    }

    #[test]
    fn test_reports_first_syntax_error() {
        let source = "package main\n\nfunc main() {\n    u := users.User{Name: }\n}\n";
        let tree = parse(source).unwrap();
        let (start, _) = first_syntax_error(&tree).expect("syntax error expected");
        assert!(start > source.find("func").unwrap());
    }
}
