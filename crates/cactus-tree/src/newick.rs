//! Newick reader and writer.
//!
//! Labels may be bare or single-quoted (`''` escapes a quote inside a quoted
//! label). Bracket comments are skipped. Bare labels are kept literally; no
//! underscore-to-space translation is applied.

use crate::error::TreeError;
use crate::tree::{NodeId, Tree};

const LABEL_STOP: &[u8] = b"(),:;[]'";

#[derive(Debug, Default)]
struct RawNode {
    name: Option<String>,
    branch_length: Option<f64>,
    children: Vec<RawNode>,
}

/// Parses newick text into a [`Tree`].
///
/// With `add_implied_root`, a root that carries a branch length gets an
/// unnamed parent so that the length describes a real edge. Manifests keep
/// this off and take their trees literally.
pub fn parse_newick(text: &str, add_implied_root: bool) -> Result<Tree, TreeError> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        text,
        pos: 0,
    };
    parser.skip_ignorable()?;
    if parser.peek().is_none() {
        return Err(TreeError::EmptyNewick);
    }
    let raw = parser.parse_subtree()?;
    parser.skip_ignorable()?;
    match parser.peek() {
        Some(b';') => {
            parser.pos += 1;
            parser.skip_ignorable()?;
            if parser.peek().is_some() {
                return Err(TreeError::TrailingInput { offset: parser.pos });
            }
        }
        None => {}
        Some(_) => return Err(parser.unexpected("',' or ';'")),
    }

    let tree = if add_implied_root && raw.branch_length.is_some() {
        let mut tree = Tree::with_root(None);
        let root = tree.root();
        attach(&mut tree, root, raw);
        tree
    } else {
        let mut tree = Tree::with_root(raw.name.as_deref());
        let root = tree.root();
        tree.set_branch_length(root, raw.branch_length);
        for child in raw.children {
            attach(&mut tree, root, child);
        }
        tree
    };
    Ok(tree)
}

fn attach(tree: &mut Tree, parent: NodeId, raw: RawNode) {
    let id = tree.add_child(parent, raw.name.as_deref(), raw.branch_length);
    for child in raw.children {
        attach(tree, id, child);
    }
}

/// Writes `tree` as a single line of newick terminated by `;`.
pub fn write_newick(tree: &Tree) -> String {
    let mut out = String::new();
    write_node(tree, tree.root(), &mut out);
    out.push(';');
    out
}

fn write_node(tree: &Tree, id: NodeId, out: &mut String) {
    let children = tree.children(id);
    if !children.is_empty() {
        out.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_node(tree, *child, out);
        }
        out.push(')');
    }
    if let Some(name) = tree.name(id) {
        out.push_str(&quote_label(name));
    }
    if let Some(length) = tree.branch_length(id) {
        out.push(':');
        out.push_str(&length.to_string());
    }
}

fn quote_label(name: &str) -> String {
    let needs_quotes = name.is_empty()
        || name
            .bytes()
            .any(|b| b.is_ascii_whitespace() || LABEL_STOP.contains(&b));
    if needs_quotes {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn unexpected(&self, expected: &'static str) -> TreeError {
        match self.text[self.pos..].chars().next() {
            Some(found) => TreeError::UnexpectedChar {
                offset: self.pos,
                found,
                expected,
            },
            None => TreeError::UnexpectedEnd { expected },
        }
    }

    fn skip_ignorable(&mut self) -> Result<(), TreeError> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'[') => {
                    let start = self.pos;
                    let end = self.bytes[start..]
                        .iter()
                        .position(|b| *b == b']')
                        .ok_or(TreeError::UnterminatedComment { offset: start })?;
                    self.pos = start + end + 1;
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_subtree(&mut self) -> Result<RawNode, TreeError> {
        let mut node = RawNode::default();
        self.skip_ignorable()?;
        if self.peek() == Some(b'(') {
            self.pos += 1;
            loop {
                node.children.push(self.parse_subtree()?);
                self.skip_ignorable()?;
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.unexpected("',' or ')'")),
                }
            }
        }
        self.skip_ignorable()?;
        node.name = self.parse_label()?;
        self.skip_ignorable()?;
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_ignorable()?;
            node.branch_length = Some(self.parse_length()?);
        }
        Ok(node)
    }

    fn parse_label(&mut self) -> Result<Option<String>, TreeError> {
        if self.peek() == Some(b'\'') {
            let start = self.pos;
            self.pos += 1;
            let mut label = String::new();
            loop {
                let rest = &self.text[self.pos..];
                let Some(close) = rest.find('\'') else {
                    return Err(TreeError::UnterminatedQuote { offset: start });
                };
                label.push_str(&rest[..close]);
                self.pos += close + 1;
                if self.peek() == Some(b'\'') {
                    label.push('\'');
                    self.pos += 1;
                } else {
                    return Ok(Some(label));
                }
            }
        }
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || LABEL_STOP.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        Ok((self.pos > start).then(|| self.text[start..self.pos].to_string()))
    }

    fn parse_length(&mut self) -> Result<f64, TreeError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw = &self.text[start..self.pos];
        if raw.is_empty() {
            return Err(self.unexpected("a branch length"));
        }
        // overflowing lengths parse as infinity, which cannot be written back
        match raw.parse::<f64>() {
            Ok(length) if length.is_finite() => Ok(length),
            _ => Err(TreeError::InvalidBranchLength {
                offset: start,
                text: raw.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_newick_named_internal_nodes() {
        let tree = parse_newick("((A:1,B:1)AB:1,C:1)root;", false).unwrap();
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.name(tree.root()), Some("root"));
        let leaves: Vec<&str> = tree
            .leaves()
            .into_iter()
            .filter_map(|id| tree.name(id))
            .collect();
        assert_eq!(leaves, vec!["A", "B", "C"]);
        let ab = tree.find_by_name("AB").unwrap();
        assert_eq!(tree.branch_length(ab), Some(1.0));
        assert_eq!(tree.parent(ab), Some(tree.root()));
    }

    #[test]
    fn test_write_newick_round_trip() {
        for text in [
            "((A:1,B:1)AB:1,C:1)root;",
            "((human:0.006,chimp:0.0065)Anc1:0.1,(mouse:0.08,rat:0.09)Anc2:0.2)Anc0;",
            "(A,(B,C),D);",
            "('two words':0.5,'it''s')r;",
        ] {
            let tree = parse_newick(text, false).unwrap();
            assert_eq!(write_newick(&tree), text);
        }
    }

    #[test]
    fn test_parse_newick_whitespace_and_comments() {
        let tree = parse_newick("  ( A : 1.5 [a comment] ,\n B )  root ;\n", false).unwrap();
        assert_eq!(write_newick(&tree), "(A:1.5,B)root;");
    }

    #[test]
    fn test_parse_newick_without_semicolon() {
        let tree = parse_newick("(A,B)r", false).unwrap();
        assert_eq!(write_newick(&tree), "(A,B)r;");
    }

    #[test]
    fn test_parse_newick_implied_root() {
        let literal = parse_newick("(A:1,B:1)AB:0.5;", false).unwrap();
        assert_eq!(literal.name(literal.root()), Some("AB"));
        assert_eq!(literal.node_count(), 3);

        let rooted = parse_newick("(A:1,B:1)AB:0.5;", true).unwrap();
        assert_eq!(rooted.name(rooted.root()), None);
        assert_eq!(rooted.node_count(), 4);
        assert_eq!(write_newick(&rooted), "((A:1,B:1)AB:0.5);");

        let no_length = parse_newick("(A:1,B:1)AB;", true).unwrap();
        assert_eq!(no_length.node_count(), 3);
    }

    #[test]
    fn test_parse_newick_errors() {
        assert_eq!(parse_newick("  ", false).unwrap_err(), TreeError::EmptyNewick);
        assert_eq!(
            parse_newick("(A,B", false).unwrap_err(),
            TreeError::UnexpectedEnd {
                expected: "',' or ')'"
            }
        );
        assert_eq!(
            parse_newick("(A:x,B);", false).unwrap_err(),
            TreeError::UnexpectedChar {
                offset: 3,
                found: 'x',
                expected: "a branch length"
            }
        );
        assert_eq!(
            parse_newick("(A:1.2.3,B);", false).unwrap_err(),
            TreeError::InvalidBranchLength {
                offset: 3,
                text: "1.2.3".to_string()
            }
        );
        assert_eq!(
            parse_newick("(A:1e400,B:1)r;", false).unwrap_err(),
            TreeError::InvalidBranchLength {
                offset: 3,
                text: "1e400".to_string()
            }
        );
        assert_eq!(
            parse_newick("('A,B);", false).unwrap_err(),
            TreeError::UnterminatedQuote { offset: 1 }
        );
        assert_eq!(
            parse_newick("(A,B)r; (C)", false).unwrap_err(),
            TreeError::TrailingInput { offset: 8 }
        );
        assert_eq!(
            parse_newick("(A[open,B);", false).unwrap_err(),
            TreeError::UnterminatedComment { offset: 2 }
        );
    }
}
