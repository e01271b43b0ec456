//! Path queries over parsed documents
//!
//! A sub-path selects nodes inside a document tree. The syntax is a small
//! subset of yq path expressions:
//!
//! - `""` or `"."` selects the document root
//! - `a.b.c` walks mapping keys
//! - `a[0]` indexes a sequence
//! - `a.*` selects every value of a mapping
//! - `a[*]` selects every item of a sequence
//! - `a."b.c"` quotes a key containing dots
//!
//! Queries return every match; callers that need a single node use
//! [`select_one`], which refuses to guess between several.

use serde_yaml::Value as Node;

use crate::error::{Error, Result};
use crate::value::scalar_text;

/// A segment in a path expression
#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    /// A key in a mapping
    Key(String),
    /// An index in a sequence
    Index(usize),
    /// Every value of a mapping
    AnyKey,
    /// Every item of a sequence
    AnyIndex,
}

/// Name of a node's kind for error messages
pub fn kind_name(node: &Node) -> &'static str {
    match node {
        Node::Mapping(_) => "MappingNode",
        Node::Sequence(_) => "SequenceNode",
        Node::Tagged(_) => "TaggedNode",
        Node::Null | Node::Bool(_) | Node::Number(_) | Node::String(_) => "ScalarNode",
    }
}

/// Return every node matching `path` under `root`
pub fn query<'a>(root: &'a Node, path: &str) -> Result<Vec<&'a Node>> {
    let segments = parse_path(path)?;
    let mut current = vec![root];

    for segment in &segments {
        let mut next = Vec::new();
        for node in current {
            let node = untag(node);
            match (segment, node) {
                (PathSegment::Key(key), Node::Mapping(map)) => {
                    next.extend(
                        map.iter()
                            .filter(|(k, _)| scalar_text(k).as_deref() == Some(key.as_str()))
                            .map(|(_, v)| v),
                    );
                }
                (PathSegment::Index(idx), Node::Sequence(seq)) => {
                    next.extend(seq.get(*idx));
                }
                (PathSegment::AnyKey, Node::Mapping(map)) => next.extend(map.values()),
                (PathSegment::AnyIndex, Node::Sequence(seq)) => next.extend(seq.iter()),
                _ => {}
            }
        }
        current = next;
    }

    Ok(current)
}

/// Return the single node matching `path`, failing on zero or several matches
pub fn select_one<'a>(root: &'a Node, path: &str) -> Result<&'a Node> {
    let mut matches = query(root, path)?;
    if matches.len() != 1 {
        return Err(Error::query(path, matches.len()));
    }
    Ok(untag(matches.remove(0)))
}

fn untag(node: &Node) -> &Node {
    match node {
        Node::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

/// Parse a path string into segments
fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut current_key = String::new();
    let mut chars = path.chars().peekable();

    let flush = |key: &mut String, segments: &mut Vec<PathSegment>| {
        if !key.is_empty() {
            let segment = if key == "*" {
                PathSegment::AnyKey
            } else {
                PathSegment::Key(key.clone())
            };
            segments.push(segment);
            key.clear();
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '.' => flush(&mut current_key, &mut segments),
            '[' => {
                flush(&mut current_key, &mut segments);
                let mut index_str = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    index_str.push(c);
                }
                if !closed {
                    return Err(Error::query_syntax(path, "Unterminated '[' in path"));
                }
                let index_str = index_str.trim();
                if index_str == "*" {
                    segments.push(PathSegment::AnyIndex);
                } else {
                    let idx: usize = index_str.parse().map_err(|_| {
                        Error::query_syntax(
                            path,
                            format!("Invalid array index in path: {}", index_str),
                        )
                    })?;
                    segments.push(PathSegment::Index(idx));
                }
            }
            ']' => return Err(Error::query_syntax(path, "Unexpected ']' in path")),
            '"' if current_key.is_empty() => {
                let mut key = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    key.push(c);
                }
                if !closed {
                    return Err(Error::query_syntax(path, "Unterminated quote in path"));
                }
                segments.push(PathSegment::Key(key));
                if let Some(&next) = chars.peek() {
                    if next != '.' && next != '[' {
                        return Err(Error::query_syntax(
                            path,
                            format!("Unexpected '{}' after quoted key", next),
                        ));
                    }
                }
            }
            _ => current_key.push(c),
        }
    }

    flush(&mut current_key, &mut segments);

    Ok(segments)
}
