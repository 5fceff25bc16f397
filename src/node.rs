use std::fmt;

use serde::Serialize;

/// One renderable position of a record, produced fresh on every render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayNode {
    /// A `{"reference": ...}` value; shown as a link, never expanded.
    Link { reference: String },
    /// A non-empty sequence. `items` is empty while collapsed.
    Sequence {
        path: String,
        len: usize,
        expanded: bool,
        items: Vec<SequenceItem>,
    },
    /// A non-empty record with at least one present field.
    Record { path: String, fields: Vec<Field> },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceItem {
    pub index: usize,
    /// `None` for elements with nothing to show (`null`, `[]`, `{}`).
    pub node: Option<DisplayNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub key: String,
    pub label: String,
    pub value: DisplayNode,
}

impl DisplayNode {
    /// Paths of every sequence header reachable in this tree.
    pub fn sequence_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_sequence_paths(&mut out);
        out
    }

    fn collect_sequence_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            DisplayNode::Sequence { path, items, .. } => {
                out.push(path);
                for node in items.iter().filter_map(|i| i.node.as_ref()) {
                    node.collect_sequence_paths(out);
                }
            }
            DisplayNode::Record { fields, .. } => {
                for field in fields {
                    field.value.collect_sequence_paths(out);
                }
            }
            DisplayNode::Link { .. } | DisplayNode::Text { .. } => {}
        }
    }

    pub fn field(&self, key: &str) -> Option<&DisplayNode> {
        match self {
            DisplayNode::Record { fields, .. } => {
                fields.iter().find(|f| f.key == key).map(|f| &f.value)
            }
            _ => None,
        }
    }
}

const INDENT: &str = "  ";

fn pad(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn header(expanded: bool, len: usize) -> String {
    let marker = if expanded { '▾' } else { '▸' };
    format!("{marker} [{len} items]")
}

/// Inline part of a node, written after a label or at the start of a line.
/// Returns whether the node continues on the following lines.
fn write_inline(f: &mut fmt::Formatter<'_>, node: &DisplayNode) -> Result<bool, fmt::Error> {
    match node {
        DisplayNode::Text { text } => {
            f.write_str(text)?;
            Ok(false)
        }
        DisplayNode::Link { reference } => {
            write!(f, "→ {reference}")?;
            Ok(false)
        }
        DisplayNode::Sequence { len, expanded, .. } => {
            f.write_str(&header(*expanded, *len))?;
            Ok(*expanded)
        }
        DisplayNode::Record { .. } => Ok(true),
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, node: &DisplayNode, depth: usize) -> fmt::Result {
    match node {
        DisplayNode::Record { fields, .. } => {
            for field in fields {
                pad(f, depth)?;
                write!(f, "{}:", field.label)?;
                if !matches!(field.value, DisplayNode::Record { .. }) {
                    f.write_str(" ")?;
                }
                let more = write_inline(f, &field.value)?;
                writeln!(f)?;
                if more {
                    write_block(f, &field.value, depth + 1)?;
                }
            }
        }
        DisplayNode::Sequence { items, .. } => {
            for item in items {
                pad(f, depth)?;
                match &item.node {
                    Some(DisplayNode::Record { .. }) => {
                        writeln!(f, "-")?;
                        if let Some(node) = &item.node {
                            write_block(f, node, depth + 1)?;
                        }
                    }
                    Some(node) => {
                        let more = write_inline(f, node)?;
                        writeln!(f)?;
                        if more {
                            write_block(f, node, depth + 1)?;
                        }
                    }
                    None => writeln!(f)?,
                }
            }
        }
        DisplayNode::Link { .. } | DisplayNode::Text { .. } => {}
    }
    Ok(())
}

/// Indented text outline of the tree, one line per field or element.
impl fmt::Display for DisplayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayNode::Record { .. } => write_block(f, self, 0),
            _ => {
                let more = write_inline(f, self)?;
                writeln!(f)?;
                if more {
                    write_block(f, self, 1)?;
                }
                Ok(())
            }
        }
    }
}
