use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::node::{DisplayNode, Field, SequenceItem};

static CAPITAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([A-Z])").expect("capital letter pattern is valid"));

/// How a value is displayed. Checked in declaration order: a record with a
/// `reference` field is a link even if it also holds sequences or records.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind<'a> {
    Link(Cow<'a, str>),
    Sequence(&'a [Value]),
    Record(&'a Map<String, Value>),
    Scalar(Cow<'a, str>),
    /// `null`, `[]` and `{}`: nothing is rendered.
    Absent,
}

pub fn classify(value: &Value) -> ValueKind<'_> {
    match value {
        Value::Object(map) if map.contains_key("reference") => ValueKind::Link(
            map.get("reference")
                .and_then(format_scalar)
                .unwrap_or_default(),
        ),
        Value::Array(items) if !items.is_empty() => ValueKind::Sequence(items),
        Value::Object(map) if !map.is_empty() => ValueKind::Record(map),
        Value::Null | Value::Array(_) | Value::Object(_) => ValueKind::Absent,
        scalar => format_scalar(scalar).map_or(ValueKind::Absent, ValueKind::Scalar),
    }
}

pub fn format_scalar(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(true) => Some(Cow::Borrowed("true")),
        Value::Bool(false) => Some(Cow::Borrowed("false")),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// `birthDate` -> `birth Date`, `resourceType` -> `resource Type`.
pub fn format_key(key: &str) -> String {
    CAPITAL.replace_all(key, " $1").trim().to_string()
}

// Structural paths. Opaque keys for the expand map; built, never parsed.

pub fn sequence_path(parent: &str) -> String {
    format!("{parent}[]")
}

pub fn element_path(sequence: &str, index: usize) -> String {
    format!("{sequence}[{index}]")
}

/// Records are keyed by their `id`, string or numeric; other ids count as empty.
pub fn record_path(parent: &str, record: &Map<String, Value>) -> String {
    let id = match record.get("id") {
        Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
        Some(Value::Number(n)) => Cow::Owned(n.to_string()),
        _ => Cow::Borrowed(""),
    };
    if parent.is_empty() {
        id.into_owned()
    } else {
        format!("{parent}.{id}")
    }
}

pub fn field_path(record: &str, key: &str) -> String {
    format!("{record}.{key}")
}

/// Expand/collapse flags keyed by structural path. Owned by the view; paths
/// without a flag follow the default passed to each render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandMap(HashMap<String, bool>);

impl ExpandMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<bool> {
        self.0.get(path).copied()
    }

    pub fn is_expanded(&self, path: &str, default_expanded: bool) -> bool {
        self.get(path).unwrap_or(default_expanded)
    }

    pub fn set(&mut self, path: &str, expanded: bool) {
        self.0.insert(path.to_string(), expanded);
    }

    /// Flips the effective state of `path` and returns the new state.
    pub fn toggle(&mut self, path: &str, default_expanded: bool) -> bool {
        let next = !self.is_expanded(path, default_expanded);
        self.set(path, next);
        next
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders a record, or any value inside one. `None` when there is nothing
/// to show.
pub fn render(value: &Value, expanded: &ExpandMap, default_expanded: bool) -> Option<DisplayNode> {
    Renderer {
        expanded,
        default_expanded,
    }
    .node(value, "")
}

struct Renderer<'a> {
    expanded: &'a ExpandMap,
    default_expanded: bool,
}

impl Renderer<'_> {
    fn node(&self, value: &Value, parent: &str) -> Option<DisplayNode> {
        match classify(value) {
            ValueKind::Link(reference) => Some(DisplayNode::Link {
                reference: reference.into_owned(),
            }),
            ValueKind::Sequence(items) => Some(self.sequence(items, parent)),
            ValueKind::Record(map) => self.record(map, parent),
            ValueKind::Scalar(text) => Some(DisplayNode::Text {
                text: text.into_owned(),
            }),
            ValueKind::Absent => None,
        }
    }

    fn sequence(&self, items: &[Value], parent: &str) -> DisplayNode {
        let path = sequence_path(parent);
        let expanded = self.expanded.is_expanded(&path, self.default_expanded);
        let len = items.len();
        // Collapsed sequences are not descended into.
        let items = if expanded {
            items
                .iter()
                .enumerate()
                .map(|(index, item)| SequenceItem {
                    index,
                    node: self.node(item, &element_path(&path, index)),
                })
                .collect()
        } else {
            Vec::new()
        };
        DisplayNode::Sequence {
            path,
            len,
            expanded,
            items,
        }
    }

    fn record(&self, map: &Map<String, Value>, parent: &str) -> Option<DisplayNode> {
        let path = record_path(parent, map);
        let fields: Vec<Field> = map
            .iter()
            .filter_map(|(key, value)| {
                self.node(value, &field_path(&path, key)).map(|value| Field {
                    key: key.clone(),
                    label: format_key(key),
                    value,
                })
            })
            .collect();
        if fields.is_empty() {
            return None;
        }
        Some(DisplayNode::Record { path, fields })
    }
}
