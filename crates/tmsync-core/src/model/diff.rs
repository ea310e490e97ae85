// ── Diff entries ──
//
// Output of the structural differ and sole input of the script compiler.
// Paths walk from a tree key (`path[0]`) into nested properties.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::value::Value;

/// Path segment used by the `_order_` marker for in-place reorders.
pub const ORDER_SEGMENT: &str = "_order_";

/// One step of a diff path: a map key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Key(k) => write!(f, "{k}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Key(s.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        Self::Key(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// Element-level change inside an array splice entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayChange {
    #[serde(rename = "N")]
    New,
    #[serde(rename = "D")]
    Deleted,
}

/// The four diff entry flavours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DiffKind {
    #[serde(rename = "N")]
    New,
    #[serde(rename = "D")]
    Deleted,
    #[serde(rename = "E")]
    Edited,
    #[serde(rename = "A")]
    Array { index: usize, item: ArrayChange },
}

impl DiffKind {
    /// Single-letter code (`N`, `D`, `E`, `A`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::New => "N",
            Self::Deleted => "D",
            Self::Edited => "E",
            Self::Array { .. } => "A",
        }
    }
}

/// Annotations the differ attaches for the compiler.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DiffTag {
    NeedsTransactionalScript,
    SharedReference,
    Reorder,
    CommandSwap,
    Volatile,
    TopologyRecreate,
}

/// A single typed difference between current and desired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    #[serde(flatten)]
    pub kind: DiffKind,
    pub path: Vec<PathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lhs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lhs_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs_command: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<DiffTag>,
}

impl DiffEntry {
    fn base(kind: DiffKind, path: Vec<PathSegment>) -> Self {
        Self {
            kind,
            path,
            lhs: None,
            rhs: None,
            command: None,
            lhs_command: None,
            rhs_command: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn new(path: Vec<PathSegment>, rhs: Value) -> Self {
        Self {
            rhs: Some(rhs),
            ..Self::base(DiffKind::New, path)
        }
    }

    pub fn deleted(path: Vec<PathSegment>, lhs: Value) -> Self {
        Self {
            lhs: Some(lhs),
            ..Self::base(DiffKind::Deleted, path)
        }
    }

    pub fn edited(path: Vec<PathSegment>, lhs: Value, rhs: Value) -> Self {
        Self {
            lhs: Some(lhs),
            rhs: Some(rhs),
            ..Self::base(DiffKind::Edited, path)
        }
    }

    pub fn array(path: Vec<PathSegment>, index: usize, item: ArrayChange, value: Value) -> Self {
        let mut entry = Self::base(DiffKind::Array { index, item }, path);
        match item {
            ArrayChange::New => entry.rhs = Some(value),
            ArrayChange::Deleted => entry.lhs = Some(value),
        }
        entry
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    #[must_use]
    pub fn tagged(mut self, tag: DiffTag) -> Self {
        self.tags.insert(tag);
        self
    }

    /// The tree key this entry belongs to.
    pub fn object_path(&self) -> Option<&str> {
        self.path.first().and_then(PathSegment::as_key)
    }

    /// The top-level property name, when the entry is below object level.
    pub fn property(&self) -> Option<&str> {
        self.path.get(1).and_then(PathSegment::as_key)
    }

    /// Whether the entry addresses a whole object rather than a property.
    pub fn is_whole_object(&self) -> bool {
        self.path.len() == 1
    }

    pub fn has_tag(&self, tag: DiffTag) -> bool {
        self.tags.contains(&tag)
    }

    /// `a > b > c` rendering of the path, for logs and tables.
    pub fn path_display(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

/// Build a diff path from an object path and property segments.
pub fn path_of(object: &str, rest: &[PathSegment]) -> Vec<PathSegment> {
    let mut path = Vec::with_capacity(rest.len() + 1);
    path.push(PathSegment::Key(object.to_owned()));
    path.extend_from_slice(rest);
    path
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_single_letter_kind() {
        let entry = DiffEntry::new(path_of("/T/p", &[]), Value::from("x"))
            .with_command("ltm pool")
            .tagged(DiffTag::NeedsTransactionalScript);
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["kind"], json!("N"));
        assert_eq!(v["path"], json!(["/T/p"]));
        assert_eq!(v["tags"], json!(["needs-transactional-script"]));
    }

    #[test]
    fn array_entry_round_trips_index() {
        let entry = DiffEntry::array(
            path_of("/T/v", &["rules".into()]),
            2,
            ArrayChange::Deleted,
            Value::from("/T/r"),
        );
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["kind"], json!("A"));
        assert_eq!(v["index"], json!(2));
        let back: DiffEntry = serde_json::from_value(v).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn accessors() {
        let entry = DiffEntry::edited(
            path_of("/T/p", &["monitor".into(), 0usize.into()]),
            Value::Null,
            Value::Null,
        );
        assert_eq!(entry.object_path(), Some("/T/p"));
        assert_eq!(entry.property(), Some("monitor"));
        assert!(!entry.is_whole_object());
        assert_eq!(entry.path_display(), "/T/p > monitor > 0");
    }
}
