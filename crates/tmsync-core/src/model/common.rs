// ── Shared partition state ──
//
// Nodes and virtual-addresses in the shared partition are referenced by
// many tenants. `CommonState` carries their reference counts across
// reconciliation passes; the persistence layer stores it between runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::value::Value;

/// Metadata key holding the reference count.
pub const REFERENCES_KEY: &str = "references";

/// Reference count meaning "externally owned, never auto-deleted".
pub const EXTERNALLY_OWNED: i64 = -1;

/// Which shared object family a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SharedKind {
    Node,
    VirtualAddress,
}

impl SharedKind {
    /// The tmsh command for objects of this kind.
    pub fn command(self) -> &'static str {
        match self {
            Self::Node => "ltm node",
            Self::VirtualAddress => "ltm virtual-address",
        }
    }

    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "ltm node" => Some(Self::Node),
            "ltm virtual-address" => Some(Self::VirtualAddress),
            _ => None,
        }
    }
}

/// One metadata entry on a device object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataValue {
    #[serde(default = "default_persist")]
    pub persist: bool,
    pub value: Value,
}

fn default_persist() -> bool {
    true
}

/// A shared device object tracked across tenants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedResourceRecord {
    pub full_path: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub metadata: IndexMap<String, MetadataValue>,
    #[serde(default)]
    pub common_flag: bool,
}

impl SharedResourceRecord {
    pub fn new(full_path: impl Into<String>, address: impl Into<String>, references: i64) -> Self {
        let mut record = Self {
            full_path: full_path.into(),
            address: address.into(),
            metadata: IndexMap::new(),
            common_flag: true,
        };
        record.set_references(references);
        record
    }

    /// Current reference count; a record without one counts as zero.
    pub fn references(&self) -> i64 {
        self.metadata
            .get(REFERENCES_KEY)
            .and_then(|m| m.value.as_i64())
            .unwrap_or(0)
    }

    pub fn set_references(&mut self, count: i64) {
        self.metadata.insert(
            REFERENCES_KEY.to_owned(),
            MetadataValue {
                persist: true,
                value: Value::Int(count),
            },
        );
    }

    pub fn is_externally_owned(&self) -> bool {
        self.references() == EXTERNALLY_OWNED
    }
}

/// Long-lived shared-partition state, mutated in place by the differ.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonState {
    #[serde(default)]
    pub node_list: Vec<SharedResourceRecord>,
    #[serde(default)]
    pub virtual_address_list: Vec<SharedResourceRecord>,
}

impl CommonState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, kind: SharedKind) -> &[SharedResourceRecord] {
        match kind {
            SharedKind::Node => &self.node_list,
            SharedKind::VirtualAddress => &self.virtual_address_list,
        }
    }

    pub fn list_mut(&mut self, kind: SharedKind) -> &mut Vec<SharedResourceRecord> {
        match kind {
            SharedKind::Node => &mut self.node_list,
            SharedKind::VirtualAddress => &mut self.virtual_address_list,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node_list.is_empty() && self.virtual_address_list.is_empty()
    }
}
