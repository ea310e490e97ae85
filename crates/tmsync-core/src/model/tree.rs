// ── Configuration trees ──
//
// A `ConfigTree` maps absolute device object paths (`/Tenant/App/pool`)
// to the object's tmsh command and property bag.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::Value;

/// One device object: its tmsh command, properties, and the property
/// names excluded from comparison.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigObject {
    pub command: String,
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ignore: BTreeSet<String>,
}

impl ConfigObject {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            properties: IndexMap::new(),
            ignore: BTreeSet::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Builder-style ignore-list entry.
    #[must_use]
    pub fn ignoring(mut self, name: impl Into<String>) -> Self {
        self.ignore.insert(name.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// The properties as a single map value, for whole-object diff entries.
    pub fn properties_value(&self) -> Value {
        Value::Map(self.properties.clone())
    }
}

/// Device object tree keyed by absolute object path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree(IndexMap<String, ConfigObject>);

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&ConfigObject> {
        self.0.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut ConfigObject> {
        self.0.get_mut(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, object: ConfigObject) -> Option<ConfigObject> {
        self.0.insert(path.into(), object)
    }

    /// Remove an object, keeping the relative order of the rest.
    pub fn remove(&mut self, path: &str) -> Option<ConfigObject> {
        self.0.shift_remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigObject)> {
        self.0.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// All paths of `self` followed by the paths only present in `other`.
    pub fn union_paths(&self, other: &Self) -> Vec<String> {
        let mut paths: Vec<String> = self.0.keys().cloned().collect();
        paths.extend(other.0.keys().filter(|p| !self.contains(p)).cloned());
        paths
    }

    /// Objects whose command equals `command`.
    pub fn by_command<'a>(
        &'a self,
        command: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a ConfigObject)> + 'a {
        self.0.iter().filter(move |(_, o)| o.command == command)
    }
}

impl FromIterator<(String, ConfigObject)> for ConfigTree {
    fn from_iter<I: IntoIterator<Item = (String, ConfigObject)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ConfigTree {
    type Item = (&'a String, &'a ConfigObject);
    type IntoIter = indexmap::map::Iter<'a, String, ConfigObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Partition name of an absolute path (`/Tenant/App/x` -> `Tenant`).
pub fn partition_of(path: &str) -> Option<&str> {
    path.strip_prefix('/')?.split('/').next().filter(|p| !p.is_empty())
}

/// Folder depth of a container path: `/T/` is 1, `/T/A/` is 2.
pub fn container_depth(path: &str) -> usize {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty()).count()
}
