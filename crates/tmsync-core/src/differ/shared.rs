// ── Shared-resource diffing ──
//
// Nodes and virtual-addresses in the shared partition are not diffed
// literally. Their referrers (pools through members, virtuals through
// destinations) are counted in both trees and the net change is applied
// to the reference tracker; entries only describe the count transition.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::model::{
    ConfigObject, ConfigTree, DiffEntry, DiffTag, REFERENCES_KEY, SharedKind, Value, path_of,
};
use crate::refs::{RefChange, ReferenceTracker};

use super::deep::as_keyed;

/// Whether `key` names `target`, optionally followed by a port.
fn names_object(key: &str, target: &str) -> bool {
    key.strip_prefix(target)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(':') || rest.starts_with('.'))
}

/// Distinct pools or virtuals in `tree` referencing the shared object at
/// `path`. The object itself is never among them.
pub(crate) fn referrers(tree: &ConfigTree, kind: SharedKind, path: &str) -> BTreeSet<String> {
    match kind {
        SharedKind::Node => tree
            .by_command("ltm pool")
            .filter(|(_, pool)| {
                pool.get("members")
                    .is_some_and(|m| as_keyed(m).keys().any(|k| names_object(k, path)))
            })
            .map(|(p, _)| p.clone())
            .collect(),
        SharedKind::VirtualAddress => tree
            .by_command("ltm virtual")
            .filter(|(_, virt)| {
                virt.get("destination")
                    .and_then(Value::as_str)
                    .is_some_and(|d| names_object(d, path))
            })
            .map(|(p, _)| p.clone())
            .collect(),
    }
}

/// Net reference change between the two trees.
///
/// Only pools and virtuals count. A shared object nothing references on
/// either side is a standalone declaration and counts as its own referrer.
pub(crate) fn reference_delta(
    obj: &SharedObject<'_>,
    current_tree: &ConfigTree,
    desired_tree: &ConfigTree,
) -> i64 {
    let before = referrers(current_tree, obj.kind, obj.path);
    let after = referrers(desired_tree, obj.kind, obj.path);
    if before.is_empty() && after.is_empty() {
        return i64::from(obj.desired.is_some()) - i64::from(obj.current.is_some());
    }
    let added = i64::try_from(after.difference(&before).count()).unwrap_or(i64::MAX);
    let removed = i64::try_from(before.difference(&after).count()).unwrap_or(i64::MAX);
    debug!(path = obj.path, added, removed, "shared object referrers");
    added - removed
}

/// Metadata block carrying a reference count.
pub(crate) fn references_metadata(count: i64) -> Value {
    let mut entry = IndexMap::new();
    entry.insert("value".to_owned(), Value::Int(count));
    entry.insert("persist".to_owned(), Value::String("true".into()));
    let mut metadata = IndexMap::new();
    metadata.insert(REFERENCES_KEY.to_owned(), Value::Map(entry));
    Value::Map(metadata)
}

fn count_edit(path: &str, kind: SharedKind, from: i64, to: i64) -> DiffEntry {
    DiffEntry::edited(
        path_of(path, &["metadata".into(), REFERENCES_KEY.into(), "value".into()]),
        Value::Int(from),
        Value::Int(to),
    )
    .with_command(kind.command())
    .tagged(DiffTag::SharedReference)
}

fn fallback_object(kind: SharedKind, address: &str) -> ConfigObject {
    ConfigObject::new(kind.command()).with("address", address)
}

/// Inputs for one shared object.
pub(crate) struct SharedObject<'t> {
    pub path: &'t str,
    pub kind: SharedKind,
    pub current: Option<&'t ConfigObject>,
    pub desired: Option<&'t ConfigObject>,
}

impl SharedObject<'_> {
    fn address(&self) -> String {
        self.desired
            .or(self.current)
            .and_then(|o| o.get("address"))
            .and_then(Value::as_str)
            .map_or_else(
                || self.path.rsplit('/').next().unwrap_or_default().to_owned(),
                ToOwned::to_owned,
            )
    }
}

/// Apply the net reference change for one shared object.
///
/// When `suppress_release` is set, decrements are not applied; the
/// converged object is written to `unchecked` instead.
pub(crate) fn diff_shared(
    obj: &SharedObject<'_>,
    current_tree: &ConfigTree,
    desired_tree: &ConfigTree,
    tracker: &mut ReferenceTracker<'_>,
    suppress_release: bool,
    unchecked: Option<&mut ConfigTree>,
    out: &mut Vec<DiffEntry>,
) {
    let SharedObject { path, kind, .. } = *obj;
    let address = obj.address();

    if tracker.lookup(kind, path).is_none() && obj.current.is_some() {
        tracker.register_external(kind, path, &address);
        return;
    }
    if tracker
        .lookup(kind, path)
        .is_some_and(|r| r.is_externally_owned())
    {
        debug!(path, "skipping externally owned shared object");
        return;
    }

    // Address edits surface for the compiler's immutability check.
    if kind == SharedKind::VirtualAddress {
        let address_of = |o: Option<&ConfigObject>| o.and_then(|o| o.get("address")).cloned();
        if let (Some(from), Some(to)) = (address_of(obj.current), address_of(obj.desired)) {
            if from != to {
                out.push(
                    DiffEntry::edited(path_of(path, &["address".into()]), from, to)
                        .with_command(kind.command())
                        .tagged(DiffTag::SharedReference),
                );
            }
        }
    }

    let net = reference_delta(obj, current_tree, desired_tree);

    if net > 0 {
        match tracker.acquire(kind, path, &address, net) {
            RefChange::Created { count } if obj.current.is_none() => {
                let mut object = obj
                    .desired
                    .cloned()
                    .unwrap_or_else(|| fallback_object(kind, &address));
                object
                    .properties
                    .insert("metadata".to_owned(), references_metadata(count));
                out.push(
                    DiffEntry::new(path_of(path, &[]), object.properties_value())
                        .with_command(kind.command())
                        .tagged(DiffTag::SharedReference),
                );
            }
            RefChange::Created { count } => out.push(count_edit(path, kind, 0, count)),
            RefChange::Incremented { from, to } => out.push(count_edit(path, kind, from, to)),
            _ => {}
        }
    } else if net < 0 {
        if suppress_release {
            let converged = tracker.preview_release(kind, path, -net).unwrap_or(0).max(0);
            debug!(path, converged, "deferring shared release to the final pass");
            if let Some(shadow) = unchecked {
                let mut object = obj
                    .current
                    .or(obj.desired)
                    .cloned()
                    .unwrap_or_else(|| fallback_object(kind, &address));
                object
                    .properties
                    .insert("metadata".to_owned(), references_metadata(converged));
                shadow.insert(path, object);
            }
            return;
        }
        match tracker.release(kind, path, -net) {
            Ok(RefChange::Decremented { from, to }) => out.push(count_edit(path, kind, from, to)),
            Ok(RefChange::Released { .. }) => {
                let lhs = obj.current.map_or_else(
                    || fallback_object(kind, &address).properties_value(),
                    ConfigObject::properties_value,
                );
                out.push(
                    DiffEntry::deleted(path_of(path, &[]), lhs)
                        .with_command(kind.command())
                        .tagged(DiffTag::SharedReference),
                );
            }
            Ok(_) => {}
            Err(err) => error!(path, error = %err, "refusing to delete shared object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(members: &[&str]) -> ConfigObject {
        let map: IndexMap<String, Value> = members
            .iter()
            .map(|m| ((*m).to_owned(), Value::Map(IndexMap::new())))
            .collect();
        ConfigObject::new("ltm pool").with("members", map)
    }

    #[test]
    fn node_referrers_match_member_ports() {
        let mut tree = ConfigTree::new();
        tree.insert("/T/A/p1", pool(&["/Common/10.0.0.1:80"]));
        tree.insert("/T/A/p2", pool(&["/Common/10.0.0.10:80"]));
        let refs = referrers(&tree, SharedKind::Node, "/Common/10.0.0.1");
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), ["/T/A/p1"]);
    }

    #[test]
    fn ipv6_members_use_dot_port_separator() {
        let mut tree = ConfigTree::new();
        tree.insert("/T/A/p1", pool(&["/Common/2001:db8::1.443"]));
        let refs = referrers(&tree, SharedKind::Node, "/Common/2001:db8::1");
        assert_eq!(refs.len(), 1);
    }

    fn node() -> ConfigObject {
        ConfigObject::new("ltm node").with("address", "10.0.0.1")
    }

    #[test]
    fn standalone_declaration_counts_itself() {
        let node = node();
        let mut desired = ConfigTree::new();
        desired.insert("/Common/n", node.clone());
        assert!(referrers(&desired, SharedKind::Node, "/Common/n").is_empty());

        let obj = SharedObject {
            path: "/Common/n",
            kind: SharedKind::Node,
            current: None,
            desired: Some(&node),
        };
        assert_eq!(reference_delta(&obj, &ConfigTree::new(), &desired), 1);
    }

    #[test]
    fn node_already_in_current_does_not_cancel_new_pool() {
        let node = node();
        let mut current = ConfigTree::new();
        current.insert("/Common/10.0.0.1", node.clone());
        let mut desired = current.clone();
        desired.insert("/T2/A/p", pool(&["/Common/10.0.0.1:80"]));

        let obj = SharedObject {
            path: "/Common/10.0.0.1",
            kind: SharedKind::Node,
            current: Some(&node),
            desired: Some(&node),
        };
        assert_eq!(reference_delta(&obj, &current, &desired), 1);
    }

    #[test]
    fn virtual_address_referrers_match_destination() {
        let mut tree = ConfigTree::new();
        tree.insert(
            "/T/A/vs",
            ConfigObject::new("ltm virtual").with("destination", "/Common/10.1.1.1:443"),
        );
        let refs = referrers(&tree, SharedKind::VirtualAddress, "/Common/10.1.1.1");
        assert_eq!(refs.len(), 1);
    }
}
