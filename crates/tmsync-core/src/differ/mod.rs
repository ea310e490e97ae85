//! Structural differ: `ConfigTree × ConfigTree → Vec<DiffEntry>`.
//!
//! Baseline behaviour is a deep diff of each object's property bag after
//! its ignore list is applied. On top of that the differ knows a handful
//! of device rules:
//!
//! - per-command comparison strategies (keyed sets, ordered lists)
//! - interchangeable command flavours diffed by member fields
//! - volatile one-shot descriptors that always re-emit
//! - reference-counted shared nodes and virtual-addresses
//! - all-or-nothing topology collections

mod deep;
mod shared;
pub mod strategy;
mod topology;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{
    CommonState, ConfigObject, ConfigTree, DiffEntry, DiffTag, PathSegment, SharedKind, Value, path_of,
};
use crate::refs::ReferenceTracker;
use crate::topology::RankTable;

pub(crate) use shared::references_metadata;
pub(crate) use topology::{LB_SETTINGS_COMMAND, LONGEST_MATCH, TOPOLOGY_COMMAND};

use self::shared::SharedObject;
use self::strategy::{MEMBER_FIELDS, are_equivalent, is_volatile, strategy_for, volatile_properties};

/// Default name of the shared partition.
pub const DEFAULT_SHARED_PARTITION: &str = "Common";

/// Role of a reconciliation pass.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Pass {
    /// Shared objects may be created or incremented; nothing in the shared
    /// partition is released or deleted.
    First,
    /// Releases and deletions are applied.
    #[default]
    Final,
}

/// Parameters of one diff call.
#[derive(Debug, Clone)]
pub struct DiffContext {
    /// Scope (tenant) being reconciled.
    pub scope_id: String,
    pub pass: Pass,
    /// Name of the privileged shared partition.
    pub shared_partition: String,
    pub rank_table: RankTable,
}

impl DiffContext {
    pub fn new(scope_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            pass: Pass::Final,
            shared_partition: DEFAULT_SHARED_PARTITION.to_owned(),
            rank_table: RankTable::default(),
        }
    }

    #[must_use]
    pub fn with_pass(mut self, pass: Pass) -> Self {
        self.pass = pass;
        self
    }

    #[must_use]
    pub fn with_shared_partition(mut self, partition: impl Into<String>) -> Self {
        self.shared_partition = partition.into();
        self
    }

    #[must_use]
    pub fn with_rank_table(mut self, table: RankTable) -> Self {
        self.rank_table = table;
        self
    }

    pub fn is_shared_scope(&self) -> bool {
        self.scope_id == self.shared_partition
    }

    /// First pass over the shared scope: releases are deferred.
    pub fn suppresses_shared_release(&self) -> bool {
        self.pass == Pass::First && self.is_shared_scope()
    }

    fn in_shared_partition(&self, path: &str) -> bool {
        path.strip_prefix('/')
            .and_then(|rest| rest.strip_prefix(self.shared_partition.as_str()))
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Compute the typed diff from `current` to `desired`.
///
/// `common` is updated in place with reference count changes. When the
/// pass defers shared releases, the converged shared objects and every
/// shared-partition object that would be deleted are written to
/// `unchecked` instead of producing entries.
pub fn diff(
    current: &ConfigTree,
    desired: &ConfigTree,
    common: &mut CommonState,
    ctx: &DiffContext,
    mut unchecked: Option<&mut ConfigTree>,
) -> Result<Vec<DiffEntry>, CoreError> {
    let mut tracker = ReferenceTracker::new(common);
    let longest_match = topology::longest_match_enabled(desired);
    let mut out = Vec::new();

    for path in current.union_paths(desired) {
        if !path.starts_with('/') {
            warn!(path = %path, "skipping object with a non-absolute path");
            continue;
        }
        let raw_current = current.get(&path);
        let raw_desired = desired.get(&path);
        let (cur, des) = working_copies(raw_current, raw_desired);
        let start = out.len();

        let shared_kind = des
            .as_ref()
            .or(cur.as_ref())
            .and_then(|o| SharedKind::from_command(&o.command));
        if let Some(kind) = shared_kind.filter(|_| ctx.in_shared_partition(&path)) {
            let obj = SharedObject {
                path: &path,
                kind,
                current: cur.as_ref(),
                desired: des.as_ref(),
            };
            shared::diff_shared(
                &obj,
                current,
                desired,
                &mut tracker,
                ctx.suppresses_shared_release(),
                unchecked.as_deref_mut(),
                &mut out,
            );
            continue;
        }

        let is_topology = des
            .as_ref()
            .or(cur.as_ref())
            .is_some_and(|o| o.command == TOPOLOGY_COMMAND);
        if is_topology {
            topology::diff_topology(
                &path,
                cur.as_ref(),
                des.as_ref(),
                longest_match,
                &ctx.rank_table,
                &mut out,
            )?;
            continue;
        }

        let defer_delete = ctx.suppresses_shared_release() && ctx.in_shared_partition(&path);
        match (cur, des) {
            (None, Some(d)) => out.push(
                DiffEntry::new(path_of(&path, &[]), d.properties_value()).with_command(d.command),
            ),
            (Some(c), None) if defer_delete => {
                debug!(path = %path, "deferring shared-partition delete to the final pass");
                if let Some(shadow) = unchecked.as_deref_mut() {
                    shadow.insert(path.clone(), c);
                }
            }
            (Some(c), None) => out.push(
                DiffEntry::deleted(path_of(&path, &[]), c.properties_value()).with_command(c.command),
            ),
            (Some(c), Some(d)) if c.command == d.command => {
                diff_properties(&path, &c, &d, &mut out);
            }
            (Some(c), Some(d)) if are_equivalent(&c.command, &d.command) => {
                diff_command_swap(&path, &c, &d, &mut out);
            }
            (Some(c), Some(d)) if defer_delete => {
                debug!(path = %path, from = %c.command, to = %d.command, "deferring shared-partition recreate");
                if let Some(shadow) = unchecked.as_deref_mut() {
                    shadow.insert(path.clone(), d);
                }
            }
            (Some(c), Some(d)) => {
                debug!(path = %path, from = %c.command, to = %d.command, "command changed, recreating");
                out.push(
                    DiffEntry::deleted(path_of(&path, &[]), c.properties_value()).with_command(c.command),
                );
                out.push(
                    DiffEntry::new(path_of(&path, &[]), d.properties_value()).with_command(d.command),
                );
            }
            (None, None) => {}
        }

        if out.len() > start {
            debug!(path = %path, entries = out.len() - start, "object differs");
        }
    }

    Ok(out)
}

/// Clone both sides with ignored properties stripped, and volatile
/// descriptors removed from the current side.
fn working_copies(
    current: Option<&ConfigObject>,
    desired: Option<&ConfigObject>,
) -> (Option<ConfigObject>, Option<ConfigObject>) {
    let ignore: BTreeSet<&String> = current
        .iter()
        .chain(desired.iter())
        .flat_map(|o| o.ignore.iter())
        .collect();
    let strip = |object: &ConfigObject| {
        let mut copy = object.clone();
        copy.properties.retain(|name, _| !ignore.contains(name));
        copy
    };
    let cur = current.map(|c| {
        let mut copy = strip(c);
        for prop in volatile_properties(&c.command) {
            copy.properties.shift_remove(prop);
        }
        copy
    });
    (cur, desired.map(strip))
}

fn diff_properties(path: &str, current: &ConfigObject, desired: &ConfigObject, out: &mut Vec<DiffEntry>) {
    let command = desired.command.as_str();
    let start = out.len();
    let mut at = path_of(path, &[]);

    for (name, lhs) in &current.properties {
        at.push(PathSegment::Key(name.clone()));
        match desired.properties.get(name) {
            Some(rhs) => deep::compare(strategy_for(command, name), lhs, rhs, &mut at, out),
            None => out.push(DiffEntry::deleted(at.clone(), lhs.clone())),
        }
        at.pop();
    }
    for (name, rhs) in &desired.properties {
        if current.properties.contains_key(name) {
            continue;
        }
        at.push(PathSegment::Key(name.clone()));
        let mut entry = DiffEntry::new(at.clone(), rhs.clone());
        if is_volatile(command, name) {
            entry = entry
                .tagged(DiffTag::Volatile)
                .tagged(DiffTag::NeedsTransactionalScript);
        }
        out.push(entry);
        at.pop();
    }

    for entry in &mut out[start..] {
        entry.command.get_or_insert_with(|| command.to_owned());
    }
}

/// Interchangeable flavours: compare member fields only and carry the
/// new command forward instead of recreating the object.
fn diff_command_swap(path: &str, current: &ConfigObject, desired: &ConfigObject, out: &mut Vec<DiffEntry>) {
    let start = out.len();
    let mut at = path_of(path, &[]);
    let empty = Value::Null;

    for field in MEMBER_FIELDS {
        let lhs = current.get(field);
        let rhs = desired.get(field);
        if lhs.is_none() && rhs.is_none() {
            continue;
        }
        at.push(PathSegment::Key((*field).to_owned()));
        match (lhs, rhs) {
            (Some(l), None) => out.push(DiffEntry::deleted(at.clone(), l.clone())),
            (None, Some(r)) => out.push(DiffEntry::new(at.clone(), r.clone())),
            (l, r) => deep::compare(
                strategy_for(&desired.command, field),
                l.unwrap_or(&empty),
                r.unwrap_or(&empty),
                &mut at,
                out,
            ),
        }
        at.pop();
    }

    out.push(DiffEntry::edited(
        path_of(path, &["command".into()]),
        Value::String(current.command.clone()),
        Value::String(desired.command.clone()),
    ));

    for entry in &mut out[start..] {
        entry.command = Some(desired.command.clone());
        entry.lhs_command = Some(current.command.clone());
        entry.rhs_command = Some(desired.command.clone());
        entry.tags.insert(DiffTag::CommandSwap);
    }
}
