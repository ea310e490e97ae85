// ── Topology collection diffing ──
//
// Record order is significant and the device recomputes it on partial
// edits, so any difference recreates the whole collection.

use tracing::warn;

use crate::error::CoreError;
use crate::model::{ConfigObject, ConfigTree, DiffEntry, DiffTag, Value, path_of};
use crate::topology::{RankTable, TopologyMatch, order};

pub(crate) const TOPOLOGY_COMMAND: &str = "gtm topology";
pub(crate) const LB_SETTINGS_COMMAND: &str = "gtm global-settings load-balancing";
pub(crate) const LONGEST_MATCH: &str = "topology-longest-match";

/// Longest-match ordering is on unless the desired settings turn it off.
pub(crate) fn longest_match_enabled(desired: &ConfigTree) -> bool {
    desired
        .by_command(LB_SETTINGS_COMMAND)
        .find_map(|(_, o)| o.get(LONGEST_MATCH).and_then(Value::truthy))
        .unwrap_or(true)
}

/// Canonical `records`: expressions normalized, weights filled in, and
/// ordered by specificity when `longest_match` is set.
pub(crate) fn normalized_records(
    object: &ConfigObject,
    longest_match: bool,
    table: &RankTable,
) -> Result<ConfigObject, CoreError> {
    let Some(records) = object.get("records").and_then(Value::as_list) else {
        return Ok(object.clone());
    };
    let mut matches = records
        .iter()
        .map(TopologyMatch::from_value)
        .collect::<Result<Vec<_>, _>>()?;
    if longest_match {
        matches = order(&matches, table);
    }
    let mut object = object.clone();
    object.properties.insert(
        "records".to_owned(),
        Value::List(matches.iter().map(TopologyMatch::to_value).collect()),
    );
    Ok(object)
}

/// Whole-collection delete + recreate when anything differs.
pub(crate) fn diff_topology(
    path: &str,
    current: Option<&ConfigObject>,
    desired: Option<&ConfigObject>,
    longest_match: bool,
    table: &RankTable,
    out: &mut Vec<DiffEntry>,
) -> Result<(), CoreError> {
    let desired = desired
        .map(|d| normalized_records(d, longest_match, table))
        .transpose()?;
    // Unparseable running records compare raw and so always recreate.
    let canonical = current.map(|c| {
        normalized_records(c, longest_match, table).unwrap_or_else(|err| {
            warn!(path, error = %err, "current topology records are not canonical");
            c.clone()
        })
    });
    if canonical.as_ref().map(|c| &c.properties) == desired.as_ref().map(|d| &d.properties) {
        return Ok(());
    }
    if let Some(c) = current {
        out.push(
            DiffEntry::deleted(path_of(path, &[]), c.properties_value())
                .with_command(c.command.clone())
                .tagged(DiffTag::TopologyRecreate),
        );
    }
    if let Some(d) = desired {
        out.push(
            DiffEntry::new(path_of(path, &[]), d.properties_value())
                .with_command(d.command.clone())
                .tagged(DiffTag::TopologyRecreate),
        );
    }
    Ok(())
}
