// ── Dependency ordering ──
//
// An object depends on another when one of its string leaves names the
// other's path, bare or followed by a port. Creates run dependencies
// first; deletes run dependents first.

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::differ::strategy::command_matches;
use crate::model::ConfigObject;

/// Tie-break ranks for objects with no edge between them. Lower first.
const COMMAND_RANKS: &[(&str, u8)] = &[
    ("sys file", 0),
    ("ltm data-group", 0),
    ("ltm ifile", 0),
    ("ltm monitor", 0),
    ("gtm monitor", 0),
    ("net address-list", 1),
    ("net port-list", 1),
    ("security firewall address-list", 1),
    ("security firewall port-list", 1),
    ("ltm node", 1),
    ("ltm profile", 2),
    ("ltm persistence", 2),
    ("ltm rule", 2),
    ("ltm pool", 2),
    ("security firewall rule-list", 2),
    ("apm", 2),
    ("security firewall policy", 3),
    ("ltm policy", 3),
    ("ltm snatpool", 3),
    ("ltm traffic-matching-criteria", 3),
    ("ltm virtual-address", 4),
    ("ltm virtual", 5),
    ("gtm datacenter", 6),
    ("gtm server", 7),
    ("gtm pool", 8),
    ("gtm wideip", 9),
];

const DEFAULT_RANK: u8 = 3;

pub(crate) fn command_rank(command: &str) -> u8 {
    COMMAND_RANKS
        .iter()
        .filter(|(family, _)| command_matches(command, family))
        .map(|(family, rank)| (family.len(), *rank))
        .max_by_key(|(len, _)| *len)
        .map_or(DEFAULT_RANK, |(_, rank)| rank)
}

/// Whether `s` names the object at `path`.
pub(crate) fn names(s: &str, path: &str) -> bool {
    s.strip_prefix(path).is_some_and(|rest| {
        rest.is_empty() || rest.starts_with(':') || rest.starts_with('.') || rest.starts_with(' ')
    })
}

/// Paths from `candidates` that `object` references.
fn dependencies<'a>(own: &str, object: &ConfigObject, candidates: &[&'a str]) -> BTreeSet<&'a str> {
    let mut strings = Vec::new();
    for v in object.properties.values() {
        v.collect_strings(&mut strings);
    }
    candidates
        .iter()
        .copied()
        .filter(|c| *c != own && strings.iter().any(|s| names(s, c)))
        .collect()
}

/// Order `items` so referenced objects come before their referrers.
///
/// Ties follow command rank, then input order. Cycles are broken by
/// falling back to that same order for the remaining items.
pub(crate) fn dependency_order<'a>(items: &[(&'a str, &'a ConfigObject)]) -> Vec<&'a str> {
    let paths: Vec<&str> = items.iter().map(|(p, _)| *p).collect();
    let mut pending: HashMap<&str, BTreeSet<&str>> = items
        .iter()
        .map(|(p, o)| (*p, dependencies(p, o, &paths)))
        .collect();

    let mut queue: Vec<(u8, usize, &str)> = items
        .iter()
        .enumerate()
        .map(|(i, (p, o))| (command_rank(&o.command), i, *p))
        .collect();
    queue.sort_unstable();

    let mut ordered = Vec::with_capacity(items.len());
    while !queue.is_empty() {
        let ready = queue
            .iter()
            .position(|(_, _, p)| pending.get(p).is_none_or(BTreeSet::is_empty));
        let index = ready.unwrap_or_else(|| {
            warn!(path = queue[0].2, "reference cycle, falling back to rank order");
            0
        });
        let (_, _, path) = queue.remove(index);
        for deps in pending.values_mut() {
            deps.remove(path);
        }
        ordered.push(path);
    }
    ordered
}
