// ── Per-command comparison tables ──
//
// The differ never inspects a value to decide how to compare it; it
// looks the (command, property) pair up here.

/// How a property is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyStrategy {
    /// Deep diff: maps by key, lists by position.
    Structural,
    /// Unordered collection keyed by entry name.
    KeyedSet,
    /// Order-significant list; pure reorders emit `_order_` edits.
    Ordered,
}

const STRATEGIES: &[(&str, &str, PropertyStrategy)] = &[
    ("ltm pool", "members", PropertyStrategy::KeyedSet),
    ("ltm pool", "monitor", PropertyStrategy::KeyedSet),
    ("gtm pool", "members", PropertyStrategy::KeyedSet),
    ("ltm virtual", "profiles", PropertyStrategy::KeyedSet),
    ("ltm virtual", "policies", PropertyStrategy::KeyedSet),
    ("ltm virtual", "rules", PropertyStrategy::Ordered),
    ("gtm wideip", "rules", PropertyStrategy::Ordered),
    ("net address-list", "addresses", PropertyStrategy::KeyedSet),
    ("net address-list", "address-lists", PropertyStrategy::KeyedSet),
    ("net address-list", "fqdns", PropertyStrategy::KeyedSet),
    ("net address-list", "geo", PropertyStrategy::KeyedSet),
    ("security firewall address-list", "addresses", PropertyStrategy::KeyedSet),
    ("security firewall address-list", "address-lists", PropertyStrategy::KeyedSet),
    ("security firewall address-list", "fqdns", PropertyStrategy::KeyedSet),
    ("security firewall address-list", "geo", PropertyStrategy::KeyedSet),
    ("net port-list", "ports", PropertyStrategy::KeyedSet),
    ("net port-list", "port-lists", PropertyStrategy::KeyedSet),
    ("security firewall port-list", "ports", PropertyStrategy::KeyedSet),
    ("security firewall port-list", "port-lists", PropertyStrategy::KeyedSet),
    ("ltm data-group internal", "records", PropertyStrategy::KeyedSet),
];

/// Families of interchangeable commands for one conceptual object.
const EQUIVALENT_COMMANDS: &[&[&str]] = &[
    &["net address-list", "security firewall address-list"],
    &["net port-list", "security firewall port-list"],
];

/// Fields compared when only the command flavour changed.
pub const MEMBER_FIELDS: &[&str] = &[
    "addresses",
    "address-lists",
    "fqdns",
    "geo",
    "ports",
    "port-lists",
];

/// One-shot "fetch and install" descriptors, never diffed by content.
const VOLATILE: &[(&str, &str)] = &[
    ("sys file ssl-cert", "source-path"),
    ("sys file ssl-key", "source-path"),
    ("sys file ifile", "source-path"),
    ("sys file data-group", "source-path"),
    ("apm profile access", "import"),
    ("apm policy access-policy", "import"),
];

/// `gtm wideip a` matches the `gtm wideip` family.
pub(crate) fn command_matches(command: &str, family: &str) -> bool {
    command == family
        || command
            .strip_prefix(family)
            .is_some_and(|rest| rest.starts_with(' '))
}

pub fn strategy_for(command: &str, property: &str) -> PropertyStrategy {
    STRATEGIES
        .iter()
        .find(|(family, prop, _)| *prop == property && command_matches(command, family))
        .map_or(PropertyStrategy::Structural, |(_, _, s)| *s)
}

pub fn are_equivalent(a: &str, b: &str) -> bool {
    a != b
        && EQUIVALENT_COMMANDS
            .iter()
            .any(|group| group.contains(&a) && group.contains(&b))
}

pub fn volatile_properties(command: &str) -> impl Iterator<Item = &'static str> + '_ {
    VOLATILE
        .iter()
        .filter(move |(family, _)| command_matches(command, family))
        .map(|(_, prop)| *prop)
}

pub fn is_volatile(command: &str, property: &str) -> bool {
    volatile_properties(command).any(|p| p == property)
}
