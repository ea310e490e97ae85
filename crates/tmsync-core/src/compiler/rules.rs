// ── Device-specific placement rules ──
//
// Each helper here answers one question about an object that needs to
// leave the main transaction or bring a compensation along.

use tracing::warn;

use crate::differ::strategy::command_matches;
use crate::model::{ConfigObject, Value};
use crate::topology::TopologyMatch;

use super::tmsh;

pub(crate) const ACCESS_PROFILE: &str = "apm profile access";
pub(crate) const PER_REQUEST_POLICY: &str = "apm policy access-policy";
pub(crate) const RULE_LIST: &str = "security firewall rule-list";
const IMPORT: &str = "import";

/// Strings that mean "no value" on the device.
fn is_unset(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == "none",
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        _ => false,
    }
}

// ── Traffic-matching-criteria virtuals ──

/// A virtual bound to traffic-matching-criteria instead of a destination.
pub(crate) fn is_tmc_virtual(object: &ConfigObject) -> bool {
    command_matches(&object.command, "ltm virtual")
        && object
            .get("traffic-matching-criteria")
            .is_some_and(|v| !is_unset(v))
}

// ── Firewall rule-lists ──

const RULE_SIDES: &[&str] = &["source", "destination"];
const LIST_REFS: &[&str] = &["address-lists", "port-lists"];

/// Clear and restore commands for a rule-list whose rules reference
/// address or port lists. `None` when nothing needs clearing.
pub(crate) fn rule_list_refs(path: &str, object: &ConfigObject) -> Option<(String, String)> {
    let rules = object.get("rules")?.as_map()?;
    let mut cleared = Vec::new();
    for (rule, body) in rules {
        let Some(body) = body.as_map() else { continue };
        let mut sides = Vec::new();
        for side in RULE_SIDES {
            let Some(side_map) = body.get(*side).and_then(Value::as_map) else {
                continue;
            };
            let refs: Vec<String> = LIST_REFS
                .iter()
                .filter(|k| side_map.get(**k).is_some_and(|v| !is_unset(v)))
                .map(|k| format!("{k} none"))
                .collect();
            if !refs.is_empty() {
                sides.push(format!("{side} {{ {} }}", refs.join(" ")));
            }
        }
        if !sides.is_empty() {
            cleared.push(format!("{} {{ {} }}", tmsh::quote(rule), sides.join(" ")));
        }
    }
    if cleared.is_empty() {
        return None;
    }
    let clear = format!(
        "tmsh::modify {RULE_LIST} {path} rules modify {{ {} }}",
        cleared.join(" ")
    );
    let restore = format!(
        "tmsh::modify {RULE_LIST} {path} rules replace-all-with {{ {} }}",
        tmsh::block(rules)
    );
    Some((clear, restore))
}

// ── Access policy imports ──

/// An archive to install with the device's policy import tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Import {
    pub file: String,
    pub compressed: bool,
    pub per_request: bool,
}

impl Import {
    pub(crate) fn of(object: &ConfigObject) -> Option<Self> {
        let per_request = object.command == PER_REQUEST_POLICY;
        if object.command != ACCESS_PROFILE && !per_request {
            return None;
        }
        let file = match object.get(IMPORT)? {
            Value::String(s) => s.clone(),
            Value::Map(map) => map.get("file").and_then(Value::as_str)?.to_owned(),
            _ => return None,
        };
        let compressed = [".tar.gz", ".tgz", ".gz"]
            .iter()
            .any(|ext| file.ends_with(ext));
        Some(Self {
            file,
            compressed,
            per_request,
        })
    }

    fn flags(&self) -> String {
        let mut flags = String::new();
        if self.per_request {
            flags.push_str(" -t prp");
        }
        if self.compressed {
            flags.push_str(" -z");
        }
        flags
    }

    pub(crate) fn install(&self, name: &str, partition: &str) -> String {
        format!(
            "exec ng_import{} {} {name} -p {partition}",
            self.flags(),
            tmsh::quote(&self.file)
        )
    }
}

pub(crate) fn remove_import(name: &str, partition: &str) -> String {
    format!("exec ng_profile -deleteall {name} -p {partition}")
}

// ── Topology ──

fn topology_side(expression: &str) -> String {
    expression.replace('"', "\\\"")
}

/// Delete-all then create-all lines for a topology collection.
pub(crate) fn topology_lines(
    had_records: bool,
    desired: Option<&ConfigObject>,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    let mut lines = Vec::new();
    if had_records {
        lines.push("tmsh::delete gtm topology all".to_owned());
    }
    let records = desired
        .and_then(|d| d.get("records"))
        .and_then(Value::as_list)
        .unwrap_or_default();
    for record in records {
        match TopologyMatch::from_value(record) {
            Ok(m) => lines.push(format!(
                "tmsh::create gtm topology ldns: {} server: {} score {}",
                topology_side(&m.source.name()),
                topology_side(&m.destination.name()),
                m.weight
            )),
            Err(e) => {
                warn!(error = %e, "skipping malformed topology record");
                warnings.push(format!("skipped topology record: {e}"));
            }
        }
    }
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(command: &str, props: serde_json::Value) -> ConfigObject {
        let mut o = ConfigObject::new(command);
        if let Value::Map(map) = Value::from(props) {
            o.properties = map;
        }
        o
    }

    #[test]
    fn tmc_virtuals() {
        assert!(is_tmc_virtual(&obj(
            "ltm virtual",
            json!({ "traffic-matching-criteria": "/T/A/v_tmc" })
        )));
        assert!(!is_tmc_virtual(&obj(
            "ltm virtual",
            json!({ "traffic-matching-criteria": "none" })
        )));
        assert!(!is_tmc_virtual(&obj("ltm virtual", json!({ "destination": "/T/1.1.1.1:80" }))));
    }

    #[test]
    fn rule_list_clear_and_restore() {
        let o = obj(
            RULE_LIST,
            json!({ "rules": {
                "r1": { "action": "accept", "source": { "address-lists": { "/T/A/al": {} } } },
                "r2": { "action": "drop" }
            }}),
        );
        let (clear, restore) = rule_list_refs("/T/A/rl", &o).unwrap();
        assert_eq!(
            clear,
            "tmsh::modify security firewall rule-list /T/A/rl rules modify { r1 { source { address-lists none } } }"
        );
        assert!(restore.starts_with("tmsh::modify security firewall rule-list /T/A/rl rules replace-all-with { r1 {"));
        assert!(restore.contains("address-lists { /T/A/al { } }"));
    }

    #[test]
    fn rule_list_without_list_refs() {
        let o = obj(RULE_LIST, json!({ "rules": { "r1": { "action": "accept" } } }));
        assert_eq!(rule_list_refs("/T/A/rl", &o), None);
    }

    #[test]
    fn import_flags() {
        let profile = obj(ACCESS_PROFILE, json!({ "import": "/var/tmp/ap.tar" }));
        let imp = Import::of(&profile).unwrap();
        assert_eq!(imp.install("ap", "T"), "exec ng_import /var/tmp/ap.tar ap -p T");

        let policy = obj(PER_REQUEST_POLICY, json!({ "import": { "file": "/var/tmp/prp.tar.gz" } }));
        let imp = Import::of(&policy).unwrap();
        assert_eq!(
            imp.install("prp_1234", "T"),
            "exec ng_import -t prp -z /var/tmp/prp.tar.gz prp_1234 -p T"
        );
    }

    #[test]
    fn topology_recreate_lines() {
        let desired = obj(
            "gtm topology",
            json!({ "records": [
                { "source": "region /Common/r1", "destination": "pool /Common/p1", "weight": 10 },
                { "source": "state \"/Common/Texas\"", "destination": "datacenter /Common/dc", "weight": 1 },
                { "destination": "pool /Common/p2" }
            ]}),
        );
        let mut warnings = Vec::new();
        let lines = topology_lines(true, Some(&desired), &mut warnings);
        assert_eq!(lines[0], "tmsh::delete gtm topology all");
        assert_eq!(
            lines[1],
            "tmsh::create gtm topology ldns: region /Common/r1 server: pool /Common/p1 score 10"
        );
        assert_eq!(
            lines[2],
            "tmsh::create gtm topology ldns: state \\\"/Common/Texas\\\" server: datacenter /Common/dc score 1"
        );
        assert_eq!(lines.len(), 3);
        assert_eq!(warnings.len(), 1);
    }
}
