// ── tmsh command rendering ──
//
// Lines are emitted inside a Tcl proc, so anything tmsh has to see as a
// quoted string is written with escaped quotes.

use std::fmt::Write;

use indexmap::IndexMap;

use crate::differ::strategy::{PropertyStrategy, strategy_for};
use crate::model::{ConfigObject, Value};

pub(crate) const PARTITION_COMMAND: &str = "auth partition";
pub(crate) const FOLDER_COMMAND: &str = "sys folder";

/// Commands addressed without an object path.
const SINGLETONS: &[&str] = &["gtm global-settings load-balancing", "gtm global-settings general"];

/// Properties that drive an out-of-band action and are never rendered.
const NOT_RENDERED: &[&str] = &["import"];

pub(crate) fn is_container(command: &str) -> bool {
    command == PARTITION_COMMAND || command == FOLDER_COMMAND
}

/// The object argument as tmsh expects it.
pub(crate) fn target(command: &str, path: &str) -> Option<String> {
    if SINGLETONS.contains(&command) {
        None
    } else if command == PARTITION_COMMAND {
        Some(path.trim_matches('/').to_owned())
    } else {
        Some(path.to_owned())
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | ';' | '"' | '$' | '[' | ']' | '\\' | '#'))
}

/// Quote a string for tmsh, escaped for the enclosing Tcl body.
pub(crate) fn quote(s: &str) -> String {
    if !needs_quotes(s) {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len() + 4);
    out.push_str("\\\"");
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '"' => out.push_str("\\\\\\\""),
            '$' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push_str("\\\"");
    out
}

/// Render a value as a tmsh argument.
pub(crate) fn value(v: &Value) -> String {
    match v {
        Value::Null => "none".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::List(items) if items.is_empty() => "none".to_owned(),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(value).collect();
            format!("{{ {} }}", inner.join(" "))
        }
        Value::Map(map) if map.is_empty() => "none".to_owned(),
        Value::Map(map) => format!("{{ {} }}", block(map)),
    }
}

/// Body of a `{ … }` block: `key value` pairs, nested maps as sub-blocks.
pub(crate) fn block(map: &IndexMap<String, Value>) -> String {
    let mut out = String::new();
    for (k, v) in map {
        if !out.is_empty() {
            out.push(' ');
        }
        match v {
            Value::Map(inner) if inner.is_empty() => {
                let _ = write!(out, "{} {{ }}", quote(k));
            }
            Value::Map(inner) => {
                let _ = write!(out, "{} {{ {} }}", quote(k), block(inner));
            }
            Value::Null => out.push_str(&quote(k)),
            other => {
                let _ = write!(out, "{} {}", quote(k), value(other));
            }
        }
    }
    out
}

/// `monitor` takes a rule expression rather than a block.
fn monitor_rule(v: &Value) -> String {
    let names: Vec<String> = match v {
        Value::Null => Vec::new(),
        Value::String(s) => s.split_whitespace().map(ToOwned::to_owned).collect(),
        Value::List(items) => items.iter().filter_map(Value::as_str).map(quote).collect(),
        Value::Map(map) => map.keys().map(|k| quote(k)).collect(),
        other => vec![value(other)],
    };
    match names.len() {
        0 => "none".to_owned(),
        1 => names[0].clone(),
        _ => format!("min 1 of {{ {} }}", names.join(" ")),
    }
}

/// `name value` for one property. In a modify, keyed collections replace
/// their whole content.
pub(crate) fn property(command: &str, name: &str, v: &Value, modify: bool) -> String {
    if name == "monitor" {
        return format!("monitor {}", monitor_rule(v));
    }
    let keyed = name == "metadata" || strategy_for(command, name) == PropertyStrategy::KeyedSet;
    let rendered = match (keyed, v) {
        (true, Value::List(items)) => {
            let map: IndexMap<String, Value> = items
                .iter()
                .map(|item| match item {
                    Value::Map(m) => m
                        .get("name")
                        .and_then(Value::as_str)
                        .map_or_else(
                            || (item.to_string(), Value::Null),
                            |n| {
                                let mut rest = m.clone();
                                rest.shift_remove("name");
                                (n.to_owned(), Value::Map(rest))
                            },
                        ),
                    other => (other.to_string(), Value::Null),
                })
                .collect();
            value(&Value::Map(map))
        }
        _ => value(v),
    };
    if keyed && modify && rendered != "none" {
        format!("{name} replace-all-with {rendered}")
    } else {
        format!("{name} {rendered}")
    }
}

fn head(verb: &str, command: &str, path: &str) -> String {
    match target(command, path) {
        Some(t) => format!("tmsh::{verb} {command} {t}"),
        None => format!("tmsh::{verb} {command}"),
    }
}

pub(crate) fn create(path: &str, object: &ConfigObject) -> String {
    let mut line = head("create", &object.command, path);
    for (name, v) in &object.properties {
        if NOT_RENDERED.contains(&name.as_str()) {
            continue;
        }
        line.push(' ');
        line.push_str(&property(&object.command, name, v, false));
    }
    line
}

pub(crate) fn delete(command: &str, path: &str) -> String {
    head("delete", command, path)
}

/// Modify only the named properties; names missing from `object` are
/// cleared with `none`.
pub(crate) fn modify<'a>(
    path: &str,
    object: &ConfigObject,
    names: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let mut line = head("modify", &object.command, path);
    let mut any = false;
    for name in names {
        if NOT_RENDERED.contains(&name) {
            continue;
        }
        line.push(' ');
        match object.get(name) {
            Some(v) => line.push_str(&property(&object.command, name, v, true)),
            None => {
                line.push_str(name);
                line.push_str(" none");
            }
        }
        any = true;
    }
    any.then_some(line)
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
    fn plain_strings_are_bare() {
        assert_eq!(quote("/T/A/pool"), "/T/A/pool");
    }

    #[test]
    fn strings_with_spaces_get_escaped_quotes() {
        assert_eq!(quote("my pool"), "\\\"my pool\\\"");
        assert_eq!(quote("a$b"), "\\\"a\\$b\\\"");
    }

    #[test]
    fn create_renders_properties_in_order() {
        let o = obj(
            "ltm pool",
            json!({ "load-balancing-mode": "round-robin", "members": { "/Common/10.0.0.1:80": {} } }),
        );
        assert_eq!(
            create("/T/A/p", &o),
            "tmsh::create ltm pool /T/A/p load-balancing-mode round-robin members { /Common/10.0.0.1:80 { } }"
        );
    }

    #[test]
    fn modify_uses_replace_all_for_keyed_sets() {
        let o = obj("ltm pool", json!({ "members": { "/Common/n:80": { "ratio": 2 } } }));
        assert_eq!(
            modify("/T/A/p", &o, ["members"]).unwrap(),
            "tmsh::modify ltm pool /T/A/p members replace-all-with { /Common/n:80 { ratio 2 } }"
        );
    }

    #[test]
    fn modify_clears_removed_properties() {
        let o = obj("ltm virtual", json!({}));
        assert_eq!(
            modify("/T/A/v", &o, ["description"]).unwrap(),
            "tmsh::modify ltm virtual /T/A/v description none"
        );
    }

    #[test]
    fn monitor_rule_forms() {
        assert_eq!(property("ltm pool", "monitor", &Value::Null, true), "monitor none");
        assert_eq!(
            property("ltm pool", "monitor", &Value::from(json!(["/Common/http"])), true),
            "monitor /Common/http"
        );
        assert_eq!(
            property("ltm pool", "monitor", &Value::from(json!(["/Common/http", "/Common/tcp"])), true),
            "monitor min 1 of { /Common/http /Common/tcp }"
        );
    }

    #[test]
    fn partitions_are_named_not_pathed() {
        assert_eq!(delete(PARTITION_COMMAND, "/T/"), "tmsh::delete auth partition T");
        assert_eq!(delete(FOLDER_COMMAND, "/T/A/"), "tmsh::delete sys folder /T/A/");
    }

    #[test]
    fn singletons_have_no_target() {
        let o = obj("gtm global-settings load-balancing", json!({ "topology-longest-match": "yes" }));
        assert_eq!(
            modify("/Common/global-settings", &o, ["topology-longest-match"]).unwrap(),
            "tmsh::modify gtm global-settings load-balancing topology-longest-match yes"
        );
    }

    #[test]
    fn metadata_block() {
        let o = obj(
            "ltm node",
            json!({ "metadata": { "references": { "value": 2, "persist": "true" } } }),
        );
        assert_eq!(
            modify("/Common/10.0.0.1", &o, ["metadata"]).unwrap(),
            "tmsh::modify ltm node /Common/10.0.0.1 metadata replace-all-with { references { value 2 persist true } }"
        );
    }

    #[test]
    fn import_is_never_rendered() {
        let o = obj("apm profile access", json!({ "import": { "file": "/tmp/a.tar" } }));
        assert_eq!(modify("/T/A/ap", &o, ["import"]), None);
        assert_eq!(create("/T/A/ap", &o), "tmsh::create apm profile access /T/A/ap");
    }
}
