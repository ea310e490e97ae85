// ── Value-level comparison ──
//
// Deep structural diff plus the keyed-set and ordered-list variants.
// All functions append to `out` with paths rooted at the object path.

use indexmap::IndexMap;

use crate::model::{ArrayChange, DiffEntry, DiffTag, ORDER_SEGMENT, PathSegment, Value};

use super::strategy::PropertyStrategy;

/// Compare one property with the given strategy.
pub(crate) fn compare(
    strategy: PropertyStrategy,
    lhs: &Value,
    rhs: &Value,
    path: &mut Vec<PathSegment>,
    out: &mut Vec<DiffEntry>,
) {
    match strategy {
        PropertyStrategy::Structural => structural(lhs, rhs, path, out),
        PropertyStrategy::KeyedSet => keyed_set(&as_keyed(lhs), &as_keyed(rhs), path, out),
        PropertyStrategy::Ordered => ordered(lhs, rhs, path, out),
    }
}

/// Deep diff: maps by key, lists by position.
pub(crate) fn structural(lhs: &Value, rhs: &Value, path: &mut Vec<PathSegment>, out: &mut Vec<DiffEntry>) {
    match (lhs, rhs) {
        (Value::Map(l), Value::Map(r)) => keyed_set(l, r, path, out),
        (Value::List(l), Value::List(r)) => {
            let common = l.len().min(r.len());
            for i in 0..common {
                path.push(PathSegment::Index(i));
                structural(&l[i], &r[i], path, out);
                path.pop();
            }
            // Trailing removals are reported from the end, like a splice.
            for i in (common..l.len()).rev() {
                out.push(DiffEntry::array(path.clone(), i, ArrayChange::Deleted, l[i].clone()));
            }
            for (i, item) in r.iter().enumerate().skip(common) {
                out.push(DiffEntry::array(path.clone(), i, ArrayChange::New, item.clone()));
            }
        }
        _ if lhs != rhs => out.push(DiffEntry::edited(path.clone(), lhs.clone(), rhs.clone())),
        _ => {}
    }
}

/// Unordered comparison of two keyed maps.
pub(crate) fn keyed_set(
    lhs: &IndexMap<String, Value>,
    rhs: &IndexMap<String, Value>,
    path: &mut Vec<PathSegment>,
    out: &mut Vec<DiffEntry>,
) {
    for (key, l) in lhs {
        path.push(PathSegment::Key(key.clone()));
        match rhs.get(key) {
            Some(r) => structural(l, r, path, out),
            None => out.push(DiffEntry::deleted(path.clone(), l.clone())),
        }
        path.pop();
    }
    for (key, r) in rhs {
        if !lhs.contains_key(key) {
            path.push(PathSegment::Key(key.clone()));
            out.push(DiffEntry::new(path.clone(), r.clone()));
            path.pop();
        }
    }
}

/// Order-significant comparison. A pure permutation yields one `_order_`
/// edit per displaced index; anything else falls back to a deep diff.
pub(crate) fn ordered(lhs: &Value, rhs: &Value, path: &mut Vec<PathSegment>, out: &mut Vec<DiffEntry>) {
    let (Some(l), Some(r)) = (entries(lhs), entries(rhs)) else {
        structural(lhs, rhs, path, out);
        return;
    };
    if l == r {
        return;
    }
    if !same_members(&l, &r) {
        structural(lhs, rhs, path, out);
        return;
    }
    for (i, (a, b)) in l.iter().zip(&r).enumerate() {
        if a != b {
            let mut at = path.clone();
            at.push(PathSegment::Key(ORDER_SEGMENT.to_owned()));
            at.push(PathSegment::Index(i));
            out.push(DiffEntry::edited(at, a.clone(), b.clone()).tagged(DiffTag::Reorder));
        }
    }
}

/// The ordered entries of a list, or the keys of a map in insertion order.
fn entries(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::List(items) => Some(items.clone()),
        Value::Map(map) => Some(map.keys().map(|k| Value::String(k.clone())).collect()),
        _ => None,
    }
}

fn same_members(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<String> = a.iter().map(ToString::to_string).collect();
    let mut b: Vec<String> = b.iter().map(ToString::to_string).collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// Normalize a keyed-set property to a map. Lists are keyed by entry
/// name (or text); a bare scalar is a one-entry set.
pub(crate) fn as_keyed(value: &Value) -> IndexMap<String, Value> {
    match value {
        Value::Map(map) => map.clone(),
        Value::List(items) => items
            .iter()
            .map(|item| (entry_key(item), item.clone()))
            .collect(),
        Value::Null => IndexMap::new(),
        scalar => std::iter::once((scalar.to_string(), Value::Map(IndexMap::new()))).collect(),
    }
}

fn entry_key(item: &Value) -> String {
    item.as_map()
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .map_or_else(|| item.to_string(), ToOwned::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::DiffKind;
    use serde_json::json;

    fn run(strategy: PropertyStrategy, lhs: serde_json::Value, rhs: serde_json::Value) -> Vec<DiffEntry> {
        let mut out = Vec::new();
        let mut path = vec![PathSegment::Key("/T/o".into()), PathSegment::Key("p".into())];
        compare(strategy, &Value::from(lhs), &Value::from(rhs), &mut path, &mut out);
        assert_eq!(path.len(), 2, "path stack must be balanced");
        out
    }

    #[test]
    fn structural_list_growth_and_shrink() {
        let out = run(PropertyStrategy::Structural, json!(["a", "b", "c"]), json!(["a"]));
        let indexes: Vec<usize> = out
            .iter()
            .map(|e| match e.kind {
                DiffKind::Array { index, item: ArrayChange::Deleted } => index,
                _ => panic!("unexpected {e:?}"),
            })
            .collect();
        assert_eq!(indexes, [2, 1]);

        let out = run(PropertyStrategy::Structural, json!(["a"]), json!(["a", "b"]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, DiffKind::Array { index: 1, item: ArrayChange::New });
    }

    #[test]
    fn keyed_set_ignores_insertion_order() {
        let out = run(
            PropertyStrategy::KeyedSet,
            json!({"a": {}, "b": {}}),
            json!({"b": {}, "a": {}}),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn keyed_set_from_lists() {
        let out = run(PropertyStrategy::KeyedSet, json!(["10.0.0.1", "10.0.0.2"]), json!(["10.0.0.2", "10.0.0.3"]));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, DiffKind::Deleted);
        assert_eq!(out[0].path.last(), Some(&PathSegment::Key("10.0.0.1".into())));
        assert_eq!(out[1].kind, DiffKind::New);
    }

    #[test]
    fn keyed_set_edits_same_key() {
        let out = run(
            PropertyStrategy::KeyedSet,
            json!({"m1": {"ratio": 1}}),
            json!({"m1": {"ratio": 2}}),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, DiffKind::Edited);
        assert_eq!(out[0].path_display(), "/T/o > p > m1 > ratio");
    }

    #[test]
    fn ordered_permutation_emits_order_entries() {
        let out = run(PropertyStrategy::Ordered, json!(["r1", "r2", "r3"]), json!(["r2", "r1", "r3"]));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.kind == DiffKind::Edited && e.has_tag(DiffTag::Reorder)));
        assert_eq!(out[0].path_display(), "/T/o > p > _order_ > 0");
        assert_eq!(out[1].path_display(), "/T/o > p > _order_ > 1");
    }

    #[test]
    fn ordered_map_keys_are_compared_positionally() {
        let out = run(PropertyStrategy::Ordered, json!({"r1": {}, "r2": {}}), json!({"r2": {}, "r1": {}}));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn ordered_membership_change_falls_back_to_deep_diff() {
        let out = run(PropertyStrategy::Ordered, json!(["r1"]), json!(["r1", "r2"]));
        assert_eq!(out.len(), 1);
        assert!(!out[0].has_tag(DiffTag::Reorder));
    }
}
