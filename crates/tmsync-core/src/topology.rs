//! Topology match expressions and longest-match ordering.
//!
//! The appliance exchanges topology records as canonical strings of the
//! form `"[not ]<type> <value>"`. [`parse`] normalizes them into
//! [`TopologyRecord`]s and [`order`] sorts whole matches by the
//! platform's per-type specificity, most specific first.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::CoreError;
use crate::model::Value;

const COMMON_PREFIX: &str = "/Common/";
const NOT_PREFIX: &str = "not ";

/// Record types understood by the appliance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TopologyType {
    Continent,
    Country,
    Region,
    Datacenter,
    Pool,
    Isp,
    GeoipIsp,
    State,
    Subnet,
}

/// One side of a topology match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyRecord {
    #[serde(rename = "type")]
    pub kind: TopologyType,
    pub value: String,
    #[serde(default)]
    pub not: bool,
}

impl TopologyRecord {
    /// Canonical device-side identity string.
    pub fn name(&self) -> String {
        let not = if self.not { NOT_PREFIX } else { "" };
        format!("{not}{} {}", self.kind, self.value)
    }
}

impl fmt::Display for TopologyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for TopologyRecord {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse a textual match expression into a normalized record.
pub fn parse(text: &str) -> Result<TopologyRecord, CoreError> {
    let invalid = |reason: &str| CoreError::InvalidTopology {
        text: text.to_owned(),
        reason: reason.to_owned(),
    };

    let trimmed = text.trim();
    let (not, rest) = match trimmed.strip_prefix(NOT_PREFIX) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };

    let (type_token, raw_value) = rest
        .split_once(' ')
        .ok_or_else(|| invalid("expected '<type> <value>'"))?;
    let kind = TopologyType::from_str(type_token)
        .map_err(|_| invalid(&format!("unknown record type '{type_token}'")))?;

    let raw_value = raw_value.trim();
    if raw_value.is_empty() {
        return Err(invalid("missing value"));
    }

    let value = match kind {
        TopologyType::Isp => raw_value
            .strip_prefix(COMMON_PREFIX)
            .unwrap_or(raw_value)
            .to_owned(),
        TopologyType::State | TopologyType::GeoipIsp => quote_wrap(raw_value),
        _ => raw_value.to_owned(),
    };

    Ok(TopologyRecord { kind, value, not })
}

fn quote_wrap(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value.to_owned()
    } else {
        format!("\"{value}\"")
    }
}

// ── Matches ─────────────────────────────────────────────────────────

/// A source/destination pair with its score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyMatch {
    pub source: TopologyRecord,
    pub destination: TopologyRecord,
    #[serde(default)]
    pub weight: i64,
}

impl TopologyMatch {
    /// Read a match from a record map `{ source, destination, weight }`
    /// whose sides are textual expressions.
    pub fn from_value(value: &Value) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidTopology {
            text: value.to_string(),
            reason: reason.to_owned(),
        };
        let map = value.as_map().ok_or_else(|| invalid("record is not a map"))?;
        let side = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(&format!("missing '{key}'")))
                .and_then(parse)
        };
        Ok(Self {
            source: side("source")?,
            destination: side("destination")?,
            weight: map.get("weight").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    /// The record map form, with canonical expression strings.
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("source".to_owned(), Value::String(self.source.name()));
        map.insert(
            "destination".to_owned(),
            Value::String(self.destination.name()),
        );
        map.insert("weight".to_owned(), Value::Int(self.weight));
        Value::Map(map)
    }
}

// ── Specificity ─────────────────────────────────────────────────────

/// Per-type specificity ranks; lower ranks sort first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankTable {
    ranks: IndexMap<TopologyType, u8>,
}

impl RankTable {
    /// Build a table from groups ordered most specific first; types in
    /// one group share a rank. Types left out rank after every listed one.
    pub fn from_groups(groups: &[&[TopologyType]]) -> Self {
        let mut ranks = IndexMap::new();
        let mut rank = 0u8;
        for group in groups {
            for kind in *group {
                ranks.entry(*kind).or_insert(rank);
            }
            rank = rank.saturating_add(1);
        }
        for kind in TopologyType::iter() {
            ranks.entry(kind).or_insert(rank);
        }
        Self { ranks }
    }

    /// Build a table from type names, one group per name. `isp` and
    /// `geoip-isp` always share a rank.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, CoreError> {
        let mut groups: Vec<Vec<TopologyType>> = Vec::new();
        for name in names {
            let kind = TopologyType::from_str(name.as_ref()).map_err(|_| {
                CoreError::InvalidTopology {
                    text: name.as_ref().to_owned(),
                    reason: "unknown record type in rank table".into(),
                }
            })?;
            match kind {
                TopologyType::Isp | TopologyType::GeoipIsp => {
                    groups.push(vec![TopologyType::Isp, TopologyType::GeoipIsp]);
                }
                other => groups.push(vec![other]),
            }
        }
        let refs: Vec<&[TopologyType]> = groups.iter().map(Vec::as_slice).collect();
        Ok(Self::from_groups(&refs))
    }

    pub fn rank(&self, kind: TopologyType) -> u8 {
        self.ranks.get(&kind).copied().unwrap_or(u8::MAX)
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::from_groups(&[
            &[TopologyType::Region],
            &[TopologyType::Isp, TopologyType::GeoipIsp],
            &[TopologyType::Country],
            &[TopologyType::Continent],
            &[TopologyType::Datacenter],
            &[TopologyType::Pool],
            &[TopologyType::Subnet],
            &[TopologyType::State],
        ])
    }
}

/// Stable sort by the source record's rank, most specific first.
pub fn order(matches: &[TopologyMatch], table: &RankTable) -> Vec<TopologyMatch> {
    let mut ordered = matches.to_vec();
    ordered.sort_by_key(|m| table.rank(m.source.kind));
    ordered
}
