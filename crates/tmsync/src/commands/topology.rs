//! Topology command handlers.

use serde::Serialize;
use tabled::Tabled;

use tmsync_config::Config;
use tmsync_core::topology::{self, parse};
use tmsync_core::{TopologyMatch, TopologyRecord, Value};

use crate::cli::{GlobalOpts, TopologyArgs, TopologyCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct ParsedRecord {
    expression: String,
    #[serde(flatten)]
    record: TopologyRecord,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Expression")]
    expression: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Negated")]
    not: bool,
}

fn record_row(p: &ParsedRecord) -> RecordRow {
    RecordRow {
        expression: p.expression.clone(),
        kind: p.record.kind.to_string(),
        value: p.record.value.clone(),
        not: p.record.not,
    }
}

#[derive(Tabled)]
struct MatchRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Weight")]
    weight: i64,
}

fn match_row(m: &TopologyMatch) -> MatchRow {
    MatchRow {
        source: m.source.name(),
        destination: m.destination.name(),
        weight: m.weight,
    }
}

fn match_line(m: &TopologyMatch) -> String {
    format!("{} -> {} {}", m.source, m.destination, m.weight)
}

/// Read a JSON list of `{ source, destination, weight }` maps whose sides
/// are textual expressions.
async fn read_matches(path: &std::path::Path) -> Result<Vec<TopologyMatch>, CliError> {
    if !path.exists() {
        return Err(CliError::NotFound {
            path: path.display().to_string(),
            flag: "file".into(),
        });
    }
    let text = tokio::fs::read_to_string(path).await?;
    let raw: serde_json::Value = serde_json::from_str(&text)?;
    let value = Value::from(raw);
    let records = value.as_list().ok_or_else(|| CliError::Validation {
        field: "file".into(),
        reason: "expected a JSON list of topology records".into(),
    })?;
    Ok(records
        .iter()
        .map(TopologyMatch::from_value)
        .collect::<Result<Vec<_>, _>>()?)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: TopologyArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let format = config::output_format(global, cfg)?;

    let out = match args.command {
        TopologyCommand::Parse { expressions } => {
            let parsed = expressions
                .into_iter()
                .map(|expression| {
                    let record = parse(&expression)?;
                    Ok(ParsedRecord { expression, record })
                })
                .collect::<Result<Vec<_>, CliError>>()?;
            output::render_list(format, &parsed, record_row, |p| p.record.name())?
        }

        TopologyCommand::Order { file } => {
            let matches = read_matches(&file).await?;
            let table = cfg.reconcile.rank_table()?;
            let ordered = topology::order(&matches, &table);
            tracing::debug!(records = ordered.len(), "topology records ordered");
            output::render_list(format, &ordered, match_row, match_line)?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn match_line_uses_canonical_names() {
        let m = TopologyMatch {
            source: parse("not country US").unwrap(),
            destination: parse("pool /Common/p1").unwrap(),
            weight: 10,
        };
        assert_eq!(match_line(&m), format!("{} -> {} 10", m.source.name(), m.destination.name()));
    }
}
