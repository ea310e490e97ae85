//! Diff command handler.

use serde::Serialize;
use tabled::Tabled;

use tmsync_config::Config;
use tmsync_core::{ConfigTree, DiffEntry, Value, diff};

use crate::cli::{DiffArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Current")]
    lhs: String,
    #[tabled(rename = "Desired")]
    rhs: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

fn value_cell(value: Option<&Value>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

fn row(e: &DiffEntry) -> DiffRow {
    DiffRow {
        kind: e.kind.code().into(),
        path: e.path_display(),
        lhs: value_cell(e.lhs.as_ref()),
        rhs: value_cell(e.rhs.as_ref()),
        tags: e.tags.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
    }
}

fn plain_line(e: &DiffEntry) -> String {
    format!("{} {}", e.kind.code(), e.path_display())
}

/// Structured output: the entries plus what the pass deferred.
#[derive(Serialize)]
struct DiffReport<'a> {
    scope: &'a str,
    diffs: &'a [DiffEntry],
    deferred: Vec<&'a str>,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DiffArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let input = &args.input;
    let mut inputs = util::load_inputs(input).await?;
    let ctx = util::diff_context(cfg, input)?;
    let format = config::output_format(global, cfg)?;

    let mut unchecked = ConfigTree::new();
    let diffs = diff(
        &inputs.current,
        &inputs.desired,
        &mut inputs.common,
        &ctx,
        Some(&mut unchecked),
    )?;
    tracing::info!(changes = diffs.len(), deferred = unchecked.len(), "diff computed");

    let out = match format {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            let report = DiffReport {
                scope: &input.scope,
                diffs: &diffs,
                deferred: unchecked.paths().map(String::as_str).collect(),
            };
            output::render_single(format, &report, |_| String::new())?
        }
        OutputFormat::Table | OutputFormat::Plain => {
            output::render_list(format, &diffs, row, plain_line)?
        }
    };
    output::print_output(&out, global.quiet);

    util::persist_common(input, &inputs.common).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmsync_core::{DiffTag, PathSegment};

    #[test]
    fn row_shows_code_and_tags() {
        let entry = DiffEntry::edited(
            vec![PathSegment::from("/T/A/pool"), PathSegment::from("members")],
            Value::from("a"),
            Value::from("b"),
        )
        .tagged(DiffTag::Reorder);
        let cells = row(&entry);
        assert_eq!(cells.kind, "E");
        assert_eq!(cells.tags, "reorder");
        assert_eq!(plain_line(&entry), format!("E {}", entry.path_display()));
    }

    #[test]
    fn missing_side_renders_dash() {
        let entry = DiffEntry::new(vec![PathSegment::from("/T/A/pool")], Value::from("x"));
        assert_eq!(row(&entry).lhs, "-");
    }
}
