//! Compile command handler.

use std::fmt::Write;

use tmsync_config::Config;
use tmsync_core::compiler::ScriptPlan;
use tmsync_core::{CompileContext, reconcile_tenant};

use crate::cli::{CompileArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

/// Human-readable outline of a plan, one section per phase.
fn plan_outline(plan: &ScriptPlan) -> String {
    let mut out = String::new();
    let mut section = |title: &str, lines: Vec<&str>| {
        if lines.is_empty() {
            return;
        }
        let _ = writeln!(out, "{title}:");
        for line in lines {
            let _ = writeln!(out, "  {line}");
        }
    };

    section("pre-transaction", plan.pre_trans.iter().map(|c| c.line.as_str()).collect());
    for tx in &plan.transactions {
        let title = match tx.delay_after_ms {
            Some(ms) => format!("transaction {} (then wait {ms} ms)", tx.kind),
            None => format!("transaction {}", tx.kind),
        };
        section(&title, tx.commands.iter().map(|c| c.line.as_str()).collect());
    }
    section("post-transaction", plan.post_trans.iter().map(|c| c.line.as_str()).collect());
    section("rollback", plan.rollback.iter().rev().map(|c| c.line.as_str()).collect());

    if out.is_empty() {
        out.push_str("no changes");
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: CompileArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let input = &args.input;
    let mut inputs = util::load_inputs(input).await?;
    let diff_ctx = util::diff_context(cfg, input)?;
    let format = config::output_format(global, cfg)?;

    let mut compile_ctx = CompileContext::new(input.scope.clone()).with_settings(cfg.reconcile.compile_settings());
    if let Some(task_id) = &args.task_id {
        compile_ctx = compile_ctx.with_task_id(task_id.clone());
    }

    let result = reconcile_tenant(
        &inputs.current,
        &inputs.desired,
        &mut inputs.common,
        &diff_ctx,
        &compile_ctx,
    )?;
    output::print_warnings(&result.script.warnings, config::color_mode(global, cfg)?);

    let out = match (args.plan, format) {
        (true, _) => output::render_single(format, &result.script.plan, plan_outline)?,
        (false, OutputFormat::Table | OutputFormat::Plain) => result.script.text.clone(),
        (false, _) => output::render_single(format, &result, |r| r.script.text.clone())?,
    };
    output::print_output(&out, global.quiet);

    util::persist_common(input, &inputs.common).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tmsync_core::{CommonState, ConfigTree, DiffContext, diff};

    fn tree(value: serde_json::Value) -> ConfigTree {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_plan_outline() {
        assert_eq!(plan_outline(&ScriptPlan::default()), "no changes");
    }

    #[test]
    fn outline_lists_transactions() {
        let desired = tree(json!({
            "/T/": { "command": "auth partition" },
            "/T/A/": { "command": "sys folder" },
            "/T/A/n1": { "command": "ltm node", "properties": { "address": "10.0.0.1" } }
        }));
        let current = ConfigTree::new();
        let mut common = CommonState::new();
        let diffs = diff(&current, &desired, &mut common, &DiffContext::new("T"), None).unwrap();
        let ctx = CompileContext::new("T").with_task_id("t1");
        let script = tmsync_core::compile(&ctx, &desired, &current, &diffs).unwrap();

        let outline = plan_outline(&script.plan);
        assert!(outline.contains("pre-transaction:"));
        assert!(outline.contains("transaction main"));
        assert!(outline.contains("ltm node /T/A/n1"));
    }
}
