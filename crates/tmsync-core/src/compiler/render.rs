// ── Script text ──
//
// Everything between the bootstrap and the error handler is taken from
// the plan verbatim; rollback steps run newest-first, each one caught so
// a failing compensation does not stop the others.

use std::fmt::Write;

use super::CompileSettings;
use super::plan::ScriptPlan;

pub(crate) fn script(settings: &CompileSettings, plan: &ScriptPlan) -> String {
    let marker = &settings.marker_data_group;
    let mut out = String::new();

    let _ = writeln!(out, "cli script {} {{", settings.script_name);
    out.push_str("proc script::run {} {\n");

    // Bootstrap: reset the marker, creating it on first use.
    out.push_str("if {[catch {\n");
    let _ = writeln!(out, "tmsh::modify ltm data-group internal {marker} records none");
    out.push_str("} err]} {\n");
    let _ = writeln!(
        out,
        "tmsh::create ltm data-group internal {marker} type string records none"
    );
    out.push_str("}\n");

    out.push_str("if { [catch {\n");
    for command in &plan.pre_trans {
        let _ = writeln!(out, "{}", command.line);
    }
    for transaction in &plan.transactions {
        out.push_str("tmsh::begin_transaction\n");
        for command in &transaction.commands {
            let _ = writeln!(out, "{}", command.line);
        }
        out.push_str("tmsh::commit_transaction\n");
        if let Some(ms) = transaction.delay_after_ms {
            let _ = writeln!(out, "after {ms}");
        }
    }
    for command in &plan.post_trans {
        let _ = writeln!(out, "{}", command.line);
    }
    out.push_str("} err] } {\n");
    let _ = writeln!(
        out,
        "tmsh::modify ltm data-group internal {marker} records add \\{{ error \\{{ data \\\"$err\\\" \\}} \\}}"
    );
    for command in plan.rollback.iter().rev() {
        let _ = writeln!(out, "catch {{ {} }}", command.line);
    }
    out.push_str("}\n}\n}\n");
    out
}
