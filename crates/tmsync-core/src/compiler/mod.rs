//! Transactional script compiler: diff entries → one device script.
//!
//! The compiler first builds a [`ScriptPlan`] (pre-transaction steps,
//! sequential transactions, post-transaction steps, compensations) and
//! renders it once. Objects the device refuses to change inside a
//! transaction are moved out of it and given a rollback step.

mod order;
pub mod plan;
mod render;
mod rules;
mod tmsh;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info, warn};

use crate::differ::strategy::command_matches;
use crate::differ::{DEFAULT_SHARED_PARTITION, LB_SETTINGS_COMMAND, TOPOLOGY_COMMAND, references_metadata};
use crate::error::CoreError;
use crate::model::{ConfigObject, ConfigTree, DiffEntry, DiffKind, DiffTag, Value, container_depth, partition_of};

pub use self::plan::{ScriptCommand, ScriptPlan, Transaction, TransactionKind};

/// Data-group the script uses to report its outcome.
pub const DEFAULT_MARKER_DATA_GROUP: &str = "__tmsync_update";
/// Name of the generated `cli script`.
pub const DEFAULT_SCRIPT_NAME: &str = "__tmsync_script";

const VIRTUAL_ADDRESS: &str = "ltm virtual-address";
const IMMUTABLE: &[(&str, &str)] = &[(VIRTUAL_ADDRESS, "address")];

// ── Settings & context ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompileSettings {
    pub shared_partition: String,
    pub marker_data_group: String,
    pub script_name: String,
    /// Wait after the GSLB datacenter transaction, in milliseconds.
    pub gslb_delay_ms: Option<u64>,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            shared_partition: DEFAULT_SHARED_PARTITION.to_owned(),
            marker_data_group: DEFAULT_MARKER_DATA_GROUP.to_owned(),
            script_name: DEFAULT_SCRIPT_NAME.to_owned(),
            gslb_delay_ms: None,
        }
    }
}

/// Per-compile inputs that are not part of the diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileContext {
    pub tenant: String,
    /// Short unique id; suffixes shadow import names.
    pub task_id: String,
    pub settings: CompileSettings,
}

impl CompileContext {
    pub fn new(tenant: impl Into<String>) -> Self {
        let mut task_id = uuid::Uuid::new_v4().simple().to_string();
        task_id.truncate(8);
        Self {
            tenant: tenant.into(),
            task_id,
            settings: CompileSettings::default(),
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_settings(mut self, settings: CompileSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Compiler output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    pub text: String,
    pub warnings: Vec<String>,
    pub plan: ScriptPlan,
}

/// Where a compile stands. Text is only produced on reaching `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CompileStage {
    Idle,
    ScaffoldEmitted,
    PreTransEmitted,
    TransEmitted(usize),
    RollbackEmitted,
    Done,
    Aborted,
}

// ── Per-object changes ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Delete,
    Modify,
    /// Delete then create inside the same transaction.
    Recreate,
    /// Shared-object reference count only.
    Metadata,
}

#[derive(Debug, Clone)]
struct Change {
    path: String,
    action: Action,
    before: Option<ConfigObject>,
    after: Option<ConfigObject>,
    touched: Vec<String>,
    /// Handled entirely outside the transactions.
    out_of_band: bool,
}

impl Change {
    fn new(path: &str, action: Action, before: Option<ConfigObject>, after: Option<ConfigObject>) -> Self {
        Self {
            path: path.to_owned(),
            action,
            before,
            after,
            touched: Vec::new(),
            out_of_band: false,
        }
    }

    fn command(&self) -> &str {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map_or("", |o| o.command.as_str())
    }

    /// The object whose references decide ordering.
    fn ordering_object(&self) -> Option<&ConfigObject> {
        match self.action {
            Action::Delete => self.before.as_ref(),
            _ => self.after.as_ref().or(self.before.as_ref()),
        }
    }

    fn name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

fn object_from(value: Option<&Value>, command: Option<&str>) -> Option<ConfigObject> {
    let map = value?.as_map()?;
    let mut object = ConfigObject::new(command?);
    object.properties = map.clone();
    Some(object)
}

fn entry_command<'a>(entry: &'a DiffEntry, current: &'a ConfigTree, desired: &'a ConfigTree) -> Option<&'a str> {
    if let Some(c) = entry.command.as_deref() {
        return Some(c);
    }
    let path = entry.object_path()?;
    current
        .get(path)
        .or_else(|| desired.get(path))
        .map(|o| o.command.as_str())
}

fn transaction_kind(change: &Change) -> TransactionKind {
    let command = change.command();
    let deleting = change.action == Action::Delete;
    if command_matches(command, "gtm datacenter") || command_matches(command, "gtm server") {
        if deleting {
            TransactionKind::DatacenterTeardown
        } else {
            TransactionKind::DatacenterSetup
        }
    } else if command == TOPOLOGY_COMMAND {
        TransactionKind::Topology
    } else if !deleting && (command == LB_SETTINGS_COMMAND || command_matches(command, "gtm wideip")) {
        TransactionKind::GslbSettings
    } else {
        TransactionKind::Main
    }
}

// ── Compiler ────────────────────────────────────────────────────────

/// One-shot compiler; [`compile`] wraps it for the common case.
#[derive(Debug)]
pub struct ScriptCompiler<'c> {
    ctx: &'c CompileContext,
    stage: CompileStage,
    plan: ScriptPlan,
    warnings: Vec<String>,
}

impl<'c> ScriptCompiler<'c> {
    pub fn new(ctx: &'c CompileContext) -> Self {
        Self {
            ctx,
            stage: CompileStage::Idle,
            plan: ScriptPlan::default(),
            warnings: Vec::new(),
        }
    }

    pub fn stage(&self) -> CompileStage {
        self.stage
    }

    fn advance(&mut self, next: CompileStage) {
        debug!(tenant = %self.ctx.tenant, from = %self.stage, to = %next, "compile stage");
        self.stage = next;
    }

    fn warn(&mut self, message: String) {
        warn!(tenant = %self.ctx.tenant, "{message}");
        self.warnings.push(message);
    }

    fn pre(&mut self, line: String, origin: &str) {
        self.plan.pre_trans.push(ScriptCommand::new(line, origin));
    }

    fn post(&mut self, line: String, origin: &str) {
        self.plan.post_trans.push(ScriptCommand::new(line, origin));
    }

    fn undo(&mut self, line: String, origin: &str) {
        self.plan.rollback.push(ScriptCommand::new(line, origin));
    }

    pub fn compile(
        &mut self,
        desired: &ConfigTree,
        current: &ConfigTree,
        diffs: &[DiffEntry],
    ) -> Result<Script, CoreError> {
        if self.stage != CompileStage::Idle {
            return Err(CoreError::Internal(format!(
                "compiler reused in stage {}",
                self.stage
            )));
        }
        if let Err(e) = validate(diffs, current, desired) {
            self.advance(CompileStage::Aborted);
            return Err(e);
        }

        let changes = self.collect(desired, current, diffs);
        self.advance(CompileStage::ScaffoldEmitted);

        let in_trans = self.emit_out_of_band(changes);
        self.advance(CompileStage::PreTransEmitted);

        self.emit_transactions(&in_trans);
        self.advance(CompileStage::RollbackEmitted);

        let text = render::script(&self.ctx.settings, &self.plan);
        self.advance(CompileStage::Done);
        info!(
            tenant = %self.ctx.tenant,
            transactions = self.plan.transactions.len(),
            warnings = self.warnings.len(),
            "script compiled"
        );
        Ok(Script {
            text,
            warnings: std::mem::take(&mut self.warnings),
            plan: std::mem::take(&mut self.plan),
        })
    }

    /// Group entries by object and decide what happens to each.
    fn collect(&mut self, desired: &ConfigTree, current: &ConfigTree, diffs: &[DiffEntry]) -> Vec<Change> {
        let mut grouped: IndexMap<&str, Vec<&DiffEntry>> = IndexMap::new();
        for entry in diffs {
            let path = entry.object_path().filter(|p| !p.is_empty());
            match path {
                Some(p) if entry.is_whole_object() || current.contains(p) || desired.contains(p) => {
                    grouped.entry(p).or_default().push(entry);
                }
                _ => self.warn(format!("skipped diff entry with malformed path '{}'", entry.path_display())),
            }
        }

        let mut changes = Vec::with_capacity(grouped.len());
        for (path, entries) in grouped {
            let whole = |kind: &DiffKind| {
                entries
                    .iter()
                    .copied()
                    .find(|e| e.is_whole_object() && &e.kind == kind)
            };
            let created = whole(&DiffKind::New);
            let deleted = whole(&DiffKind::Deleted);
            let created_obj = created.and_then(|e| object_from(e.rhs.as_ref(), entry_command(e, current, desired)));
            let deleted_obj = deleted.and_then(|e| {
                object_from(e.lhs.as_ref(), entry_command(e, current, desired)).or_else(|| current.get(path).cloned())
            });

            let change = match (created_obj, deleted_obj) {
                (Some(after), Some(before)) => Change::new(path, Action::Recreate, Some(before), Some(after)),
                (Some(after), None) => Change::new(path, Action::Create, None, Some(after)),
                (None, Some(before)) => Change::new(path, Action::Delete, Some(before), None),
                (None, None) if entries.iter().all(|e| e.has_tag(DiffTag::SharedReference)) => {
                    let Some(entry) = entries.last() else { continue };
                    let Some(command) = entry_command(entry, current, desired) else {
                        self.warn(format!("no command known for shared object {path}"));
                        continue;
                    };
                    let count = entry.rhs.as_ref().and_then(Value::as_i64).unwrap_or(0);
                    let mut object = ConfigObject::new(command);
                    object
                        .properties
                        .insert("metadata".to_owned(), references_metadata(count));
                    let mut change = Change::new(path, Action::Metadata, current.get(path).cloned(), Some(object));
                    change.touched.push("metadata".to_owned());
                    change
                }
                // Both list flavours name one device object, so a swap is a
                // modify under the new command that restates every property.
                (None, None) => {
                    let Some(after) = desired.get(path).cloned() else {
                        self.warn(format!("property changes for {path} have no desired object"));
                        continue;
                    };
                    let before = current.get(path).cloned();
                    let swapped = entries.iter().any(|e| e.has_tag(DiffTag::CommandSwap));
                    let restated: Vec<&str> = if swapped {
                        after
                            .properties
                            .keys()
                            .chain(before.iter().flat_map(|b| b.properties.keys()))
                            .map(String::as_str)
                            .collect()
                    } else {
                        Vec::new()
                    };
                    let mut touched: Vec<String> = Vec::new();
                    let names = restated.into_iter().chain(entries.iter().filter_map(|e| e.property()));
                    for name in names.filter(|n| *n != "command") {
                        if !touched.iter().any(|t| t == name) {
                            touched.push(name.to_owned());
                        }
                    }
                    let mut change = Change::new(path, Action::Modify, before, Some(after));
                    change.touched = touched;
                    change
                }
            };
            changes.push(change);
        }
        changes
    }

    /// Pre- and post-transaction steps. Returns what stays transactional.
    fn emit_out_of_band(&mut self, changes: Vec<Change>) -> Vec<Change> {
        let (mut containers, mut rest): (Vec<Change>, Vec<Change>) = changes
            .into_iter()
            .partition(|c| tmsh::is_container(c.command()) && matches!(c.action, Action::Create | Action::Delete));

        // Containers: shallow-first creation, deep-first removal.
        containers.sort_by_key(|c| container_depth(&c.path));
        for c in containers.iter().filter(|c| c.action == Action::Create) {
            let Some(after) = c.after.as_ref() else { continue };
            self.pre(tmsh::create(&c.path, after), &c.path);
            self.undo(tmsh::delete(after.command.as_str(), &c.path), &c.path);
        }
        let mut container_deletes: Vec<(String, String)> = containers
            .iter()
            .filter(|c| c.action == Action::Delete)
            .map(|c| (tmsh::delete(c.command(), &c.path), c.path.clone()))
            .collect();
        container_deletes.reverse();

        let mut tmc_moved = false;
        let mut deferred: Vec<(String, String)> = Vec::new();
        for c in &mut rest {
            let Some(command) = c.after.as_ref().or(c.before.as_ref()).map(|o| o.command.clone()) else {
                continue;
            };

            // Virtuals on traffic-matching-criteria go before the transaction.
            if c.action == Action::Delete {
                if let Some(before) = c.before.as_ref().filter(|b| rules::is_tmc_virtual(b)) {
                    let (delete, recreate) = (
                        tmsh::delete(&before.command, &c.path),
                        tmsh::create(&c.path, before),
                    );
                    let path = c.path.clone();
                    self.pre(delete, &path);
                    self.undo(recreate, &path);
                    c.out_of_band = true;
                    tmc_moved = true;
                    continue;
                }
            }

            // Pools swapping monitor and members together.
            if c.action == Action::Modify
                && command_matches(&command, "ltm pool")
                && c.touched.iter().any(|t| t == "monitor")
                && c.touched.iter().any(|t| t == "members")
            {
                let restore = c
                    .before
                    .as_ref()
                    .and_then(|b| b.get("monitor"))
                    .cloned()
                    .unwrap_or(Value::Null);
                let path = c.path.clone();
                self.pre(format!("tmsh::modify {command} {path} monitor none"), &path);
                self.undo(
                    format!(
                        "tmsh::modify {command} {path} {}",
                        tmsh::property(&command, "monitor", &restore, true)
                    ),
                    &path,
                );
                c.action = Action::Recreate;
            }

            // Rule-lists must drop their list references before deletion.
            if c.action == Action::Delete && command == rules::RULE_LIST {
                if let Some((clear, restore)) = c.before.as_ref().and_then(|b| rules::rule_list_refs(&c.path, b)) {
                    let path = c.path.clone();
                    self.pre(clear, &path);
                    self.undo(restore, &path);
                }
            }

            // Access policy archives are imported, not created.
            let imports = matches!(c.action, Action::Create | Action::Recreate)
                || c.touched.iter().any(|t| t == "import");
            if imports {
                if let Some(import) = c.after.as_ref().and_then(rules::Import::of) {
                    self.emit_import(c, &import);
                }
            }

            if c.action == Action::Delete && command == VIRTUAL_ADDRESS {
                deferred.push((tmsh::delete(&command, &c.path), c.path.clone()));
            }
        }

        if tmc_moved {
            for c in &mut rest {
                if c.action == Action::Delete && c.command() == VIRTUAL_ADDRESS {
                    c.out_of_band = true;
                }
            }
            for (line, path) in deferred {
                self.post(line, &path);
            }
        }
        for (line, path) in container_deletes {
            self.post(line, &path);
        }
        rest.retain(|c| !c.out_of_band);
        rest
    }

    fn emit_import(&mut self, change: &mut Change, import: &rules::Import) {
        let Some(partition) = partition_of(&change.path).map(ToOwned::to_owned) else {
            self.warn(format!("cannot import {}: path has no partition", change.path));
            return;
        };
        let name = change.name().to_owned();
        let shadow = format!("{name}_{}", self.ctx.task_id);
        let path = change.path.clone();

        self.pre(import.install(&name, &partition), &path);
        self.pre(import.install(&shadow, &partition), &path);
        self.post(rules::remove_import(&shadow, &partition), &path);
        self.undo(rules::remove_import(&name, &partition), &path);
        self.undo(rules::remove_import(&shadow, &partition), &path);
        self.warn(format!("{path} is imported outside the transaction"));

        // Remaining properties become a plain modify of the imported object.
        if let Some(after) = change.after.as_ref() {
            if matches!(change.action, Action::Create | Action::Recreate) {
                change.touched = after.properties.keys().cloned().collect();
                change.action = Action::Modify;
            }
        }
    }

    fn emit_transactions(&mut self, changes: &[Change]) {
        let mut emitted = 0;
        for kind in TransactionKind::ORDER {
            let members: Vec<&Change> = changes.iter().filter(|c| transaction_kind(c) == kind).collect();
            let commands = if kind == TransactionKind::Topology {
                self.topology_commands(&members)
            } else {
                transaction_commands(&members)
            };
            if commands.is_empty() {
                continue;
            }
            let delay_after_ms = match kind {
                TransactionKind::DatacenterSetup => self.ctx.settings.gslb_delay_ms.filter(|ms| *ms > 0),
                _ => None,
            };
            self.plan.transactions.push(Transaction {
                kind,
                commands,
                delay_after_ms,
            });
            emitted += 1;
            self.advance(CompileStage::TransEmitted(emitted));
        }
    }

    fn topology_commands(&mut self, members: &[&Change]) -> Vec<ScriptCommand> {
        let mut out = Vec::new();
        for c in members {
            let lines = rules::topology_lines(c.before.is_some(), c.after.as_ref(), &mut self.warnings);
            out.extend(lines.into_iter().map(|l| ScriptCommand::new(l, &c.path)));
        }
        out
    }
}

fn ordered<'a>(members: &[&'a Change], pick: impl Fn(&Change) -> bool) -> Vec<&'a Change> {
    let items: Vec<(&str, &ConfigObject)> = members
        .iter()
        .filter(|c| pick(c))
        .filter_map(|c| c.ordering_object().map(|o| (c.path.as_str(), o)))
        .collect();
    order::dependency_order(&items)
        .into_iter()
        .filter_map(|p| members.iter().copied().find(|c| c.path == p))
        .collect()
}

/// Deletes referencing-first, then everything else referenced-first.
fn transaction_commands(members: &[&Change]) -> Vec<ScriptCommand> {
    let mut deletes = ordered(members, |c| c.action == Action::Delete);
    deletes.reverse();
    let upserts = ordered(members, |c| c.action != Action::Delete);

    let mut out = Vec::new();
    for c in deletes.into_iter().chain(upserts) {
        let path = c.path.as_str();
        match (c.action, c.before.as_ref(), c.after.as_ref()) {
            (Action::Delete, Some(before), _) => {
                out.push(ScriptCommand::new(tmsh::delete(&before.command, path), path));
            }
            (Action::Create, _, Some(after)) => out.push(ScriptCommand::new(tmsh::create(path, after), path)),
            (Action::Recreate, Some(before), Some(after)) => {
                out.push(ScriptCommand::new(tmsh::delete(&before.command, path), path));
                out.push(ScriptCommand::new(tmsh::create(path, after), path));
            }
            (Action::Modify | Action::Metadata, _, Some(after)) => {
                if let Some(line) = tmsh::modify(path, after, c.touched.iter().map(String::as_str)) {
                    out.push(ScriptCommand::new(line, path));
                }
            }
            _ => debug!(path, action = ?c.action, "nothing to emit"),
        }
    }
    out
}

/// Changes the device forbids on a live object abort the compile.
fn validate(diffs: &[DiffEntry], current: &ConfigTree, desired: &ConfigTree) -> Result<(), CoreError> {
    for entry in diffs {
        if !matches!(entry.kind, DiffKind::Edited) {
            continue;
        }
        let (Some(path), Some(property)) = (entry.object_path(), entry.property()) else {
            continue;
        };
        let Some(command) = entry_command(entry, current, desired) else {
            continue;
        };
        if IMMUTABLE.iter().any(|(c, p)| *c == command && *p == property) {
            return Err(CoreError::ImmutableProperty {
                command: command.to_owned(),
                path: path.to_owned(),
                property: property.to_owned(),
            });
        }
    }
    Ok(())
}

/// Compile `diffs` for one tenant.
pub fn compile(
    ctx: &CompileContext,
    desired: &ConfigTree,
    current: &ConfigTree,
    diffs: &[DiffEntry],
) -> Result<Script, CoreError> {
    ScriptCompiler::new(ctx).compile(desired, current, diffs)
}

/// The script produced for an empty diff.
pub fn bootstrap_only(settings: &CompileSettings) -> String {
    render::script(settings, &ScriptPlan::default())
}
