//! Declarative configuration reconciler for tmsh-managed devices.
//!
//! Given the running configuration of a tenant and the desired one, this
//! crate works out what has to change and turns that into one script the
//! device executes transactionally:
//!
//! - **[`differ`]**: Structural diff of two [`ConfigTree`]s into typed
//!   [`DiffEntry`] records (`N`/`D`/`E`/`A`), with per-command comparison
//!   rules, reference-counted shared nodes and virtual-addresses, and
//!   all-or-nothing topology collections.
//!
//! - **[`compiler`]**: Builds a [`ScriptPlan`] (pre-transaction steps,
//!   sequential transactions, post-transaction steps, compensations) from
//!   the diff and renders it as a `cli script` with rollback and a marker
//!   data-group for failure reporting.
//!
//! - **[`topology`]**: Parser and specificity orderer for GSLB topology
//!   match expressions.
//!
//! - **[`refs`]**: [`ReferenceTracker`] over the persisted
//!   [`CommonState`].
//!
//! - **[`plan`]**: Multi-pass scheduling and per-scope reconciliation.
//!
//! - **[`source`]**: The boundary to whatever supplies current state.

pub mod compiler;
pub mod differ;
pub mod error;
pub mod model;
pub mod plan;
pub mod refs;
pub mod source;
pub mod topology;

// ── Primary re-exports ──────────────────────────────────────────────
pub use compiler::{CompileContext, CompileSettings, CompileStage, Script, ScriptCompiler, ScriptPlan, compile};
pub use differ::{DiffContext, Pass, diff};
pub use error::CoreError;
pub use model::{CommonState, ConfigObject, ConfigTree, DiffEntry, DiffKind, DiffTag, PathSegment, Value};
pub use plan::{PassSchedule, PassStep, TenantPlan, reconcile_tenant};
pub use refs::{RefChange, ReferenceTracker};
pub use source::{CurrentSource, FileSource, fetch_current};
pub use topology::{RankTable, TopologyMatch, TopologyRecord, TopologyType};
