// ── Script plan ──
//
// The compiler builds this explicit command list first and renders it
// to text in one pass. Rollback commands are recorded next to the
// forward commands they compensate, never spliced from rendered text.

use serde::Serialize;
use strum::{AsRefStr, Display};

/// One tmsh/Tcl line plus the object it was generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptCommand {
    pub line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ScriptCommand {
    pub fn new(line: impl Into<String>, origin: &str) -> Self {
        Self {
            line: line.into(),
            origin: Some(origin.to_owned()),
        }
    }
}

/// Which sequential transaction a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TransactionKind {
    /// GSLB datacenters and servers being created or modified.
    DatacenterSetup,
    /// Everything that has no reason to be isolated.
    Main,
    /// Topology records: delete all, then create all.
    Topology,
    /// GSLB load-balancing settings and wide-IPs.
    GslbSettings,
    /// GSLB datacenters and servers being deleted.
    DatacenterTeardown,
}

impl TransactionKind {
    pub const ORDER: [Self; 5] = [
        Self::DatacenterSetup,
        Self::Main,
        Self::Topology,
        Self::GslbSettings,
        Self::DatacenterTeardown,
    ];
}

/// One `begin_transaction … commit_transaction` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub commands: Vec<ScriptCommand>,
    /// Milliseconds to wait after commit before the next step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_after_ms: Option<u64>,
}

/// The whole script before rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptPlan {
    pub pre_trans: Vec<ScriptCommand>,
    pub transactions: Vec<Transaction>,
    pub post_trans: Vec<ScriptCommand>,
    /// Compensations in forward order; rendered reversed.
    pub rollback: Vec<ScriptCommand>,
}

impl ScriptPlan {
    pub fn is_empty(&self) -> bool {
        self.pre_trans.is_empty()
            && self.transactions.is_empty()
            && self.post_trans.is_empty()
            && self.rollback.is_empty()
    }

    /// Every forward line in execution order, for inspection and tests.
    pub fn forward_lines(&self) -> Vec<&str> {
        self.pre_trans
            .iter()
            .chain(self.transactions.iter().flat_map(|t| t.commands.iter()))
            .chain(self.post_trans.iter())
            .map(|c| c.line.as_str())
            .collect()
    }
}
