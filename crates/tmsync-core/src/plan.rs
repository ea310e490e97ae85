// ── Pass planning ──
//
// A declaration touching the shared partition is reconciled in passes:
// the shared scope first (creates only), then every tenant, then the
// shared scope again so releases see every tenant's final references.

use serde::Serialize;
use tracing::{info, instrument};

use crate::compiler::{CompileContext, Script, compile};
use crate::differ::{DiffContext, Pass, diff};
use crate::error::CoreError;
use crate::model::{CommonState, ConfigTree, DiffEntry};

/// One scheduled diff/compile step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassStep {
    pub scope: String,
    pub pass: Pass,
}

/// Ordered reconciliation steps for a set of scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSchedule {
    steps: Vec<PassStep>,
}

impl PassSchedule {
    /// `tenants` may include the shared partition; it is then wrapped
    /// around the other tenants as a first and a final pass.
    pub fn for_tenants<S: AsRef<str>>(shared: &str, tenants: &[S]) -> Self {
        let includes_shared = tenants.iter().any(|t| t.as_ref() == shared);
        let mut steps = Vec::with_capacity(tenants.len() + 1);
        if includes_shared {
            steps.push(PassStep {
                scope: shared.to_owned(),
                pass: Pass::First,
            });
        }
        for tenant in tenants.iter().map(AsRef::as_ref) {
            if tenant == shared || steps.iter().any(|s| s.scope == tenant) {
                continue;
            }
            steps.push(PassStep {
                scope: tenant.to_owned(),
                pass: Pass::Final,
            });
        }
        if includes_shared {
            steps.push(PassStep {
                scope: shared.to_owned(),
                pass: Pass::Final,
            });
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[PassStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<'a> IntoIterator for &'a PassSchedule {
    type Item = &'a PassStep;
    type IntoIter = std::slice::Iter<'a, PassStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Result of reconciling one scope.
#[derive(Debug, Clone, Serialize)]
pub struct TenantPlan {
    pub scope: String,
    pub pass: Pass,
    pub diffs: Vec<DiffEntry>,
    pub script: Script,
    /// Shared objects whose release was deferred to the final pass.
    pub unchecked: ConfigTree,
}

/// Diff and compile one scope.
///
/// Reference counts are committed to `common` only when both steps
/// succeed, so a rejected declaration leaves the counts untouched.
#[instrument(skip_all, fields(scope = %diff_ctx.scope_id, pass = %diff_ctx.pass))]
pub fn reconcile_tenant(
    current: &ConfigTree,
    desired: &ConfigTree,
    common: &mut CommonState,
    diff_ctx: &DiffContext,
    compile_ctx: &CompileContext,
) -> Result<TenantPlan, CoreError> {
    let mut working = common.clone();
    let mut unchecked = ConfigTree::new();
    let diffs = diff(current, desired, &mut working, diff_ctx, Some(&mut unchecked))?;
    let script = compile(compile_ctx, desired, current, &diffs)?;
    *common = working;

    info!(
        changes = diffs.len(),
        deferred = unchecked.len(),
        "scope reconciled"
    );
    Ok(TenantPlan {
        scope: diff_ctx.scope_id.clone(),
        pass: diff_ctx.pass,
        diffs,
        script,
        unchecked,
    })
}
