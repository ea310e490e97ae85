// ── Shared-resource reference tracker ──
//
// Reference counting over `CommonState`. The tracker borrows the state
// mutably for its whole lifetime, so only one reconciliation unit can
// adjust counts at a time.

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{CommonState, EXTERNALLY_OWNED, SharedKind, SharedResourceRecord};

/// Outcome of a reference count adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefChange {
    /// The record did not exist (or held zero) and now holds `count`.
    Created { count: i64 },
    /// An existing record was incremented.
    Incremented { from: i64, to: i64 },
    /// An existing record was decremented but is still referenced.
    Decremented { from: i64, to: i64 },
    /// The count reached zero; the record was dropped.
    Released { from: i64 },
    /// The record is externally owned and was left alone.
    External,
    /// Nothing to do (zero delta or unknown record).
    Unchanged,
}

/// Mutating view over one `CommonState`.
pub struct ReferenceTracker<'a> {
    state: &'a mut CommonState,
}

impl<'a> ReferenceTracker<'a> {
    pub fn new(state: &'a mut CommonState) -> Self {
        Self { state }
    }

    pub fn lookup(&self, kind: SharedKind, full_path: &str) -> Option<&SharedResourceRecord> {
        self.state
            .list(kind)
            .iter()
            .find(|r| r.full_path == full_path)
    }

    fn lookup_mut(&mut self, kind: SharedKind, full_path: &str) -> Option<&mut SharedResourceRecord> {
        self.state
            .list_mut(kind)
            .iter_mut()
            .find(|r| r.full_path == full_path)
    }

    /// Stored count, `None` when the object is untracked.
    pub fn count(&self, kind: SharedKind, full_path: &str) -> Option<i64> {
        self.lookup(kind, full_path).map(SharedResourceRecord::references)
    }

    /// Record an object that exists on the device but was never created
    /// through a tracked reference.
    pub fn register_external(&mut self, kind: SharedKind, full_path: &str, address: &str) {
        if self.lookup(kind, full_path).is_some() {
            return;
        }
        debug!(%kind, full_path, "registering externally owned shared object");
        self.state
            .list_mut(kind)
            .push(SharedResourceRecord::new(full_path, address, EXTERNALLY_OWNED));
    }

    /// Add `count` references, creating the record when needed.
    pub fn acquire(&mut self, kind: SharedKind, full_path: &str, address: &str, count: i64) -> RefChange {
        if count <= 0 {
            return RefChange::Unchanged;
        }
        match self.lookup_mut(kind, full_path) {
            Some(record) if record.is_externally_owned() => RefChange::External,
            Some(record) => {
                let from = record.references();
                let to = from + count;
                record.set_references(to);
                if record.address.is_empty() {
                    address.clone_into(&mut record.address);
                }
                if from == 0 {
                    RefChange::Created { count: to }
                } else {
                    RefChange::Incremented { from, to }
                }
            }
            None => {
                self.state
                    .list_mut(kind)
                    .push(SharedResourceRecord::new(full_path, address, count));
                RefChange::Created { count }
            }
        }
    }

    /// Remove `count` references. A count that would go negative is
    /// refused and the record is left untouched.
    pub fn release(&mut self, kind: SharedKind, full_path: &str, count: i64) -> Result<RefChange, CoreError> {
        if count <= 0 {
            return Ok(RefChange::Unchanged);
        }
        let Some(record) = self.lookup_mut(kind, full_path) else {
            return Ok(RefChange::Unchanged);
        };
        if record.is_externally_owned() {
            return Ok(RefChange::External);
        }
        let from = record.references();
        let to = from - count;
        if to < 0 {
            warn!(full_path, stored = from, released = count, "reference count underflow refused");
            return Err(CoreError::ReferenceUnderflow {
                full_path: full_path.to_owned(),
                stored: from,
                released: count,
            });
        }
        if to == 0 {
            self.state.list_mut(kind).retain(|r| r.full_path != full_path);
            return Ok(RefChange::Released { from });
        }
        record.set_references(to);
        Ok(RefChange::Decremented { from, to })
    }

    /// The count `release` would produce, without mutating anything.
    pub fn preview_release(&self, kind: SharedKind, full_path: &str, count: i64) -> Option<i64> {
        let record = self.lookup(kind, full_path)?;
        if record.is_externally_owned() {
            return None;
        }
        Some(record.references() - count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NODE: &str = "/Common/10.0.0.1";

    #[test]
    fn first_acquire_creates_with_one() {
        let mut state = CommonState::new();
        let mut t = ReferenceTracker::new(&mut state);
        assert_eq!(
            t.acquire(SharedKind::Node, NODE, "10.0.0.1", 1),
            RefChange::Created { count: 1 }
        );
        assert_eq!(t.count(SharedKind::Node, NODE), Some(1));
        assert_eq!(state.node_list.len(), 1);
    }

    #[test]
    fn second_acquire_increments() {
        let mut state = CommonState::new();
        let mut t = ReferenceTracker::new(&mut state);
        t.acquire(SharedKind::Node, NODE, "10.0.0.1", 1);
        assert_eq!(
            t.acquire(SharedKind::Node, NODE, "10.0.0.1", 1),
            RefChange::Incremented { from: 1, to: 2 }
        );
    }

    #[test]
    fn release_to_zero_drops_record() {
        let mut state = CommonState::new();
        let mut t = ReferenceTracker::new(&mut state);
        t.acquire(SharedKind::Node, NODE, "10.0.0.1", 2);
        assert_eq!(
            t.release(SharedKind::Node, NODE, 1).unwrap(),
            RefChange::Decremented { from: 2, to: 1 }
        );
        assert_eq!(
            t.release(SharedKind::Node, NODE, 1).unwrap(),
            RefChange::Released { from: 1 }
        );
        assert!(state.node_list.is_empty());
    }

    #[test]
    fn underflow_is_refused_without_mutation() {
        let mut state = CommonState::new();
        let mut t = ReferenceTracker::new(&mut state);
        t.acquire(SharedKind::Node, NODE, "10.0.0.1", 1);
        let err = t.release(SharedKind::Node, NODE, 2).unwrap_err();
        assert!(matches!(err, CoreError::ReferenceUnderflow { stored: 1, released: 2, .. }));
        assert_eq!(t.count(SharedKind::Node, NODE), Some(1));
    }

    #[test]
    fn externally_owned_records_are_never_touched() {
        let mut state = CommonState::new();
        let mut t = ReferenceTracker::new(&mut state);
        t.register_external(SharedKind::VirtualAddress, "/Common/va", "10.0.0.9");
        assert_eq!(
            t.acquire(SharedKind::VirtualAddress, "/Common/va", "10.0.0.9", 1),
            RefChange::External
        );
        assert_eq!(
            t.release(SharedKind::VirtualAddress, "/Common/va", 1).unwrap(),
            RefChange::External
        );
        assert_eq!(t.count(SharedKind::VirtualAddress, "/Common/va"), Some(EXTERNALLY_OWNED));
    }

    #[test]
    fn preview_does_not_mutate() {
        let mut state = CommonState::new();
        let mut t = ReferenceTracker::new(&mut state);
        t.acquire(SharedKind::Node, NODE, "10.0.0.1", 3);
        assert_eq!(t.preview_release(SharedKind::Node, NODE, 3), Some(0));
        assert_eq!(t.count(SharedKind::Node, NODE), Some(3));
    }
}
