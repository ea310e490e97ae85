// ── Domain model ──
//
// Config trees, diff entries and shared-partition state. Topology
// records live with their parser in `crate::topology`.

pub mod common;
pub mod diff;
pub mod tree;
pub mod value;

pub use common::{
    CommonState, EXTERNALLY_OWNED, MetadataValue, REFERENCES_KEY, SharedKind, SharedResourceRecord,
};
pub use diff::{ArrayChange, DiffEntry, DiffKind, DiffTag, ORDER_SEGMENT, PathSegment, path_of};
pub use tree::{ConfigObject, ConfigTree, container_depth, partition_of};
pub use value::Value;
