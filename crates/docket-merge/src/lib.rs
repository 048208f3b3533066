//! Merge engine for Docket.
//!
//! Three-way merge of commit trees. Only clean merges succeed: any path
//! changed differently on both sides is reported as a conflict and nothing is
//! written.

pub mod error;
pub mod tree_merge;

pub use error::{MergeError, MergeResult};
pub use tree_merge::{merge_trees, perform_merge};
