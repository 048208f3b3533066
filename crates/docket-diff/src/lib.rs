//! Tree differ for Docket.
//!
//! Compares two commit trees and turns the difference into `save`/`delete`
//! operations against a search index, so an indexer only touches documents
//! that actually changed.
//!
//! # Key Types
//!
//! - [`TreeDiffer`] -- walks old and new trees side by side
//! - [`IndexOps`] -- sink for the resulting operations ([`Gather`] collects saves)
//! - [`PathFilter`] -- per-level restriction of which entries are visited

pub mod error;
pub mod filter;
pub mod ops;
pub mod tree_diff;

pub use error::{DiffError, DiffResult};
pub use filter::PathFilter;
pub use ops::{Gather, IndexOps};
pub use tree_diff::{identify, index_document, is_internal_card, stamp, TreeDiffer};
