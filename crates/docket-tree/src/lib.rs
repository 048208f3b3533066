//! Tree overlay for Docket.
//!
//! A [`TreeOverlay`] is a mutable, lazily loaded view over a persisted tree.
//! Edits stay in memory and mark their ancestors dirty; [`TreeOverlay::write`]
//! persists only the dirty part and returns the new root tree id.

pub mod error;
pub mod overlay;

pub use error::{TreeError, TreeResult};
pub use overlay::{EntryTarget, Leaf, NodeId, OverlayEntry, TreeOverlay};
