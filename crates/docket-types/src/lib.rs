//! Foundation types for Docket.
//!
//! Docket is a transactional document store layered on a git-style object
//! model. This crate holds the small value types every other Docket crate
//! shares.
//!
//! # Key Types
//!
//! - [`Oid`]: content-addressed identifier (BLAKE3 hash)
//! - [`Signature`]: author/committer identity plus timestamp

pub mod error;
pub mod oid;
pub mod signature;

pub use error::TypeError;
pub use oid::Oid;
pub use signature::Signature;
