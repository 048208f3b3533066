//! # docket-change
//!
//! Transactions over a Docket repository. A [`Change`] stages file edits in
//! memory on top of a parent commit and lands them on a branch with
//! [`Change::finalize`], merging with concurrent writers and retrying with
//! exponential backoff.

pub mod change;
pub mod error;
pub mod handle;
pub mod options;

pub use change::{head_commit, Change, LandingMode, ORIGIN};
pub use error::{ChangeError, ChangeResult};
pub use handle::{Access, FileHandle};
pub use options::{CommitOptions, RetryPolicy};
