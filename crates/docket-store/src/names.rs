//! Ref naming: canonical ref paths and branch-name validation.
//!
//! Branch names follow git conventions:
//! - non-empty, no whitespace and none of `~ ^ : ? * [ \`
//! - no `..`, no `@{`, no `//`
//! - must not start or end with `.` or `/`, must not end with `.lock`
//! - no path component may start with `.`

use crate::error::{StoreError, StoreResult};

/// Prefix for local branches.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Prefix for remote-tracking branches.
pub const REMOTES_PREFIX: &str = "refs/remotes/";

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Canonical ref for a local branch (`refs/heads/<branch>`).
pub fn branch_ref(branch: &str) -> String {
    format!("{HEADS_PREFIX}{branch}")
}

/// Canonical ref for a remote-tracking branch (`refs/remotes/<remote>/<branch>`).
pub fn remote_ref(remote: &str, branch: &str) -> String {
    format!("{REMOTES_PREFIX}{remote}/{branch}")
}

fn invalid(name: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidRefName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a branch name.
///
/// ```
/// use docket_store::names::validate_branch_name;
///
/// assert!(validate_branch_name("master").is_ok());
/// assert!(validate_branch_name("staging/master").is_ok());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "branch name must not be empty"));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    for (pattern, reason) in [
        ("..", "must not contain '..'"),
        ("@{", "must not contain '@{'"),
        ("//", "must not contain '//'"),
    ] {
        if name.contains(pattern) {
            return Err(invalid(name, reason));
        }
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    if let Some(component) = name.split('/').find(|c| c.starts_with('.')) {
        return Err(invalid(
            name,
            format!("component must not start with '.': {component:?}"),
        ));
    }
    Ok(())
}

/// Validate a remote name: a branch-like name without slashes.
pub fn validate_remote_name(name: &str) -> StoreResult<()> {
    if name.contains('/') {
        return Err(invalid(name, "remote name must not contain '/'"));
    }
    validate_branch_name(name)
}

/// Validate a canonical ref name under `refs/heads/` or `refs/remotes/`.
pub fn validate_ref_name(name: &str) -> StoreResult<()> {
    if let Some(branch) = name.strip_prefix(HEADS_PREFIX) {
        return validate_branch_name(branch);
    }
    if let Some(rest) = name.strip_prefix(REMOTES_PREFIX) {
        let (remote, branch) = rest
            .split_once('/')
            .ok_or_else(|| invalid(name, "remote ref must name a remote and a branch"))?;
        validate_remote_name(remote)?;
        return validate_branch_name(branch);
    }
    Err(invalid(name, "refs must live under refs/heads/ or refs/remotes/"))
}
