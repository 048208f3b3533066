use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use docket_types::Signature;
use serde::{Deserialize, Serialize};

/// Commit metadata supplied to [`Change::finalize`](crate::Change::finalize).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitOptions {
    pub message: String,
    pub author: Signature,
    /// Defaults to the author.
    pub committer: Option<Signature>,
}

impl CommitOptions {
    /// Options authored by `name <email>` right now.
    pub fn new(message: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: Signature::now(name, email),
            committer: None,
        }
    }

    pub fn with_author_date(mut self, when: DateTime<FixedOffset>) -> Self {
        self.author.when = when;
        self
    }

    /// Record a committer distinct from the author, stamped with the author's date.
    pub fn with_committer(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.committer = Some(Signature::at(name, email, self.author.when));
        self
    }

    pub fn effective_committer(&self) -> &Signature {
        self.committer.as_ref().unwrap_or(&self.author)
    }
}

/// Backoff schedule for landing a commit.
///
/// The delay starts at `initial_backoff_ms` and doubles after every failed
/// attempt; attempts stop once it exceeds `max_backoff_ms`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Number of landing attempts the schedule allows.
    pub fn max_attempts(&self) -> u32 {
        let mut delay = self.initial_backoff_ms;
        let mut attempts = 0;
        while delay <= self.max_backoff_ms {
            attempts += 1;
            if delay == 0 {
                break;
            }
            delay = delay.saturating_mul(2);
        }
        attempts
    }
}
