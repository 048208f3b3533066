use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

/// Identity and timestamp recorded as a commit's author or committer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Wall-clock time including the signer's UTC offset.
    pub when: DateTime<FixedOffset>,
}

impl Signature {
    /// A signature stamped with the current local time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::at(name, email, Local::now().fixed_offset())
    }

    /// A signature with an explicit timestamp.
    pub fn at(name: impl Into<String>, email: impl Into<String>, when: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }
}
