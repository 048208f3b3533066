use std::path::{Path, PathBuf};

use docket_change::LandingMode;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Name of every data source's branch, after the prefix.
pub const DEFAULT_BRANCH: &str = "master";

/// Configuration of one repository-backed data source.
///
/// Exactly one of `repo` (a local repository, created on first use) and
/// `remote` (an upstream repository worked on through a local clone) must be
/// set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub repo: Option<PathBuf>,
    pub remote: Option<RemoteSourceConfig>,
    /// Slash-separated directory holding this source's documents.
    pub base_path: String,
    pub branch_prefix: String,
    /// Author of commits the data source makes on its own.
    pub identity: Identity,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSourceConfig {
    pub url: String,
    /// Where the local clone of `url` lives.
    pub cache_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "Docket Hub".into(),
            email: "hub@docket.local".into(),
        }
    }
}

impl DataSourceConfig {
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> SdkResult<()> {
        match (&self.repo, &self.remote) {
            (Some(_), Some(_)) => Err(SdkError::Config(
                "'remote' and 'repo' cannot both be set for a data source".into(),
            )),
            (None, None) => Err(SdkError::Config("one of 'remote' or 'repo' must be set".into())),
            _ => Ok(()),
        }
    }

    pub fn base_path_segments(&self) -> Vec<String> {
        self.base_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// `<branch_prefix>master`.
    pub fn target_branch(&self) -> String {
        format!("{}{DEFAULT_BRANCH}", self.branch_prefix)
    }

    pub fn landing_mode(&self) -> LandingMode {
        if self.remote.is_some() {
            LandingMode::Remote
        } else {
            LandingMode::Local
        }
    }
}
