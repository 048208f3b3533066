use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// File name of the repository config inside the git directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Per-repository settings persisted as `<gitdir>/config.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Bare repositories have no working directory.
    #[serde(default)]
    pub bare: bool,
    /// Configured remotes by name.
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
}

impl RepoConfig {
    pub fn load(gitdir: &Path) -> StoreResult<Self> {
        let path = gitdir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, gitdir: &Path) -> StoreResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))?;
        fs::write(gitdir.join(CONFIG_FILE), text)?;
        Ok(())
    }

    pub fn remote_url(&self, name: &str) -> StoreResult<&str> {
        self.remotes
            .get(name)
            .map(|r| r.url.as_str())
            .ok_or_else(|| StoreError::RemoteNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(RepoConfig::load(dir.path()).unwrap(), RepoConfig::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RepoConfig::default();
        config.remotes.insert(
            "origin".into(),
            RemoteConfig {
                url: "file:///srv/cards".into(),
            },
        );
        config.save(dir.path()).unwrap();

        let loaded = RepoConfig::load(dir.path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.remote_url("origin").unwrap(), "file:///srv/cards");
        assert!(matches!(
            loaded.remote_url("upstream"),
            Err(StoreError::RemoteNotFound(_))
        ));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "bare = \"yes\"").unwrap();
        assert!(matches!(RepoConfig::load(dir.path()), Err(StoreError::Config(_))));
    }
}
