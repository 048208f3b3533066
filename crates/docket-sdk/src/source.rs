use std::sync::Arc;

use docket_change::{Change, CommitOptions};
use docket_store::{Repository, StoreError};
use docket_types::Oid;
use tracing::info;

use crate::config::DataSourceConfig;
use crate::error::{SdkError, SdkResult};
use crate::paths::filename_for;

/// A configured data source bound to its repository.
#[derive(Debug)]
pub struct DataSource {
    config: DataSourceConfig,
    repo: Arc<Repository>,
}

impl DataSource {
    /// Open the source's repository, creating it if needed.
    ///
    /// A missing local repository is initialised with a `First commit` on
    /// the source's branch. A remote source is cloned into its cache
    /// directory on first use.
    pub async fn open(config: DataSourceConfig) -> SdkResult<Self> {
        config.validate()?;
        let repo = match (&config.repo, &config.remote) {
            (Some(path), None) => match Repository::open(path) {
                Ok(repo) => Arc::new(repo),
                Err(StoreError::RepoNotFound(_)) => {
                    info!(path = %path.display(), "no repository found, initialising");
                    let mut change = Change::create_initial(path, &config.target_branch())?;
                    let opts = CommitOptions::new("First commit", &config.identity.name, &config.identity.email);
                    change.finalize(&opts).await?;
                    Arc::clone(change.repo())
                }
                Err(e) => return Err(e.into()),
            },
            (None, Some(remote)) => match Repository::open(&remote.cache_dir) {
                Ok(repo) => Arc::new(repo),
                Err(StoreError::RepoNotFound(_)) => {
                    info!(url = %remote.url, path = %remote.cache_dir.display(), "cloning remote");
                    Arc::new(Repository::clone(&remote.url, &remote.cache_dir)?)
                }
                Err(e) => return Err(e.into()),
            },
            _ => return Err(SdkError::Config("one of 'remote' or 'repo' must be set".into())),
        };
        Ok(Self { config, repo })
    }

    /// Use an already opened repository.
    pub fn from_repository(config: DataSourceConfig, repo: Arc<Repository>) -> SdkResult<Self> {
        config.validate()?;
        Ok(Self { config, repo })
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    /// Start a transaction on the source's branch, in the source's landing mode.
    pub fn open_change(&self, parent: Option<Oid>) -> SdkResult<Change> {
        Ok(Change::create(
            Arc::clone(&self.repo),
            parent,
            &self.config.target_branch(),
            self.config.landing_mode(),
        )?)
    }

    /// Repository path of a document in this source.
    pub fn filename_for(&self, doc_type: &str, id: &str, is_schema: bool) -> String {
        filename_for(&self.config.base_path_segments(), doc_type, id, is_schema)
    }

    /// Author for commits the source makes on its own behalf.
    pub fn commit_options(&self, message: impl Into<String>) -> CommitOptions {
        CommitOptions::new(message, &self.config.identity.name, &self.config.identity.email)
    }
}
