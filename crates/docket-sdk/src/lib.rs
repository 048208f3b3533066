//! # docket-sdk
//!
//! Data sources backed by a Docket repository: configuration, document
//! paths, transactions on the source's branch and incremental indexing.
//!
//! ```no_run
//! use docket_sdk::{DataSource, DataSourceConfig, IndexMeta, Indexer};
//! use docket_diff::Gather;
//!
//! # async fn run() -> docket_sdk::SdkResult<()> {
//! let config = DataSourceConfig::load("docket.toml".as_ref())?;
//! let indexer = Indexer::new(DataSource::open(config).await?);
//! let mut sink = Gather::default();
//! let meta = indexer
//!     .begin_update()?
//!     .update_content(&IndexMeta::default(), &[], &mut sink)?;
//! # let _ = meta;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod indexer;
pub mod paths;
pub mod source;

pub use config::{DataSourceConfig, Identity, RemoteSourceConfig, DEFAULT_BRANCH};
pub use error::{SdkError, SdkResult};
pub use indexer::{DocRef, IndexMeta, Indexer, Updater};
pub use paths::filename_for;
pub use source::DataSource;
