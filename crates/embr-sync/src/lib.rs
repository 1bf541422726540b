//! Set synchronization for EmbeddingBridge.
//!
//! Pushes the objects of a set to a remote, pulls a set back from an S3
//! remote (decoding and hash-checking every document), and keeps the named
//! remotes of a repository in `.eb/config.toml`.

pub mod config;
pub mod error;
pub mod remote;
pub mod types;

pub use config::{CoreConfig, RemoteConfig, RepoConfig};
pub use error::{SyncError, SyncResult};
pub use remote::{list_remote, pull_set, push_set, set_url};
pub use types::{PullResult, PushOptions, PushResult};
