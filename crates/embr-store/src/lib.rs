//! Content-addressed embedding storage for EmbeddingBridge.
//!
//! Objects live under `.eb/objects/` named by the BLAKE3 hash of their
//! uncompressed payload. Vector payloads are zstd-compressed behind a packed
//! header; files written before the header existed are still readable.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FsObjectStore`] -- one file per object under `objects/`
//! - [`InMemoryObjectStore`] -- `BTreeMap`-based store for tests and embedding
//!
//! # Repository
//!
//! - [`RepoContext`] -- where a repository lives, found by walking up or via `EB_REPO_ROOT`
//! - [`Repository`] -- object store plus per-set log, index, and model refs
//! - [`SetFiles`] -- the bookkeeping files of one set
//! - [`Repository::gc`] -- prune objects no set refers to, under `gc.lock`
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written.
//! 2. Write the object first, then the log, index, and refs that point at it.
//! 3. A hash prefix resolves to exactly one object or fails.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod gc;
pub mod legacy;
pub mod memory;
pub mod meta;
pub mod names;
pub mod object;
pub mod repo;
pub mod repository;
pub mod set;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use gc::{GcLock, GcReport, PruneExpire, DEFAULT_PRUNE_EXPIRE, GC_LOCK_FILE};
pub use legacy::{decode_legacy, LegacyFormat};
pub use memory::InMemoryObjectStore;
pub use meta::ObjectMeta;
pub use names::{validate_model_name, validate_remote_name, validate_set_name, validate_source_path};
pub use object::{decode_object, encode_object, is_zstd, DecodedObject};
pub use repo::{RepoContext, REPO_DIR, REPO_ROOT_ENV};
pub use repository::{RemoveOptions, RemovedSource, Repository, StoredEmbedding, DEFAULT_SET};
pub use set::{IndexEntry, LogEntry, SetFiles};
pub use traits::ObjectStore;
