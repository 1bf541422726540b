//! Moving embeddings between EmbeddingBridge repositories.
//!
//! A [`Transport`] is opened from a URL; the scheme picks the backend.
//!
//! # Backends
//!
//! - [`LocalTransport`] -- another repository on this machine (`file://` or a bare path)
//! - [`S3Transport`] -- documents and set metadata under an `s3://` bucket prefix
//! - [`SshTransport`] -- `ssh://` and `user@host` remotes, not supported in this build
//! - [`HttpTransport`] -- `http(s)://` remotes, not supported in this build
//!
//! # Key Types
//!
//! - [`Transport`] -- argument checks, on-demand connect, and error recording
//! - [`Backend`] -- the trait every backend implements
//! - [`TransportKind`] -- URL classification
//! - [`TransportError`] -- every failure, mapped onto a shared status code

pub mod backend;
pub mod error;
pub mod http;
pub mod local;
pub mod s3;
pub mod ssh;
pub mod transport;
pub mod url;

pub use backend::{Backend, TransferOptions};
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use local::LocalTransport;
pub use s3::{
    KeyLayout, MemoryObjectClient, ObjectClient, RemoteMetadata, RemoteObject,
    S3Config, S3Transport,
};
pub use ssh::SshTransport;
pub use transport::{Transport, TransportSettings};
pub use url::{S3Location, TransportKind};
