//! Foundation types for EmbeddingBridge.
//!
//! This crate provides the identifiers, on-disk header layout, and status
//! taxonomy shared by the store, the transformers, and the transports. Every
//! other `embr-*` crate depends on `embr-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 of the uncompressed payload)
//! - [`ObjectHeader`] -- Packed 52-byte header stored in front of object payloads
//! - [`ObjectType`] -- Vector or metadata object
//! - [`npy`] -- Reader/writer for NumPy float32 `.npy` files
//! - [`Status`] -- Error taxonomy shared across crates, with stable descriptions

pub mod error;
pub mod header;
pub mod npy;
pub mod object;
pub mod status;

pub use error::TypeError;
pub use header::{ObjectHeader, ObjectType, FLAG_COMPRESSED, HEADER_LEN, HEADER_MAGIC, HEADER_VERSION};
pub use object::{ObjectId, HASH_HEX_LEN, MIN_PREFIX_LEN};
pub use status::Status;
