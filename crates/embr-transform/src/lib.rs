//! Format transformers for EmbeddingBridge.
//!
//! Transports run payloads through a [`FormatTransformer`] before upload and
//! the sync layer runs the inverse after download.
//!
//! # Key Types
//!
//! - [`FormatTransformer`] -- encode/decode contract
//! - [`NativeTransformer`] -- byte-exact passthrough
//! - [`ParquetTransformer`] -- float vectors as a Parquet `values` column
//! - [`TransformerRegistry`] -- name lookup, preloaded by [`TransformerRegistry::with_builtins`]

pub mod columnar;
pub mod error;
pub mod native;
pub mod registry;
pub mod traits;

pub use columnar::{is_parquet, ParquetTransformer, DIMENSIONS_KEY};
pub use error::{TransformError, TransformResult};
pub use native::NativeTransformer;
pub use registry::{SharedTransformer, TransformerRegistry};
pub use traits::FormatTransformer;
