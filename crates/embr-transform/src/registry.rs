use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{TransformError, TransformResult};
use crate::native::NativeTransformer;
use crate::columnar::ParquetTransformer;
use crate::traits::FormatTransformer;

/// Shared handle to a registered transformer.
pub type SharedTransformer = Arc<dyn FormatTransformer>;

/// Transformers looked up by name.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: BTreeMap<String, SharedTransformer>,
}

impl TransformerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `native` and `parquet`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NativeTransformer));
        registry.register(Arc::new(ParquetTransformer::new()));
        registry
    }

    /// Register a transformer under its own name, replacing any previous
    /// one with that name.
    pub fn register(&mut self, transformer: SharedTransformer) {
        debug!(name = transformer.name(), "registering transformer");
        self.transformers
            .insert(transformer.name().to_string(), transformer);
    }

    /// Returns `true` if a transformer was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.transformers.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<SharedTransformer> {
        self.transformers.get(name).cloned()
    }

    /// Like [`TransformerRegistry::get`], failing with
    /// [`TransformError::UnknownFormat`].
    pub fn require(&self, name: &str) -> TransformResult<SharedTransformer> {
        self.get(name)
            .ok_or_else(|| TransformError::UnknownFormat(name.to_string()))
    }

    /// First transformer producing `format`.
    pub fn find_by_format(&self, format: &str) -> Option<SharedTransformer> {
        self.transformers
            .values()
            .find(|t| t.format_name() == format)
            .cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.transformers.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("names", &self.names())
            .finish()
    }
}
