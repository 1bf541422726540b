use crate::error::TransformResult;

/// Encodes payloads into a transfer format and back.
///
/// `inverse_transform(transform(x))` must give back `x` for every input the
/// transformer accepts, except that NumPy files come back as their bare
/// float32 payload. Input that is not in the transformer's format passes
/// through `inverse_transform` unchanged.
pub trait FormatTransformer: Send + Sync {
    /// Registry key, e.g. `"parquet"`.
    fn name(&self) -> &str;

    /// File format produced by [`FormatTransformer::transform`]; also the
    /// extension used for remote document keys.
    fn format_name(&self) -> &str;

    fn transform(&self, data: &[u8]) -> TransformResult<Vec<u8>>;

    fn inverse_transform(&self, data: &[u8]) -> TransformResult<Vec<u8>>;
}
