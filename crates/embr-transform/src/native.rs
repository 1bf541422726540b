use crate::error::TransformResult;
use crate::traits::FormatTransformer;

/// Byte-exact passthrough.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeTransformer;

impl FormatTransformer for NativeTransformer {
    fn name(&self) -> &str {
        "native"
    }

    fn format_name(&self) -> &str {
        "native"
    }

    fn transform(&self, data: &[u8]) -> TransformResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn inverse_transform(&self, data: &[u8]) -> TransformResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}
