//! Parquet encoding for embeddings.
//!
//! Float32 vectors (a `.npy` file or raw little-endian floats) become a
//! single non-nullable `values: Float32` column, with the vector width stored
//! under the `dimensions` key of the file metadata. Anything else becomes a
//! one-row `data: Binary` column. JSON documents are left as they are.

use std::sync::Arc;

use arrow_array::{Array, ArrayRef, BinaryArray, Float32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use bytes::Bytes;
use embr_types::npy;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tracing::{debug, warn};

use crate::error::{TransformError, TransformResult};
use crate::traits::FormatTransformer;

/// Magic bytes at both ends of a Parquet file.
pub const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// File metadata key holding the float count of a `values` column.
pub const DIMENSIONS_KEY: &str = "dimensions";

/// File metadata key recording what the input looked like.
pub const INPUT_KIND_KEY: &str = "embr.input";

const VALUES_COLUMN: &str = "values";
const DATA_COLUMN: &str = "data";

/// Default zstd level for column chunks.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 9;

/// Returns `true` if `data` is framed by Parquet magic bytes.
pub fn is_parquet(data: &[u8]) -> bool {
    data.len() >= 8 && data.starts_with(PARQUET_MAGIC) && data.ends_with(PARQUET_MAGIC)
}

/// Whether `data` is a complete JSON object or array and should not be
/// converted.
///
/// Float vectors can start with `{` and end with `]` byte-wise, so the
/// framing bytes alone are not enough; the document must parse.
pub fn looks_like_json(data: &[u8]) -> bool {
    matches!(data.first(), Some(b'{' | b'['))
        && serde_json::from_slice::<serde::de::IgnoredAny>(data).is_ok()
}

#[derive(Debug)]
enum Input {
    Floats { values: Vec<f32>, kind: &'static str },
    Binary,
}

fn classify(data: &[u8]) -> Input {
    match npy::parse_npy(data) {
        Ok(Some(view)) => {
            return Input::Floats {
                values: floats_from_le(view.data),
                kind: "npy",
            }
        }
        Ok(None) => {}
        Err(e) => debug!(error = %e, "npy header not usable, storing as binary"),
    }
    if npy::is_npy(data) {
        return Input::Binary;
    }
    if data.len() % 4 == 0 {
        Input::Floats {
            values: floats_from_le(data),
            kind: "f32",
        }
    } else {
        Input::Binary
    }
}

fn floats_from_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Converts embeddings to and from Parquet files.
#[derive(Clone, Debug)]
pub struct ParquetTransformer {
    compression_level: i32,
}

impl ParquetTransformer {
    pub fn new() -> Self {
        Self::with_compression_level(DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn with_compression_level(level: i32) -> Self {
        Self {
            compression_level: level,
        }
    }

    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    fn write(&self, column: ArrayRef, name: &str, metadata: Vec<KeyValue>) -> TransformResult<Vec<u8>> {
        let schema = Arc::new(Schema::new(vec![Field::new(
            name,
            column.data_type().clone(),
            false,
        )]));
        let batch = RecordBatch::try_new(schema.clone(), vec![column])?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::try_new(self.compression_level)?))
            .set_key_value_metadata(Some(metadata))
            .build();

        let mut out = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut out, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(out)
    }
}

impl Default for ParquetTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatTransformer for ParquetTransformer {
    fn name(&self) -> &str {
        "parquet"
    }

    fn format_name(&self) -> &str {
        "parquet"
    }

    fn transform(&self, data: &[u8]) -> TransformResult<Vec<u8>> {
        if data.is_empty() {
            return Err(TransformError::InvalidInput("input is empty".into()));
        }
        if data.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
            warn!("parquet input starts with a zstd frame; expected uncompressed data");
        }
        if looks_like_json(data) {
            debug!(bytes = data.len(), "input looks like JSON, passing through");
            return Ok(data.to_vec());
        }

        match classify(data) {
            Input::Floats { values, kind } => {
                let dims = values.len();
                let metadata = vec![
                    KeyValue::new(DIMENSIONS_KEY.to_string(), dims.to_string()),
                    KeyValue::new(INPUT_KIND_KEY.to_string(), kind.to_string()),
                ];
                let column: ArrayRef = Arc::new(Float32Array::from(values));
                let out = self.write(column, VALUES_COLUMN, metadata)?;
                debug!(dims, kind, bytes = out.len(), "encoded float vector as parquet");
                Ok(out)
            }
            Input::Binary => {
                let metadata = vec![KeyValue::new(INPUT_KIND_KEY.to_string(), "binary".to_string())];
                let column: ArrayRef = Arc::new(BinaryArray::from_vec(vec![data]));
                let out = self.write(column, DATA_COLUMN, metadata)?;
                debug!(input = data.len(), bytes = out.len(), "encoded binary payload as parquet");
                Ok(out)
            }
        }
    }

    fn inverse_transform(&self, data: &[u8]) -> TransformResult<Vec<u8>> {
        if !is_parquet(data) {
            return Ok(data.to_vec());
        }

        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(data))?;
        let declared_dims = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|kvs| kvs.iter().find(|kv| kv.key == DIMENSIONS_KEY))
            .and_then(|kv| kv.value.as_deref())
            .map(|v| {
                v.parse::<usize>().map_err(|_| {
                    TransformError::UnsupportedLayout(format!("dimensions value {v:?} is not a count"))
                })
            })
            .transpose()?;
        let reader = builder.build()?;

        let mut out = Vec::new();
        let mut floats = 0usize;
        for batch in reader {
            let batch = batch?;
            if batch.num_columns() != 1 {
                return Err(TransformError::UnsupportedLayout(format!(
                    "expected one column, found {}",
                    batch.num_columns()
                )));
            }
            let column = batch.column(0);
            match column.data_type() {
                DataType::Float32 => {
                    let values = column
                        .as_any()
                        .downcast_ref::<Float32Array>()
                        .ok_or_else(|| TransformError::UnsupportedLayout("float column".into()))?;
                    floats += values.len();
                    for v in values.values().iter() {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
                DataType::Binary => {
                    let values = column
                        .as_any()
                        .downcast_ref::<BinaryArray>()
                        .ok_or_else(|| TransformError::UnsupportedLayout("binary column".into()))?;
                    for i in 0..values.len() {
                        out.extend_from_slice(values.value(i));
                    }
                }
                other => {
                    return Err(TransformError::UnsupportedLayout(format!(
                        "column type {other} is not supported"
                    )))
                }
            }
        }

        if let Some(expected) = declared_dims {
            if expected != floats {
                return Err(TransformError::DimensionMismatch {
                    expected,
                    actual: floats,
                });
            }
        }
        Ok(out)
    }
}
