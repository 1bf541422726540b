use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Per-object `key=value` metadata stored next to an object as `<hash>.meta`.
///
/// `provider=` is accepted as an older spelling of `model=`. Keys this type
/// does not know are kept in `extra` and written back unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub source_file: Option<String>,
    pub timestamp: Option<i64>,
    pub file_type: Option<String>,
    pub model: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Parse the text of a `.meta` file. `path` is only used in errors.
    pub fn parse(path: &Path, text: &str) -> StoreResult<Self> {
        let mut meta = Self::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| StoreError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: "expected key=value".into(),
            })?;
            let value = value.trim().to_string();
            match key.trim() {
                "source_file" => meta.source_file = Some(value),
                "timestamp" => {
                    let ts = value.parse::<i64>().map_err(|_| StoreError::Parse {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        reason: format!("timestamp {value:?} is not an integer"),
                    })?;
                    meta.timestamp = Some(ts);
                }
                "file_type" => meta.file_type = Some(value),
                "model" => meta.model = Some(value),
                "provider" => {
                    meta.model.get_or_insert(value);
                }
                other => {
                    meta.extra.insert(other.to_string(), value);
                }
            }
        }
        Ok(meta)
    }

    /// Render as `key=value` lines.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut push = |key: &str, value: &str| {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        };
        if let Some(v) = &self.source_file {
            push("source_file", v);
        }
        if let Some(v) = self.timestamp {
            push("timestamp", &v.to_string());
        }
        if let Some(v) = &self.file_type {
            push("file_type", v);
        }
        if let Some(v) = &self.model {
            push("model", v);
        }
        for (k, v) in &self.extra {
            push(k, v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> StoreResult<ObjectMeta> {
        ObjectMeta::parse(Path::new("x.meta"), text)
    }

    #[test]
    fn parses_known_keys() {
        let meta = parse("source_file=docs/a.txt\ntimestamp=1700000000\nfile_type=npy\nmodel=openai-3\n").unwrap();
        assert_eq!(meta.source_file.as_deref(), Some("docs/a.txt"));
        assert_eq!(meta.timestamp, Some(1_700_000_000));
        assert_eq!(meta.file_type.as_deref(), Some("npy"));
        assert_eq!(meta.model.as_deref(), Some("openai-3"));
    }

    #[test]
    fn provider_is_an_alias_for_model() {
        let meta = parse("provider=voyage\n").unwrap();
        assert_eq!(meta.model.as_deref(), Some("voyage"));
    }

    #[test]
    fn model_wins_over_provider() {
        let meta = parse("model=a\nprovider=b\n").unwrap();
        assert_eq!(meta.model.as_deref(), Some("a"));
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let meta = parse("dims=1536\n").unwrap();
        assert_eq!(meta.extra.get("dims").map(String::as_str), Some("1536"));
        assert!(meta.to_text().contains("dims=1536\n"));
    }

    #[test]
    fn bad_timestamp_reports_line() {
        let err = parse("model=a\ntimestamp=soon\n").unwrap_err();
        assert!(matches!(err, StoreError::Parse { line: 2, .. }));
    }

    #[test]
    fn missing_equals_is_an_error() {
        assert!(parse("garbage\n").is_err());
    }

    #[test]
    fn text_roundtrip() {
        let meta = ObjectMeta {
            source_file: Some("a.txt".into()),
            timestamp: Some(42),
            file_type: None,
            model: Some("m".into()),
            extra: BTreeMap::new(),
        };
        assert_eq!(parse(&meta.to_text()).unwrap(), meta);
    }
}
