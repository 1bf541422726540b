use std::collections::{BTreeMap, HashMap};

use embr_store::{LogEntry, SetFiles, StoreResult};
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// One pushed object as listed in the remote metadata document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub hash: String,
    /// Source path recorded when the embedding was stored.
    pub path: String,
    pub created: i64,
    #[serde(default)]
    pub model: Option<String>,
    /// Document format when it differs from, or predates, the set-wide one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIndexEntry {
    pub hash: String,
    pub path: String,
}

/// Snapshot of a set written next to its documents as `metadata.json`.
///
/// Every push replaces the whole document; concurrent pushers overwrite
/// each other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    /// Encoding of the most recently pushed document (`parquet`, `json`, or
    /// `raw`); objects carrying their own `format` override it.
    #[serde(default = "default_format")]
    pub format: String,
    pub timestamp: i64,
    /// Bytes of the most recently uploaded document.
    pub size: u64,
    pub set: String,
    #[serde(default)]
    pub objects: Vec<RemoteObject>,
    /// Every log line of the set in order, repeats included.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<RemoteObject>,
    #[serde(default)]
    pub index: Vec<RemoteIndexEntry>,
    #[serde(default)]
    pub refs: BTreeMap<String, String>,
    pub head: String,
}

fn default_format() -> String {
    "parquet".into()
}

impl RemoteMetadata {
    /// Build the document from the local bookkeeping of `set`.
    ///
    /// Objects come from the log in order, one entry per hash (the latest
    /// log line wins).
    pub fn from_set(set: &SetFiles, head: &str, size: u64, format: &str) -> StoreResult<Self> {
        let mut objects: Vec<RemoteObject> = Vec::new();
        let mut log = Vec::new();
        for entry in set.read_log()? {
            let object = RemoteObject {
                hash: entry.hash().to_hex(),
                path: entry.source().to_string(),
                created: entry.timestamp(),
                model: match &entry {
                    LogEntry::Current { model, .. } => Some(model.clone()),
                    LogEntry::Legacy { .. } => None,
                },
                format: None,
            };
            objects.retain(|o| o.hash != object.hash);
            objects.push(object.clone());
            log.push(object);
        }
        let index = set
            .read_index()?
            .into_iter()
            .map(|e| RemoteIndexEntry {
                hash: e.hash.to_hex(),
                path: e.source,
            })
            .collect();
        let refs = set
            .read_model_refs()?
            .into_iter()
            .map(|(model, hash)| (model, hash.to_hex()))
            .collect();

        Ok(Self {
            format: format.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            size,
            set: set.name().to_string(),
            objects,
            log,
            index,
            refs,
            head: head.to_string(),
        })
    }

    /// Document for a push made outside any local repository.
    pub fn single(set: &str, hash: &str, size: u64, format: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            format: format.to_string(),
            timestamp: now,
            size,
            set: set.to_string(),
            objects: vec![RemoteObject {
                hash: hash.to_string(),
                path: String::new(),
                created: now,
                model: None,
                format: Some(format.to_string()),
            }],
            log: Vec::new(),
            index: Vec::new(),
            refs: BTreeMap::new(),
            head: set.to_string(),
        }
    }

    /// Make sure `hash` is listed, appending a bare entry if the log lacks it.
    pub fn ensure_object(&mut self, hash: &str) {
        if !self.objects.iter().any(|o| o.hash == hash) {
            self.objects.push(RemoteObject {
                hash: hash.to_string(),
                path: String::new(),
                created: self.timestamp,
                model: None,
                format: None,
            });
        }
    }

    /// Attach the known document format to each listed object.
    pub fn record_formats(&mut self, formats: &HashMap<String, String>) {
        for object in &mut self.objects {
            if let Some(format) = formats.get(&object.hash) {
                object.format = Some(format.clone());
            }
        }
    }

    /// Log lines to replay: the full log when present, else one line per
    /// object.
    pub fn history(&self) -> &[RemoteObject] {
        if self.log.is_empty() {
            &self.objects
        } else {
            &self.log
        }
    }

    /// Format of the document stored for `object`.
    pub fn format_of<'a>(&'a self, object: &'a RemoteObject) -> &'a str {
        object.format.as_deref().unwrap_or(&self.format)
    }

    pub fn to_json(&self) -> TransportResult<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| TransportError::InvalidData(format!("metadata encoding failed: {e}")))
    }

    pub fn from_json(bytes: &[u8]) -> TransportResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(TransportError::InvalidData("Downloaded metadata is empty".into()));
        }
        serde_json::from_slice(bytes)
            .map_err(|e| TransportError::InvalidData(format!("metadata is not valid JSON: {e}")))
    }
}
