//! Per-set bookkeeping files under `.eb/sets/<set>/`.
//!
//! ```text
//! log                 append-only, one line per store:
//!                     "<ts> <hash> <source> <model>"   (older lines omit <model>)
//! index               one line per source: "<hash> <source>"
//! refs/models/<name>  latest hash stored for that model
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use embr_types::ObjectId;
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};
use crate::names::validate_model_name;

/// One line of a set log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEntry {
    /// Three-field line written before models were tracked.
    Legacy {
        timestamp: i64,
        hash: ObjectId,
        source: String,
    },
    Current {
        timestamp: i64,
        hash: ObjectId,
        source: String,
        model: String,
    },
}

impl LogEntry {
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Legacy { timestamp, .. } | Self::Current { timestamp, .. } => *timestamp,
        }
    }

    pub fn hash(&self) -> &ObjectId {
        match self {
            Self::Legacy { hash, .. } | Self::Current { hash, .. } => hash,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Legacy { source, .. } | Self::Current { source, .. } => source,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Legacy { .. } => None,
            Self::Current { model, .. } => Some(model),
        }
    }

    /// Parse a single log line. Returns the failure reason on error.
    pub fn parse(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (ts, hash, source, model) = match fields.as_slice() {
            [ts, hash, source] => (ts, hash, source, None),
            [ts, hash, source, model] => (ts, hash, source, Some(model)),
            _ => return Err(format!("expected 3 or 4 fields, found {}", fields.len())),
        };
        let timestamp = ts
            .parse::<i64>()
            .map_err(|_| format!("timestamp {ts:?} is not an integer"))?;
        let hash = ObjectId::from_hex(hash).map_err(|e| e.to_string())?;
        let source = source.to_string();
        Ok(match model {
            None => Self::Legacy {
                timestamp,
                hash,
                source,
            },
            Some(model) => Self::Current {
                timestamp,
                hash,
                source,
                model: model.to_string(),
            },
        })
    }

    pub fn to_line(&self) -> String {
        match self {
            Self::Legacy {
                timestamp,
                hash,
                source,
            } => format!("{timestamp} {hash} {source}"),
            Self::Current {
                timestamp,
                hash,
                source,
                model,
            } => format!("{timestamp} {hash} {source} {model}"),
        }
    }
}

/// One line of a set index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: ObjectId,
    pub source: String,
}

impl IndexEntry {
    pub fn parse(line: &str) -> Result<Self, String> {
        let (hash, source) = line
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| "expected \"<hash> <source>\"".to_string())?;
        Ok(Self {
            hash: ObjectId::from_hex(hash).map_err(|e| e.to_string())?,
            source: source.trim().to_string(),
        })
    }

    pub fn to_line(&self) -> String {
        format!("{} {}", self.hash, self.source)
    }
}

/// Handle on the bookkeeping files of one set.
#[derive(Clone, Debug)]
pub struct SetFiles {
    name: String,
    dir: PathBuf,
}

impl SetFiles {
    /// `dir` is `.eb/sets/<name>`; it is not created until something is
    /// written.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join("log")
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join("index")
    }

    pub fn model_refs_dir(&self) -> PathBuf {
        self.dir.join("refs").join("models")
    }

    /// Create the set directory and its `refs/models` subdirectory.
    pub fn create(&self) -> StoreResult<()> {
        fs::create_dir_all(self.model_refs_dir())?;
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// All log entries in file order. A missing log reads as empty.
    pub fn read_log(&self) -> StoreResult<Vec<LogEntry>> {
        parse_lines(&self.log_path(), LogEntry::parse)
    }

    pub fn append_log(&self, entry: &LogEntry) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        writeln!(file, "{}", entry.to_line())?;
        Ok(())
    }

    /// Replace the whole log atomically.
    pub fn write_log(&self, entries: &[LogEntry]) -> StoreResult<()> {
        let mut text = String::new();
        for entry in entries {
            text.push_str(&entry.to_line());
            text.push('\n');
        }
        write_atomic(&self.dir, &self.log_path(), text.as_bytes())
    }

    pub fn read_index(&self) -> StoreResult<Vec<IndexEntry>> {
        parse_lines(&self.index_path(), IndexEntry::parse)
    }

    /// Replace the whole index atomically.
    pub fn write_index(&self, entries: &[IndexEntry]) -> StoreResult<()> {
        let mut text = String::new();
        for entry in entries {
            text.push_str(&entry.to_line());
            text.push('\n');
        }
        write_atomic(&self.dir, &self.index_path(), text.as_bytes())
    }

    /// Point `source` at `hash`, replacing any existing entry for it.
    pub fn upsert_index(&self, hash: ObjectId, source: &str) -> StoreResult<()> {
        let mut entries = self.read_index()?;
        entries.retain(|e| e.source != source);
        entries.push(IndexEntry {
            hash,
            source: source.to_string(),
        });
        self.write_index(&entries)
    }

    /// Model name to hash, for every readable ref file.
    pub fn read_model_refs(&self) -> StoreResult<BTreeMap<String, ObjectId>> {
        let mut refs = BTreeMap::new();
        let dir = self.model_refs_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(refs),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            let text = fs::read_to_string(&path)?;
            let first = text
                .lines()
                .next()
                .and_then(|l| l.split_whitespace().next())
                .ok_or_else(|| StoreError::Parse {
                    path: path.clone(),
                    line: 1,
                    reason: "empty model ref".into(),
                })?;
            let hash = ObjectId::from_hex(first).map_err(|e| StoreError::Parse {
                path: path.clone(),
                line: 1,
                reason: e.to_string(),
            })?;
            refs.insert(name, hash);
        }
        Ok(refs)
    }

    pub fn write_model_ref(&self, model: &str, hash: &ObjectId) -> StoreResult<()> {
        validate_model_name(model)?;
        let dir = self.model_refs_dir();
        write_atomic(&dir, &dir.join(model), format!("{hash}\n").as_bytes())
    }

    /// Delete the ref for `model`. Returns `true` if it existed.
    pub fn remove_model_ref(&self, model: &str) -> StoreResult<bool> {
        validate_model_name(model)?;
        match fs::remove_file(self.model_refs_dir().join(model)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace log, index, and model refs wholesale.
    pub fn replace_all(
        &self,
        log: &[LogEntry],
        index: &[IndexEntry],
        refs: &BTreeMap<String, ObjectId>,
    ) -> StoreResult<()> {
        self.write_log(log)?;
        self.write_index(index)?;
        for (model, hash) in refs {
            self.write_model_ref(model, hash)?;
        }
        Ok(())
    }
}

fn parse_lines<T>(path: &Path, parse: impl Fn(&str) -> Result<T, String>) -> StoreResult<Vec<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            parse(line).map_err(|reason| StoreError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                reason,
            })
        })
        .collect()
}

fn write_atomic(dir: &Path, dest: &Path, bytes: &[u8]) -> StoreResult<()> {
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
