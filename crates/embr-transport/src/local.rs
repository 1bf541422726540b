use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use embr_store::repo::{ALT_REPO_DIR, REPO_DIR};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::backend::{Backend, TransferOptions};
use crate::error::{TransportError, TransportResult};
use crate::url::{local_path, TransportKind};

/// Transport to a repository on the local filesystem.
///
/// Sent payloads land in `<reserved>/objects/` under a time-derived name.
/// Receiving streams those files back oldest first, one file per run of
/// calls: a call returning `Ok(0)` marks the end of the current file and the
/// next call moves on. No locking is done; concurrent writers to the same
/// repository can race.
#[derive(Debug)]
pub struct LocalTransport {
    path: PathBuf,
    reserved: Option<PathBuf>,
    reading: Option<(PathBuf, File)>,
    consumed: HashSet<PathBuf>,
}

impl LocalTransport {
    pub fn new(url: &str) -> Self {
        Self {
            path: PathBuf::from(local_path(url)),
            reserved: None,
            reading: None,
            consumed: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reserved(&self) -> TransportResult<&Path> {
        self.reserved.as_deref().ok_or(TransportError::NotConnected)
    }

    fn objects_dir(&self) -> TransportResult<PathBuf> {
        Ok(self.reserved()?.join("objects"))
    }

    /// Oldest unread regular file in the objects directory.
    fn next_unread(&self) -> TransportResult<Option<PathBuf>> {
        let entries = match fs::read_dir(self.objects_dir()?) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut oldest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() || entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            if self.consumed.contains(&path) {
                continue;
            }
            let mtime = meta.modified()?;
            let older = match &oldest {
                None => true,
                Some((t, p)) => (mtime, &path) < (*t, p),
            };
            if older {
                oldest = Some((mtime, path));
            }
        }
        Ok(oldest.map(|(_, path)| path))
    }
}

fn unique_name() -> String {
    let now = chrono::Utc::now();
    format!("{}{:09}", now.timestamp(), now.timestamp_subsec_nanos())
}

fn validate_ref_name(name: &str) -> TransportResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(TransportError::InvalidParameter(format!(
            "invalid ref name: {name:?}"
        )));
    }
    Ok(())
}

impl Backend for LocalTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    fn connect(&mut self) -> TransportResult<()> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TransportError::NotFound(format!(
                    "Path does not exist: {}",
                    self.path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            return Err(TransportError::InvalidParameter(format!(
                "Path is not a directory: {}",
                self.path.display()
            )));
        }
        let reserved = [REPO_DIR, ALT_REPO_DIR]
            .into_iter()
            .map(|name| self.path.join(name))
            .find(|p| p.is_dir())
            .ok_or_else(|| {
                TransportError::InvalidRepository(format!(
                    "Not a valid EB repository: {}",
                    self.path.display()
                ))
            })?;
        debug!(path = %self.path.display(), reserved = %reserved.display(), "local transport connected");
        self.reserved = Some(reserved);
        Ok(())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        self.reading = None;
        self.consumed.clear();
        self.reserved = None;
        Ok(())
    }

    fn send_data(&mut self, data: &[u8], hash: &str, _opts: &TransferOptions) -> TransportResult<()> {
        let reserved = self.reserved()?.to_path_buf();
        let tmp_dir = reserved.join("tmp");
        fs::create_dir_all(&tmp_dir)?;
        let mut staged = NamedTempFile::new_in(&tmp_dir)?;
        staged.write_all(data)?;
        staged.flush()?;

        let objects = reserved.join("objects");
        fs::create_dir_all(&objects)?;
        let dest = objects.join(unique_name());
        staged.persist(&dest).map_err(|e| TransportError::Io(e.error))?;
        info!(hash, bytes = data.len(), dest = %dest.display(), "sent object to local repository");
        Ok(())
    }

    fn receive_data(&mut self, buf: &mut [u8], _opts: &TransferOptions) -> TransportResult<usize> {
        if self.reading.is_none() {
            let Some(path) = self.next_unread()? else {
                return Ok(0);
            };
            let file = File::open(&path)?;
            debug!(file = %path.display(), "receiving local object");
            self.reading = Some((path, file));
        }
        let Some((path, file)) = self.reading.as_mut() else {
            return Ok(0);
        };
        let n = file.read(buf)?;
        if n == 0 {
            let path = path.clone();
            self.reading = None;
            self.consumed.insert(path);
        }
        Ok(n)
    }

    fn list_refs(&mut self, _opts: &TransferOptions) -> TransportResult<Vec<String>> {
        let refs_dir = self.reserved()?.join("refs");
        let entries = match fs::read_dir(&refs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut refs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            let text = fs::read_to_string(entry.path())?;
            if let Some(hash) = text.lines().next().map(str::trim).filter(|h| !h.is_empty()) {
                refs.push(format!("{hash} {name}"));
            }
        }
        refs.sort();
        Ok(refs)
    }

    fn delete_refs(&mut self, refs: &[String], _opts: &TransferOptions) -> TransportResult<()> {
        let objects = self.objects_dir()?;
        for name in refs {
            validate_ref_name(name)?;
            match fs::remove_file(objects.join(name)) {
                Ok(()) => debug!(name = %name, "deleted local object"),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(TransportError::NotFound(format!("Object not found: {name}")))
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
