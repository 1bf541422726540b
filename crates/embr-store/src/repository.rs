use std::fs;
use std::io::ErrorKind;

use embr_types::{npy, ObjectId, ObjectType};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::fs::FsObjectStore;
use crate::meta::ObjectMeta;
use crate::names::validate_set_name;
use crate::repo::RepoContext;
use crate::set::{IndexEntry, LogEntry, SetFiles};
use crate::traits::ObjectStore;

/// Set used when `HEAD` is absent or empty.
pub const DEFAULT_SET: &str = "main";

/// Outcome of [`Repository::store_embedding`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEmbedding {
    pub id: ObjectId,
    pub set: String,
    pub timestamp: i64,
    /// Number of float32 values in the stored vector.
    pub dimensions: usize,
}

/// Options for [`Repository::remove_source`].
#[derive(Clone, Debug, Default)]
pub struct RemoveOptions {
    /// Only remove the entry if its embedding was made by this model.
    pub model: Option<String>,
    /// Only untrack the source; keep object files and log entries.
    pub cached: bool,
}

/// Outcome of [`Repository::remove_source`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemovedSource {
    /// Objects whose index entries were removed.
    pub untracked: Vec<ObjectId>,
    /// Objects deleted from the store because nothing else refers to them.
    pub deleted: Vec<ObjectId>,
}

/// An on-disk repository: object store plus set bookkeeping.
#[derive(Clone, Debug)]
pub struct Repository {
    ctx: RepoContext,
    store: FsObjectStore,
}

impl Repository {
    /// Open an existing repository.
    pub fn open(ctx: RepoContext) -> StoreResult<Self> {
        if !ctx.eb_dir().is_dir() {
            return Err(StoreError::InvalidRepository(ctx.root().to_path_buf()));
        }
        let store = FsObjectStore::open(ctx.objects_dir())?;
        Ok(Self { ctx, store })
    }

    /// Create (or reopen) a repository rooted at `root`.
    pub fn init(root: impl Into<std::path::PathBuf>) -> StoreResult<Self> {
        let ctx = RepoContext::init(root)?;
        let repo = Self::open(ctx)?;
        if !repo.ctx.head_path().exists() {
            repo.set_head(DEFAULT_SET)?;
        }
        Ok(repo)
    }

    pub fn context(&self) -> &RepoContext {
        &self.ctx
    }

    pub fn store(&self) -> &FsObjectStore {
        &self.store
    }

    // ---- Sets ----

    /// Name of the current set.
    pub fn head(&self) -> StoreResult<String> {
        match fs::read_to_string(self.ctx.head_path()) {
            Ok(text) => {
                let name = text.trim();
                Ok(if name.is_empty() {
                    DEFAULT_SET.to_string()
                } else {
                    name.to_string()
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DEFAULT_SET.to_string()),
            Err(e) => Err(e.into()),
        }
    }

    /// Switch the current set, creating it if needed.
    pub fn set_head(&self, name: &str) -> StoreResult<()> {
        validate_set_name(name)?;
        self.set(name)?.create()?;
        fs::write(self.ctx.head_path(), format!("{name}\n"))?;
        info!(set = name, "switched set");
        Ok(())
    }

    pub fn set(&self, name: &str) -> StoreResult<SetFiles> {
        validate_set_name(name)?;
        Ok(SetFiles::new(name, self.ctx.set_dir(name)))
    }

    pub fn current_set(&self) -> StoreResult<SetFiles> {
        self.set(&self.head()?)
    }

    /// Names of every set directory, sorted.
    pub fn list_sets(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        let entries = match fs::read_dir(self.ctx.sets_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    // ---- Content ----

    /// Store an embedding in the current set.
    ///
    /// `data` is either a float32 `.npy` file or raw little-endian float32
    /// bytes. Writes the object and its metadata, appends the set log,
    /// points the index entry for `source` at the new object, and moves
    /// the model ref.
    pub fn store_embedding(
        &self,
        data: &[u8],
        source: &str,
        model: &str,
    ) -> StoreResult<StoredEmbedding> {
        crate::names::validate_source_path(source)?;
        crate::names::validate_model_name(model)?;

        let (payload, file_type) = match npy::parse_npy(data)? {
            Some(view) => (view.data.to_vec(), "npy"),
            None => (data.to_vec(), "bin"),
        };
        if payload.is_empty() || payload.len() % 4 != 0 {
            return Err(StoreError::InvalidParameter(format!(
                "embedding of {} bytes is not a whole number of float32 values",
                payload.len()
            )));
        }

        let set = self.current_set()?;
        let timestamp = chrono::Utc::now().timestamp();
        let id = self.store.write_object(&payload, ObjectType::Vector)?;
        self.store.write_meta(
            &id,
            &ObjectMeta {
                source_file: Some(source.to_string()),
                timestamp: Some(timestamp),
                file_type: Some(file_type.to_string()),
                model: Some(model.to_string()),
                ..Default::default()
            },
        )?;
        set.append_log(&LogEntry::Current {
            timestamp,
            hash: id,
            source: source.to_string(),
            model: model.to_string(),
        })?;
        set.upsert_index(id, source)?;
        set.write_model_ref(model, &id)?;

        debug!(object = %id.short_hex(), set = set.name(), source, model, "stored embedding");
        Ok(StoredEmbedding {
            id,
            set: set.name().to_string(),
            timestamp,
            dimensions: payload.len() / 4,
        })
    }

    /// Stop tracking `source` in `set_name`.
    ///
    /// Removes its index entry and any model ref pointing at that object.
    /// Unless `cached`, the object's log entries are dropped as well and the
    /// object is deleted once no set refers to it anymore.
    pub fn remove_source(
        &self,
        set_name: &str,
        source: &str,
        options: &RemoveOptions,
    ) -> StoreResult<RemovedSource> {
        let set = self.set(set_name)?;
        let index = set.read_index()?;
        if !index.iter().any(|e| e.source == source) {
            return Err(StoreError::NotFound(format!(
                "{source} is not tracked in set {set_name}"
            )));
        }
        let log = set.read_log()?;

        let mut removed = RemovedSource::default();
        let mut kept: Vec<IndexEntry> = Vec::with_capacity(index.len());
        for entry in index {
            if entry.source == source && self.made_by(&entry.hash, &log, options.model.as_deref())? {
                removed.untracked.push(entry.hash);
            } else {
                kept.push(entry);
            }
        }
        if removed.untracked.is_empty() {
            warn!(set = set_name, source, model = ?options.model, "no matching embeddings to remove");
            return Ok(removed);
        }
        set.write_index(&kept)?;
        for (model, hash) in set.read_model_refs()? {
            if removed.untracked.contains(&hash) && !kept.iter().any(|e| e.hash == hash) {
                set.remove_model_ref(&model)?;
            }
        }

        if !options.cached {
            let still_indexed = |id: &ObjectId| kept.iter().any(|e| e.hash == *id);
            let log: Vec<LogEntry> = log
                .into_iter()
                .filter(|e| !removed.untracked.contains(e.hash()) || still_indexed(e.hash()))
                .collect();
            set.write_log(&log)?;
            let reachable = self.reachable_objects()?;
            for id in &removed.untracked {
                if !reachable.contains(id) && self.store.delete(id)? {
                    removed.deleted.push(*id);
                }
            }
        }
        info!(
            set = set_name,
            source,
            untracked = removed.untracked.len(),
            deleted = removed.deleted.len(),
            "removed source"
        );
        Ok(removed)
    }

    /// Whether `id` was made by `model`, going by its metadata and then the
    /// set log. No model filter matches everything.
    fn made_by(&self, id: &ObjectId, log: &[LogEntry], model: Option<&str>) -> StoreResult<bool> {
        let Some(model) = model else {
            return Ok(true);
        };
        if let Some(recorded) = self.store.read_meta(id)?.and_then(|m| m.model) {
            return Ok(recorded == model);
        }
        Ok(log.iter().any(|e| e.hash() == id && e.model() == Some(model)))
    }

    /// Store a payload fetched from elsewhere, checking it hashes to `expected`.
    pub fn import_object(&self, payload: &[u8], expected: &ObjectId) -> StoreResult<()> {
        let computed = ObjectId::from_bytes(payload);
        if computed != *expected {
            return Err(StoreError::HashMismatch {
                id: *expected,
                computed,
            });
        }
        self.store.write_object(payload, ObjectType::Vector)?;
        Ok(())
    }

    pub fn resolve(&self, prefix: &str) -> StoreResult<ObjectId> {
        self.store.resolve_hash(prefix)
    }

    pub fn read(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        self.store.read_object(id)
    }

    pub fn meta(&self, id: &ObjectId) -> StoreResult<Option<ObjectMeta>> {
        self.store.read_meta(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embr_types::Status;
    use tempfile::TempDir;

    fn repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn vector(seed: f32, n: usize) -> Vec<u8> {
        (0..n).flat_map(|i| (seed + i as f32).to_le_bytes()).collect()
    }

    // ----- Sets -----

    #[test]
    fn new_repository_is_on_main() {
        let (_d, repo) = repo();
        assert_eq!(repo.head().unwrap(), "main");
        assert_eq!(repo.list_sets().unwrap(), vec!["main"]);
    }

    #[test]
    fn switching_sets_creates_them() {
        let (_d, repo) = repo();
        repo.set_head("research").unwrap();
        assert_eq!(repo.head().unwrap(), "research");
        assert_eq!(repo.list_sets().unwrap(), vec!["main", "research"]);
    }

    #[test]
    fn empty_head_means_main() {
        let (_d, repo) = repo();
        fs::write(repo.context().head_path(), "\n").unwrap();
        assert_eq!(repo.head().unwrap(), DEFAULT_SET);
    }

    #[test]
    fn invalid_set_name_is_rejected() {
        let (_d, repo) = repo();
        assert!(repo.set_head("../x").is_err());
    }

    #[test]
    fn open_requires_reserved_dir() {
        let dir = TempDir::new().unwrap();
        let err = Repository::open(RepoContext::new(dir.path())).unwrap_err();
        assert_eq!(err.status(), Status::InvalidRepository);
    }

    // ----- Storing -----

    #[test]
    fn store_embedding_updates_every_file() {
        let (_d, repo) = repo();
        let data = vector(0.5, 8);
        let stored = repo.store_embedding(&data, "docs/a.txt", "openai-3").unwrap();
        assert_eq!(stored.set, "main");
        assert_eq!(stored.dimensions, 8);
        assert_eq!(repo.read(&stored.id).unwrap(), data);

        let meta = repo.meta(&stored.id).unwrap().unwrap();
        assert_eq!(meta.source_file.as_deref(), Some("docs/a.txt"));
        assert_eq!(meta.model.as_deref(), Some("openai-3"));
        assert_eq!(meta.file_type.as_deref(), Some("bin"));

        let set = repo.current_set().unwrap();
        let log = set.read_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].model(), Some("openai-3"));
        assert_eq!(set.read_index().unwrap()[0].hash, stored.id);
        assert_eq!(set.read_model_refs().unwrap()["openai-3"], stored.id);
    }

    #[test]
    fn restoring_a_source_replaces_its_index_entry() {
        let (_d, repo) = repo();
        repo.store_embedding(&vector(1.0, 4), "a.txt", "m").unwrap();
        let second = repo.store_embedding(&vector(2.0, 4), "a.txt", "m").unwrap();
        let set = repo.current_set().unwrap();
        assert_eq!(set.read_log().unwrap().len(), 2);
        let index = set.read_index().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].hash, second.id);
    }

    #[test]
    fn npy_input_is_unwrapped() {
        let (_d, repo) = repo();
        let values = [1.0f32, 2.0, 3.0];
        let stored = repo
            .store_embedding(&npy::encode_npy(&values), "v.npy", "m")
            .unwrap();
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(stored.id, ObjectId::from_bytes(&raw));
        assert_eq!(repo.meta(&stored.id).unwrap().unwrap().file_type.as_deref(), Some("npy"));
    }

    #[test]
    fn stores_into_the_current_set() {
        let (_d, repo) = repo();
        repo.set_head("other").unwrap();
        let stored = repo.store_embedding(&vector(3.0, 4), "b.txt", "m").unwrap();
        assert_eq!(stored.set, "other");
        assert!(repo.set("main").unwrap().read_log().unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_inputs() {
        let (_d, repo) = repo();
        assert_eq!(
            repo.store_embedding(b"", "a", "m").unwrap_err().status(),
            Status::InvalidParameter
        );
        assert!(repo.store_embedding(b"abc", "a", "m").is_err());
        assert!(repo.store_embedding(&vector(0.0, 2), "has space", "m").is_err());
        assert!(repo.store_embedding(&vector(0.0, 2), "a", "").is_err());
    }

    // ----- Removing -----

    #[test]
    fn remove_source_untracks_and_deletes() {
        let (_d, repo) = repo();
        let a = repo.store_embedding(&vector(1.0, 4), "a.txt", "m1").unwrap();
        let b = repo.store_embedding(&vector(2.0, 4), "b.txt", "m2").unwrap();

        let removed = repo.remove_source("main", "a.txt", &RemoveOptions::default()).unwrap();
        assert_eq!(removed.untracked, vec![a.id]);
        assert_eq!(removed.deleted, vec![a.id]);
        assert!(!repo.store().exists(&a.id).unwrap());

        let set = repo.current_set().unwrap();
        let index = set.read_index().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].hash, b.id);
        let refs = set.read_model_refs().unwrap();
        assert!(!refs.contains_key("m1"));
        assert_eq!(refs["m2"], b.id);
        let log = set.read_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(*log[0].hash(), b.id);
    }

    #[test]
    fn cached_remove_keeps_object_and_log() {
        let (_d, repo) = repo();
        let a = repo.store_embedding(&vector(1.0, 4), "a.txt", "m").unwrap();
        let options = RemoveOptions {
            cached: true,
            ..Default::default()
        };
        let removed = repo.remove_source("main", "a.txt", &options).unwrap();
        assert_eq!(removed.untracked, vec![a.id]);
        assert!(removed.deleted.is_empty());
        assert!(repo.store().exists(&a.id).unwrap());

        let set = repo.current_set().unwrap();
        assert!(set.read_index().unwrap().is_empty());
        assert_eq!(set.read_log().unwrap().len(), 1);
    }

    #[test]
    fn remove_filters_by_model() {
        let (_d, repo) = repo();
        let a = repo.store_embedding(&vector(1.0, 4), "a.txt", "openai-3").unwrap();
        let options = RemoveOptions {
            model: Some("voyage".into()),
            ..Default::default()
        };
        let removed = repo.remove_source("main", "a.txt", &options).unwrap();
        assert_eq!(removed, RemovedSource::default());
        assert_eq!(repo.current_set().unwrap().read_index().unwrap().len(), 1);

        let options = RemoveOptions {
            model: Some("openai-3".into()),
            ..Default::default()
        };
        let removed = repo.remove_source("main", "a.txt", &options).unwrap();
        assert_eq!(removed.untracked, vec![a.id]);
    }

    #[test]
    fn shared_objects_survive_removal() {
        let (_d, repo) = repo();
        let a = repo.store_embedding(&vector(1.0, 4), "a.txt", "m").unwrap();
        repo.store_embedding(&vector(1.0, 4), "copy.txt", "m").unwrap();
        let removed = repo.remove_source("main", "a.txt", &RemoveOptions::default()).unwrap();
        assert!(removed.deleted.is_empty());
        assert!(repo.store().exists(&a.id).unwrap());

        let set = repo.current_set().unwrap();
        assert_eq!(set.read_model_refs().unwrap()["m"], a.id);
        assert_eq!(set.read_log().unwrap().len(), 2);
    }

    #[test]
    fn removing_an_untracked_source_fails() {
        let (_d, repo) = repo();
        let err = repo
            .remove_source("main", "nope.txt", &RemoveOptions::default())
            .unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }

    #[test]
    fn resolve_by_prefix() {
        let (_d, repo) = repo();
        let stored = repo.store_embedding(&vector(4.0, 4), "c.txt", "m").unwrap();
        assert_eq!(repo.resolve(&stored.id.to_hex()[..8]).unwrap(), stored.id);
    }

    #[test]
    fn import_checks_digest() {
        let (_d, repo) = repo();
        let data = vector(5.0, 4);
        let wrong = ObjectId::from_bytes(b"other");
        let err = repo.import_object(&data, &wrong).unwrap_err();
        assert_eq!(err.status(), Status::HashMismatch);
        repo.import_object(&data, &ObjectId::from_bytes(&data)).unwrap();
        assert!(repo.store().exists(&ObjectId::from_bytes(&data)).unwrap());
    }
}
