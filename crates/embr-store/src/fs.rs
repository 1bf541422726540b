use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use embr_types::{ObjectId, ObjectType, HASH_HEX_LEN};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::legacy;
use crate::meta::ObjectMeta;
use crate::object::{decode_object, encode_object, has_header_magic};
use crate::traits::ObjectStore;

const RAW_EXT: &str = "raw";
const META_EXT: &str = "meta";
const TEMP_DIR: &str = "temp";

/// Filesystem object store rooted at a repository's `objects/` directory.
///
/// Layout:
/// ```text
/// objects/<hash>.raw     header + payload (zstd for vectors)
/// objects/<hash>.meta    key=value metadata
/// objects/temp/          staging area for atomic writes
/// ```
/// Files named by a bare 64-hex hash (no extension) are read as objects too;
/// older repositories wrote them that way.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    dir: PathBuf,
}

impl FsObjectStore {
    /// Open a store over `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The objects directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn raw_path(&self, id: &ObjectId) -> PathBuf {
        self.dir.join(format!("{}.{RAW_EXT}", id.to_hex()))
    }

    pub fn meta_path(&self, id: &ObjectId) -> PathBuf {
        self.dir.join(format!("{}.{META_EXT}", id.to_hex()))
    }

    fn bare_path(&self, id: &ObjectId) -> PathBuf {
        self.dir.join(id.to_hex())
    }

    /// The file holding an object, if any.
    pub fn object_path(&self, id: &ObjectId) -> Option<PathBuf> {
        [self.raw_path(id), self.bare_path(id)]
            .into_iter()
            .find(|p| p.is_file())
    }

    /// Write the `.meta` file for an object, replacing any previous one.
    pub fn write_meta(&self, id: &ObjectId, meta: &ObjectMeta) -> StoreResult<()> {
        self.write_atomic(&self.meta_path(id), meta.to_text().as_bytes())
    }

    /// Read the `.meta` file for an object, if present.
    pub fn read_meta(&self, id: &ObjectId) -> StoreResult<Option<ObjectMeta>> {
        let path = self.meta_path(id);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(ObjectMeta::parse(&path, &text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write bytes to `dest` through a temp file in `objects/temp`.
    fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> StoreResult<()> {
        let temp_dir = self.dir.join(TEMP_DIR);
        fs::create_dir_all(&temp_dir)?;
        let mut tmp = NamedTempFile::new_in(&temp_dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn write_object(&self, data: &[u8], obj_type: ObjectType) -> StoreResult<ObjectId> {
        let (id, encoded) = encode_object(data, obj_type)?;
        let dest = self.raw_path(&id);
        if dest.exists() {
            debug!(object = %id.short_hex(), "object already stored");
            return Ok(id);
        }
        self.write_atomic(&dest, &encoded)?;
        debug!(object = %id.short_hex(), bytes = data.len(), "stored object");
        Ok(id)
    }

    fn read_object(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let path = self
            .object_path(id)
            .ok_or_else(|| StoreError::NotFound(id.to_hex()))?;
        let bytes = fs::read(&path)?;
        let name = id.to_hex();

        match decode_object(&name, &bytes) {
            Ok(decoded) => {
                if decoded.header.obj_type == ObjectType::Vector && decoded.header.hash != *id {
                    return Err(StoreError::HashMismatch {
                        id: *id,
                        computed: decoded.header.hash,
                    });
                }
                Ok(decoded.payload)
            }
            Err(err @ StoreError::HashMismatch { .. }) => Err(err),
            Err(structured) if has_header_magic(&bytes) => Err(structured),
            Err(structured) => {
                debug!(object = %id.short_hex(), error = %structured, "no structured header, trying legacy layouts");
                let (format, payload) = legacy::decode_legacy(&name, &bytes)?;
                // Older writers hashed either the float payload or the file as written.
                if ObjectId::from_bytes(&payload) != *id && ObjectId::from_bytes(&bytes) != *id {
                    debug!(object = %id.short_hex(), ?format, "legacy object does not hash to its name");
                    return Err(StoreError::HashMismatch {
                        id: *id,
                        computed: ObjectId::from_bytes(&payload),
                    });
                }
                Ok(payload)
            }
        }
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_some())
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let mut existed = false;
        for path in [self.raw_path(id), self.bare_path(id), self.meta_path(id)] {
            match fs::remove_file(&path) {
                Ok(()) => existed = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(existed)
    }

    fn object_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let mut ids = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let stem = name.strip_suffix(".raw").unwrap_or(name);
            if stem.len() != HASH_HEX_LEN {
                continue;
            }
            if let Ok(id) = ObjectId::from_hex(stem) {
                ids.insert(id);
            }
        }
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embr_types::{npy, Status, HEADER_LEN};
    use tempfile::TempDir;

    fn store() -> (TempDir, FsObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    fn floats(n: usize, seed: f32) -> Vec<u8> {
        (0..n).flat_map(|i| (seed + i as f32).to_le_bytes()).collect()
    }

    fn touch(store: &FsObjectStore, name: &str) {
        fs::write(store.dir().join(name), b"x").unwrap();
    }

    // ----- Write/read -----

    #[test]
    fn write_then_read() {
        let (_d, store) = store();
        let data = floats(128, 0.5);
        let id = store.write_object(&data, ObjectType::Vector).unwrap();
        assert!(store.raw_path(&id).is_file());
        assert_eq!(store.read_object(&id).unwrap(), data);
    }

    #[test]
    fn write_is_idempotent() {
        let (_d, store) = store();
        let data = floats(8, 1.0);
        let a = store.write_object(&data, ObjectType::Vector).unwrap();
        let b = store.write_object(&data, ObjectType::Vector).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.object_ids().unwrap(), vec![a]);
    }

    #[test]
    fn temp_dir_is_left_empty() {
        let (_d, store) = store();
        store.write_object(&floats(4, 0.0), ObjectType::Vector).unwrap();
        let leftovers = fs::read_dir(store.dir().join(TEMP_DIR)).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_d, store) = store();
        let err = store.read_object(&ObjectId::from_bytes(b"nope")).unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }

    #[test]
    fn bare_hash_file_is_read() {
        let (_d, store) = store();
        let data = floats(16, 2.0);
        let id = ObjectId::from_bytes(&data);
        fs::write(store.dir().join(id.to_hex()), &data).unwrap();
        assert!(store.exists(&id).unwrap());
        assert_eq!(store.read_object(&id).unwrap(), data);
    }

    #[test]
    fn legacy_npy_file_is_read() {
        let (_d, store) = store();
        let values = [0.1f32, 0.2, 0.3, 0.4];
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let id = ObjectId::from_bytes(&payload);
        fs::write(store.raw_path(&id), npy::encode_npy(&values)).unwrap();
        assert_eq!(store.read_object(&id).unwrap(), payload);
    }

    #[test]
    fn legacy_dimension_prefixed_file_is_read() {
        let (_d, store) = store();
        let body = floats(1536, 0.0);
        let id = ObjectId::from_bytes(&body);
        let mut file = 1536u32.to_le_bytes().to_vec();
        file.extend_from_slice(&body);
        fs::write(store.raw_path(&id), file).unwrap();
        assert_eq!(store.read_object(&id).unwrap(), body);
    }

    #[test]
    fn corrupt_structured_file_is_rejected() {
        let (_d, store) = store();
        let data = floats(32, 3.0);
        let id = store.write_object(&data, ObjectType::Vector).unwrap();
        let path = store.raw_path(&id);
        let mut bytes = fs::read(&path).unwrap();
        // Flip a hash byte inside the header.
        bytes[30] ^= 0x55;
        fs::write(&path, bytes).unwrap();
        let err = store.read_object(&id).unwrap_err();
        assert_eq!(err.status(), Status::HashMismatch);
    }

    #[test]
    fn truncated_structured_body_is_invalid_data() {
        let (_d, store) = store();
        let data = floats(256, 0.125);
        let id = store.write_object(&data, ObjectType::Vector).unwrap();
        let path = store.raw_path(&id);
        let bytes = fs::read(&path).unwrap();
        let cut = (bytes.len() - 8) / 4 * 4;
        fs::write(&path, &bytes[..cut]).unwrap();
        let err = store.read_object(&id).unwrap_err();
        assert_eq!(err.status(), Status::InvalidData);
    }

    #[test]
    fn structured_body_with_garbage_is_invalid_data() {
        let (_d, store) = store();
        let id = store.write_object(&floats(64, 1.5), ObjectType::Vector).unwrap();
        let path = store.raw_path(&id);
        let mut bytes = fs::read(&path).unwrap();
        for b in &mut bytes[HEADER_LEN..] {
            *b = 0xAB;
        }
        fs::write(&path, bytes).unwrap();
        let err = store.read_object(&id).unwrap_err();
        assert_eq!(err.status(), Status::InvalidData);
    }

    #[test]
    fn legacy_file_with_foreign_name_is_rejected() {
        let (_d, store) = store();
        let id = ObjectId::from_bytes(b"some other content");
        fs::write(store.raw_path(&id), floats(16, 4.0)).unwrap();
        let err = store.read_object(&id).unwrap_err();
        assert_eq!(err.status(), Status::HashMismatch);
    }

    #[test]
    fn unreadable_layout_is_invalid_data() {
        let (_d, store) = store();
        let id = ObjectId::from_bytes(b"odd");
        fs::write(store.raw_path(&id), b"abc").unwrap();
        let err = store.read_object(&id).unwrap_err();
        assert_eq!(err.status(), Status::InvalidData);
    }

    #[test]
    fn delete_removes_object_and_meta() {
        let (_d, store) = store();
        let id = store.write_object(&floats(4, 9.0), ObjectType::Vector).unwrap();
        store.write_meta(&id, &ObjectMeta::default()).unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.exists(&id).unwrap());
        assert!(!store.meta_path(&id).exists());
        assert!(!store.delete(&id).unwrap());
    }

    // ----- Metadata -----

    #[test]
    fn meta_roundtrip() {
        let (_d, store) = store();
        let id = store.write_object(&floats(4, 0.0), ObjectType::Vector).unwrap();
        let meta = ObjectMeta {
            source_file: Some("doc.txt".into()),
            timestamp: Some(1),
            model: Some("m".into()),
            ..Default::default()
        };
        store.write_meta(&id, &meta).unwrap();
        assert_eq!(store.read_meta(&id).unwrap(), Some(meta));
    }

    #[test]
    fn absent_meta_is_none() {
        let (_d, store) = store();
        assert_eq!(store.read_meta(&ObjectId::from_bytes(b"x")).unwrap(), None);
    }

    // ----- Hash resolution -----

    #[test]
    fn resolve_unique_prefix() {
        let (_d, store) = store();
        let id = store.write_object(&floats(4, 7.0), ObjectType::Vector).unwrap();
        store.write_meta(&id, &ObjectMeta::default()).unwrap();
        let prefix = &id.to_hex()[..6];
        assert_eq!(store.resolve_hash(prefix).unwrap(), id);
    }

    #[test]
    fn resolve_full_hash() {
        let (_d, store) = store();
        let id = store.write_object(&floats(4, 8.0), ObjectType::Vector).unwrap();
        assert_eq!(store.resolve_hash(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn resolve_ambiguous_prefix() {
        let (_d, store) = store();
        touch(&store, &format!("abc123ef{}.raw", "0".repeat(56)));
        touch(&store, &format!("abc123aa{}.raw", "0".repeat(56)));
        let err = store.resolve_hash("abc123").unwrap_err();
        match err {
            StoreError::HashAmbiguous { prefix, candidates } => {
                assert_eq!(prefix, "abc123");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected HashAmbiguous, got {other:?}"),
        }
        assert_eq!(
            store.resolve_hash("abc123ef").unwrap().to_hex(),
            format!("abc123ef{}", "0".repeat(56))
        );
    }

    #[test]
    fn resolve_without_match() {
        let (_d, store) = store();
        touch(&store, &format!("abc123ef{}.raw", "0".repeat(56)));
        let err = store.resolve_hash("ffff").unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }

    #[test]
    fn resolve_rejects_short_prefix() {
        let (_d, store) = store();
        let err = store.resolve_hash("abc").unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
    }

    #[test]
    fn meta_and_temp_files_are_not_objects() {
        let (_d, store) = store();
        touch(&store, &format!("{}.meta", "a".repeat(64)));
        touch(&store, "notes.txt");
        assert!(store.object_ids().unwrap().is_empty());
    }
}
