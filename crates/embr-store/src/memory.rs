use std::collections::BTreeMap;
use std::sync::RwLock;

use embr_types::{ObjectId, ObjectType, HASH_HEX_LEN};

use crate::error::{StoreError, StoreResult};
use crate::traits::{single_match, ObjectStore};

/// In-memory, BTreeMap-based object store.
///
/// Intended for tests and embedding. Payloads are held uncompressed behind a
/// `RwLock`; the ordered map lets prefix resolution scan only the matching
/// range instead of every key.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<ObjectId, (ObjectType, Vec<u8>)>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total payload bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|(_, data)| data.len() as u64)
            .sum()
    }

    /// Insert a payload under an arbitrary ID.
    ///
    /// Lets tests stage colliding prefixes that real content would not
    /// produce.
    pub fn insert_raw(&self, id: ObjectId, data: Vec<u8>) {
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(id, (ObjectType::Vector, data));
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn write_object(&self, data: &[u8], obj_type: ObjectType) -> StoreResult<ObjectId> {
        let id = ObjectId::from_bytes(data);
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(id).or_insert_with(|| (obj_type, data.to_vec()));
        Ok(id)
    }

    fn read_object(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_hex()))
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map.remove(id).is_some())
    }

    fn object_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.keys().copied().collect())
    }

    fn resolve_hash(&self, prefix: &str) -> StoreResult<ObjectId> {
        let prefix = ObjectId::validate_prefix(prefix)?;
        // Lowest possible id carrying this prefix.
        let floor = format!("{prefix:0<width$}", width = HASH_HEX_LEN);
        let start = ObjectId::from_hex(&floor)?;

        let map = self.objects.read().expect("lock poisoned");
        let matches: Vec<ObjectId> = map
            .range(start..)
            .map(|(id, _)| *id)
            .take_while(|id| id.matches_prefix(&prefix))
            .collect();
        single_match(prefix, matches)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
