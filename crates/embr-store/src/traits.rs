use embr_types::{ObjectId, ObjectType, HASH_HEX_LEN};

use crate::error::{StoreError, StoreResult};

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same payload always produces
///   the same ID, so a second write of it is a no-op.
/// - An object's ID is the hash of its *uncompressed* payload, whatever
///   envelope the backend stores around it.
/// - Reads either return the exact payload that was written or an error;
///   never partial or garbage output.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Write a payload and return its content-addressed ID.
    fn write_object(&self, data: &[u8], obj_type: ObjectType) -> StoreResult<ObjectId>;

    /// Read the decoded payload of an object.
    ///
    /// Returns [`StoreError::NotFound`] if the object does not exist.
    fn read_object(&self, id: &ObjectId) -> StoreResult<Vec<u8>>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object by ID. Returns `true` if the object existed.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// IDs of every stored object, each listed once, in ascending order.
    fn object_ids(&self) -> StoreResult<Vec<ObjectId>>;

    /// Expand a hash prefix into the single object it names.
    ///
    /// The prefix must be 4 to 64 hex characters. Zero matches yield
    /// [`StoreError::NotFound`]; two or more yield
    /// [`StoreError::HashAmbiguous`] listing every candidate.
    fn resolve_hash(&self, prefix: &str) -> StoreResult<ObjectId> {
        let prefix = ObjectId::validate_prefix(prefix)?;
        if prefix.len() == HASH_HEX_LEN {
            let id = ObjectId::from_hex(&prefix)?;
            return if self.exists(&id)? {
                Ok(id)
            } else {
                Err(StoreError::NotFound(prefix))
            };
        }
        let matches: Vec<ObjectId> = self
            .object_ids()?
            .into_iter()
            .filter(|id| id.matches_prefix(&prefix))
            .collect();
        single_match(prefix, matches)
    }

    /// Read multiple objects in a batch.
    ///
    /// Default implementation calls `read_object()` for each ID.
    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Vec<u8>>> {
        ids.iter().map(|id| self.read_object(id)).collect()
    }
}

/// Reduce the candidates for `prefix` to exactly one ID.
pub(crate) fn single_match(prefix: String, mut matches: Vec<ObjectId>) -> StoreResult<ObjectId> {
    match matches.len() {
        0 => Err(StoreError::NotFound(prefix)),
        1 => Ok(matches.remove(0)),
        _ => Err(StoreError::HashAmbiguous {
            prefix,
            candidates: matches.iter().map(ObjectId::to_hex).collect(),
        }),
    }
}
