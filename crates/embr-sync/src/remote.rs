use std::collections::{BTreeMap, HashMap, HashSet};

use embr_store::{
    validate_model_name, validate_source_path, IndexEntry, LogEntry, ObjectStore, Repository, StoreError,
};
use embr_transform::{SharedTransformer, TransformerRegistry};
use embr_transport::s3::keys::DOCUMENTS_DIR;
use embr_transport::{KeyLayout, RemoteMetadata, Transport, TransportKind, TransportSettings};
use embr_types::ObjectId;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::types::{PullResult, PushOptions, PushResult};

/// Source recorded for objects whose remote entry carries no path.
const UNKNOWN_SOURCE: &str = "-";

/// URL of `set` under a remote: `<url>/sets/<set>` for S3, the repository
/// itself for other remotes.
pub fn set_url(url: &str, set: &str) -> String {
    if TransportKind::classify(url) != Some(TransportKind::S3) {
        return url.to_string();
    }
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };
    let path = path.trim_end_matches('/');
    let base = if path.ends_with(&format!("/sets/{set}")) {
        path.to_string()
    } else {
        format!("{path}/sets/{set}")
    };
    match query {
        Some(q) => format!("{base}?{q}"),
        None => base,
    }
}

fn open_set(url: &str, set: &str, settings: TransportSettings) -> SyncResult<Transport> {
    let mut transport = Transport::open_with(&set_url(url, set), settings)?;
    transport.set_target_path(Some(&format!("sets/{set}")));
    Ok(transport)
}

/// Send every object logged in `set` to the remote at `url`.
///
/// With `force`, S3 documents the local set does not have are deleted.
pub fn push_set(
    repo: &Repository,
    url: &str,
    set_name: &str,
    mut settings: TransportSettings,
    options: PushOptions,
) -> SyncResult<PushResult> {
    let set = repo.set(set_name)?;
    if !set.exists() {
        return Err(SyncError::SetNotFound(set_name.to_string()));
    }
    let entries = set.read_log()?;
    settings.repo.get_or_insert_with(|| repo.context().clone());

    let mut transport = open_set(url, set_name, settings)?;
    let mut result = PushResult {
        set: set_name.to_string(),
        ..Default::default()
    };
    let mut sent = HashSet::new();
    for entry in &entries {
        let id = *entry.hash();
        if !sent.insert(id) {
            continue;
        }
        let payload = repo.read(&id)?;
        transport.send_data(&payload, &id.to_hex())?;
        debug!(object = %id.short_hex(), bytes = payload.len(), "pushed object");
        result.objects_sent += 1;
        result.bytes_sent += payload.len() as u64;
    }

    if options.force {
        if transport.kind() == TransportKind::S3 {
            let local: HashSet<String> = sent.iter().map(ObjectId::to_hex).collect();
            let stale: Vec<String> = transport
                .list_refs()?
                .into_iter()
                .filter(|key| KeyLayout::hash_from_document_key(key).is_some_and(|h| !local.contains(h)))
                .collect();
            if !stale.is_empty() {
                transport.delete_refs(&stale)?;
            }
            result.pruned = stale;
        } else {
            warn!(url, kind = %transport.kind(), "pruning is only done for S3 remotes");
        }
    }
    transport.close()?;

    info!(
        set = set_name,
        objects = result.objects_sent,
        bytes = result.bytes_sent,
        pruned = result.pruned.len(),
        "push complete"
    );
    Ok(result)
}

/// Transformer that decodes documents of `format`, if any is needed.
fn decoder_for(format: &str, settings: &TransportSettings) -> Option<SharedTransformer> {
    if let Some(t) = &settings.transformer {
        if t.format_name() == format {
            return Some(t.clone());
        }
    }
    TransformerRegistry::with_builtins().find_by_format(format)
}

fn object_id(hash: &str) -> SyncResult<ObjectId> {
    Ok(ObjectId::from_hex(hash).map_err(StoreError::from)?)
}

/// Reject metadata that would corrupt the local log, index, or refs, or
/// name document keys outside the set.
fn validate_metadata(doc: &RemoteMetadata) -> SyncResult<()> {
    let invalid = |reason: String| SyncError::InvalidMetadata(reason);
    let mut listed = HashSet::new();
    for object in &doc.objects {
        listed.insert(object_id(&object.hash)?);
        let format = doc.format_of(object);
        if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(format!("document format {format:?} of {}", object.hash)));
        }
    }
    let check_listed = |hash: &str| -> SyncResult<()> {
        if listed.contains(&object_id(hash)?) {
            Ok(())
        } else {
            Err(invalid(format!("{hash} is referenced but not listed")))
        }
    };

    for entry in doc.history() {
        check_listed(&entry.hash)?;
        if !entry.path.is_empty() {
            validate_source_path(&entry.path).map_err(|e| invalid(e.to_string()))?;
        }
        if let Some(model) = &entry.model {
            validate_model_name(model).map_err(|e| invalid(e.to_string()))?;
        }
    }
    for entry in &doc.index {
        check_listed(&entry.hash)?;
        validate_source_path(&entry.path).map_err(|e| invalid(e.to_string()))?;
    }
    for (model, hash) in &doc.refs {
        check_listed(hash)?;
        validate_model_name(model).map_err(|e| invalid(e.to_string()))?;
    }
    Ok(())
}

/// Fetch `set` from an S3 remote into `repo`.
///
/// The metadata document is validated before anything is written. Every
/// listed document is then downloaded, decoded, checked against its hash,
/// and stored; the set's log, index, and model refs are finally replaced by
/// the remote's.
pub fn pull_set(
    repo: &Repository,
    url: &str,
    set_name: &str,
    settings: TransportSettings,
) -> SyncResult<PullResult> {
    let set = repo.set(set_name)?;
    let decoder_settings = settings.clone();
    let mut transport = open_set(url, set_name, settings)?;
    if transport.kind() != TransportKind::S3 {
        return Err(SyncError::Unsupported(format!(
            "pull is not supported for {} remotes",
            transport.kind()
        )));
    }

    let doc = RemoteMetadata::from_json(&transport.receive_all()?)?;
    validate_metadata(&doc)?;
    debug!(set = set_name, format = %doc.format, objects = doc.objects.len(), "read remote metadata");

    let mut result = PullResult {
        set: set_name.to_string(),
        ..Default::default()
    };
    let mut decoders: HashMap<&str, Option<SharedTransformer>> = HashMap::new();
    for object in &doc.objects {
        let id = object_id(&object.hash)?;
        if repo.store().exists(&id)? {
            result.already_present += 1;
            continue;
        }
        let format = doc.format_of(object);
        transport.set_target_path(Some(&format!(
            "sets/{set_name}/{DOCUMENTS_DIR}/{}.{format}",
            object.hash
        )));
        let encoded = transport.receive_all()?;
        let size = encoded.len() as u64;
        let decoder = decoders
            .entry(format)
            .or_insert_with(|| decoder_for(format, &decoder_settings));
        let payload = match decoder {
            Some(t) => t.inverse_transform(&encoded)?,
            None => encoded,
        };
        repo.import_object(&payload, &id)?;
        debug!(object = %id.short_hex(), format, bytes = size, "pulled object");
        result.objects_received += 1;
        result.bytes_received += size;
    }
    transport.close()?;

    let log = doc
        .history()
        .iter()
        .map(|object| -> SyncResult<LogEntry> {
            let hash = object_id(&object.hash)?;
            let source = if object.path.is_empty() {
                UNKNOWN_SOURCE.to_string()
            } else {
                object.path.clone()
            };
            Ok(match &object.model {
                Some(model) => LogEntry::Current {
                    timestamp: object.created,
                    hash,
                    source,
                    model: model.clone(),
                },
                None => LogEntry::Legacy {
                    timestamp: object.created,
                    hash,
                    source,
                },
            })
        })
        .collect::<SyncResult<Vec<_>>>()?;
    let index = doc
        .index
        .iter()
        .map(|e| -> SyncResult<IndexEntry> {
            Ok(IndexEntry {
                hash: object_id(&e.hash)?,
                source: e.path.clone(),
            })
        })
        .collect::<SyncResult<Vec<_>>>()?;
    let refs = doc
        .refs
        .iter()
        .map(|(model, hash)| -> SyncResult<(String, ObjectId)> { Ok((model.clone(), object_id(hash)?)) })
        .collect::<SyncResult<BTreeMap<_, _>>>()?;
    set.create()?;
    set.replace_all(&log, &index, &refs)?;

    info!(
        set = set_name,
        received = result.objects_received,
        present = result.already_present,
        bytes = result.bytes_received,
        "pull complete"
    );
    Ok(result)
}

/// Keys stored for `set` on the remote at `url`.
pub fn list_remote(url: &str, set_name: &str, settings: TransportSettings) -> SyncResult<Vec<String>> {
    let mut transport = open_set(url, set_name, settings)?;
    let refs = transport.list_refs()?;
    transport.close()?;
    Ok(refs)
}
