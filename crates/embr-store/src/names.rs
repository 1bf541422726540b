//! Name validation for sets, models, and remotes.
//!
//! Every such name becomes a single path component under `.eb/` (or a key
//! segment on a remote), so the rules are stricter than git ref names:
//! - Must be non-empty and at most 255 bytes
//! - Must not contain `/`, whitespace, or any of `~ ^ : ? * [ \`
//! - Must not start with `.` or `-`
//! - Must not end with `.lock`

use crate::error::{StoreError, StoreResult};

/// Characters that are forbidden anywhere in a name.
const FORBIDDEN_CHARS: &[char] = &['/', '~', '^', ':', '?', '*', '[', '\\', '\0'];

const MAX_NAME_LEN: usize = 255;

fn validate(kind: &str, name: &str) -> StoreResult<()> {
    let reject = |reason: String| {
        Err(StoreError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject(format!("{kind} name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return reject(format!("{kind} name exceeds {MAX_NAME_LEN} bytes"));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || FORBIDDEN_CHARS.contains(c))
    {
        return reject(format!("contains forbidden character: {ch:?}"));
    }
    if name.starts_with('.') || name.starts_with('-') {
        return reject("must not start with '.' or '-'".into());
    }
    if name.ends_with(".lock") {
        return reject("must not end with '.lock'".into());
    }
    Ok(())
}

/// Validate a set name (`main`, `openai-docs`, ...).
pub fn validate_set_name(name: &str) -> StoreResult<()> {
    validate("set", name)
}

/// Validate a model name as recorded in log entries and model refs.
pub fn validate_model_name(name: &str) -> StoreResult<()> {
    validate("model", name)
}

/// Validate a source path recorded in set logs and indexes.
///
/// Log and index lines are whitespace-separated, so a path must be a single
/// non-empty token.
pub fn validate_source_path(source: &str) -> StoreResult<()> {
    if source.is_empty() || source.chars().any(char::is_whitespace) {
        return Err(StoreError::InvalidParameter(format!(
            "source path {source:?} must be non-empty and contain no whitespace"
        )));
    }
    Ok(())
}

/// Validate a remote name from the repository config.
pub fn validate_remote_name(name: &str) -> StoreResult<()> {
    validate("remote", name)
}
