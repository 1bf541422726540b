//! Object key layout under a bucket prefix.
//!
//! ```text
//! <prefix>/sets/<set>/documents/<hash>.<format>
//! <prefix>/sets/<set>/metadata.json
//! ```
//! A prefix that already names `sets/<name>` is not extended again; an empty
//! prefix starts at `sets/`.

use embr_store::DEFAULT_SET;

pub const METADATA_FILE: &str = "metadata.json";
pub const DOCUMENTS_DIR: &str = "documents";

/// Index of the `sets` segment in the first `sets/<name>` pair.
fn sets_segment(segments: &[&str]) -> Option<usize> {
    segments
        .windows(2)
        .position(|w| w[0] == "sets" && !w[1].is_empty())
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Set named by a `sets/<name>` segment pair in `path`.
pub fn set_from_path(path: &str) -> Option<String> {
    let segs = segments(path);
    sets_segment(&segs).map(|i| segs[i + 1].to_string())
}

/// Set name for a transfer: from the target path, else from the prefix,
/// else `main`.
pub fn set_name(prefix: &str, target_path: Option<&str>) -> String {
    target_path
        .and_then(set_from_path)
        .or_else(|| set_from_path(prefix))
        .unwrap_or_else(|| DEFAULT_SET.to_string())
}

/// Resolved keys for one set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    base: String,
    set: String,
}

impl KeyLayout {
    pub fn new(prefix: &str, target_path: Option<&str>) -> Self {
        let prefix = prefix.split('?').next().unwrap_or_default();
        let set = set_name(prefix, target_path);
        let segs = segments(prefix);

        let base = match sets_segment(&segs) {
            Some(i) => {
                let mut parts: Vec<&str> = segs[..i].to_vec();
                parts.push("sets");
                parts.push(&set);
                parts.join("/")
            }
            None if segs.is_empty() => format!("sets/{set}"),
            None if segs.last() == Some(&"sets") => format!("{}/{set}", segs.join("/")),
            None => format!("{}/sets/{set}", segs.join("/")),
        };
        Self { base, set }
    }

    pub fn set(&self) -> &str {
        &self.set
    }

    /// `<...>/sets/<set>`, no trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn document_key(&self, hash: &str, extension: &str) -> String {
        format!("{}/{DOCUMENTS_DIR}/{hash}.{extension}", self.base)
    }

    pub fn documents_prefix(&self) -> String {
        format!("{}/{DOCUMENTS_DIR}/", self.base)
    }

    pub fn metadata_key(&self) -> String {
        format!("{}/{METADATA_FILE}", self.base)
    }

    /// Key a download should fetch for `target_path`.
    ///
    /// A leading `sets/<name>` is dropped; what remains is relative to the
    /// set. Nothing left means the metadata document.
    pub fn download_key(&self, target_path: Option<&str>) -> String {
        let segs = target_path.map(segments).unwrap_or_default();
        let rest = match sets_segment(&segs) {
            Some(i) => &segs[i + 2..],
            None => &segs[..],
        };
        if rest.is_empty() {
            self.metadata_key()
        } else {
            format!("{}/{}", self.base, rest.join("/"))
        }
    }

    /// Hash named by a document key, if `key` is one.
    pub fn hash_from_document_key(key: &str) -> Option<&str> {
        let (dir, file) = key.rsplit_once('/')?;
        if !dir.ends_with(DOCUMENTS_DIR) {
            return None;
        }
        file.split_once('.').map(|(hash, _)| hash).filter(|h| !h.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prefix_gains_sets_segment() {
        let keys = KeyLayout::new("team/vectors", None);
        assert_eq!(keys.set(), "main");
        assert_eq!(keys.document_key("abc", "parquet"), "team/vectors/sets/main/documents/abc.parquet");
        assert_eq!(keys.metadata_key(), "team/vectors/sets/main/metadata.json");
    }

    #[test]
    fn empty_prefix() {
        let keys = KeyLayout::new("", Some("sets/research"));
        assert_eq!(keys.document_key("h", "parquet"), "sets/research/documents/h.parquet");
        assert_eq!(keys.metadata_key(), "sets/research/metadata.json");
    }

    #[test]
    fn prefix_ending_in_set_is_not_repeated() {
        let keys = KeyLayout::new("root/sets/main", Some("sets/main"));
        assert_eq!(keys.base(), "root/sets/main");
        assert_eq!(keys.metadata_key(), "root/sets/main/metadata.json");
    }

    #[test]
    fn set_comes_from_prefix_without_target() {
        let keys = KeyLayout::new("root/sets/docs/", None);
        assert_eq!(keys.set(), "docs");
        assert_eq!(keys.base(), "root/sets/docs");
    }

    #[test]
    fn target_path_overrides_prefix_set() {
        let keys = KeyLayout::new("root/sets/docs", Some("sets/other/documents"));
        assert_eq!(keys.set(), "other");
        assert_eq!(keys.base(), "root/sets/other");
    }

    #[test]
    fn deeper_prefix_is_cut_at_the_set() {
        let keys = KeyLayout::new("root/sets/main/documents", None);
        assert_eq!(keys.base(), "root/sets/main");
    }

    #[test]
    fn prefix_ending_in_sets_dir() {
        let keys = KeyLayout::new("root/sets", Some("sets/a"));
        assert_eq!(keys.base(), "root/sets/a");
    }

    #[test]
    fn query_is_ignored() {
        let keys = KeyLayout::new("p?region=x", None);
        assert_eq!(keys.base(), "p/sets/main");
    }

    #[test]
    fn download_keys() {
        let keys = KeyLayout::new("p", Some("sets/main"));
        assert_eq!(keys.download_key(Some("sets/main")), "p/sets/main/metadata.json");
        assert_eq!(keys.download_key(None), "p/sets/main/metadata.json");
        assert_eq!(
            keys.download_key(Some("documents/abc.parquet")),
            "p/sets/main/documents/abc.parquet"
        );
        assert_eq!(
            keys.download_key(Some("sets/main/documents/abc.parquet")),
            "p/sets/main/documents/abc.parquet"
        );
    }

    #[test]
    fn hash_from_key() {
        assert_eq!(KeyLayout::hash_from_document_key("p/sets/m/documents/abc.parquet"), Some("abc"));
        assert_eq!(KeyLayout::hash_from_document_key("p/sets/m/metadata.json"), None);
    }
}
