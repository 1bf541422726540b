//! Transport URL classification and parsing.

use std::fmt;

use crate::error::{TransportError, TransportResult};

/// Which backend a URL selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Local,
    Ssh,
    Http,
    S3,
}

impl TransportKind {
    /// Pick the backend for `url`.
    ///
    /// Checked in order: `ssh://` or any `@` selects SSH, `http(s)://`
    /// selects HTTP, `s3://` selects S3, and `file://` or a string without
    /// `:` is a local path. Anything else is unsupported.
    pub fn classify(url: &str) -> Option<Self> {
        if url.starts_with("ssh://") || url.contains('@') {
            Some(Self::Ssh)
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Some(Self::Http)
        } else if url.starts_with("s3://") {
            Some(Self::S3)
        } else if url.starts_with("file://") || !url.contains(':') {
            Some(Self::Local)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Ssh => "ssh",
            Self::Http => "http",
            Self::S3 => "s3",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem path of a local transport URL: `file://` and trailing slashes
/// removed.
pub fn local_path(url: &str) -> &str {
    let path = url.strip_prefix("file://").unwrap_or(url);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Parts of `s3://<bucket>/<prefix>?region=<r>&endpoint=<url>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    /// Key prefix without leading or trailing slashes; may be empty.
    pub prefix: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl S3Location {
    pub fn parse(url: &str) -> TransportResult<Self> {
        let rest = url
            .strip_prefix("s3://")
            .ok_or_else(|| TransportError::InvalidParameter(format!("not an s3:// URL: {url}")))?;
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        let (bucket, prefix) = path.split_once('/').unwrap_or((path, ""));
        if bucket.is_empty() {
            return Err(TransportError::InvalidParameter(format!(
                "S3 URL has no bucket: {url}"
            )));
        }

        let mut region = None;
        let mut endpoint = None;
        for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "region" if !value.is_empty() => region = Some(value.to_string()),
                "endpoint" if !value.is_empty() => endpoint = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            region,
            endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ----- Classification -----

    #[test]
    fn scheme_table() {
        let cases = [
            ("ssh://host/repo", Some(TransportKind::Ssh)),
            ("git@host:repo", Some(TransportKind::Ssh)),
            ("user@host", Some(TransportKind::Ssh)),
            ("http://host/repo", Some(TransportKind::Http)),
            ("https://host/repo", Some(TransportKind::Http)),
            ("s3://bucket/prefix", Some(TransportKind::S3)),
            ("file:///tmp/repo", Some(TransportKind::Local)),
            ("/tmp/repo", Some(TransportKind::Local)),
            ("relative/repo", Some(TransportKind::Local)),
            ("ftp://host/repo", None),
            ("gs://bucket", None),
        ];
        for (url, expected) in cases {
            assert_eq!(TransportKind::classify(url), expected, "{url}");
        }
    }

    #[test]
    fn at_sign_wins_over_http() {
        assert_eq!(
            TransportKind::classify("https://user@host/repo"),
            Some(TransportKind::Ssh)
        );
    }

    #[test]
    fn local_path_strips_scheme_and_slashes() {
        assert_eq!(local_path("file:///tmp/repo/"), "/tmp/repo");
        assert_eq!(local_path("/tmp/repo//"), "/tmp/repo");
        assert_eq!(local_path("repo"), "repo");
        assert_eq!(local_path("file:///"), "/");
    }

    // ----- S3 -----

    #[test]
    fn s3_bucket_and_prefix() {
        let loc = S3Location::parse("s3://my-bucket/team/embeddings/").unwrap();
        assert_eq!(loc.bucket, "my-bucket");
        assert_eq!(loc.prefix, "team/embeddings");
        assert_eq!(loc.region, None);
    }

    #[test]
    fn s3_query_parameters() {
        let loc =
            S3Location::parse("s3://b/p?region=eu-west-1&endpoint=http://localhost:9000").unwrap();
        assert_eq!(loc.prefix, "p");
        assert_eq!(loc.region.as_deref(), Some("eu-west-1"));
        assert_eq!(loc.endpoint.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn s3_bucket_only() {
        let loc = S3Location::parse("s3://bucket").unwrap();
        assert_eq!(loc.prefix, "");
        let loc = S3Location::parse("s3://bucket/?region=us-west-2").unwrap();
        assert_eq!(loc.prefix, "");
        assert_eq!(loc.region.as_deref(), Some("us-west-2"));
    }

    #[test]
    fn s3_without_bucket_is_rejected() {
        assert!(S3Location::parse("s3:///prefix").is_err());
        assert!(S3Location::parse("file:///x").is_err());
    }
}
