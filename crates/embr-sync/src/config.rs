use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;

use embr_store::{validate_remote_name, RepoContext, DEFAULT_SET};
use embr_transport::{S3Config, TransportKind, TransportSettings};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

/// Repository configuration stored in `.eb/config.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub core: CoreConfig,
    pub remotes: BTreeMap<String, RemoteConfig>,
    /// Tunables shared by every S3 remote.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub default_set: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_set: DEFAULT_SET.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    /// Overrides every operation deadline of this remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Transformer for pushes to this remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: None,
            transformer: None,
        }
    }

    pub fn kind(&self) -> Option<TransportKind> {
        TransportKind::classify(&self.url)
    }
}

impl RepoConfig {
    /// Load the config of `ctx`; a missing file gives the defaults.
    pub fn load(ctx: &RepoContext) -> SyncResult<Self> {
        let path = ctx.config_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text).map_err(|e| SyncError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self, ctx: &RepoContext) -> SyncResult<()> {
        let path = ctx.config_path();
        let text = toml::to_string_pretty(self).map_err(|e| SyncError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(&path, text)?;
        Ok(())
    }

    pub fn add_remote(&mut self, name: &str, remote: RemoteConfig) -> SyncResult<()> {
        validate_remote_name(name)?;
        if remote.kind().is_none() {
            return Err(SyncError::Unsupported(format!(
                "Unsupported transport URL: {}",
                remote.url
            )));
        }
        if self.remotes.contains_key(name) {
            return Err(SyncError::RemoteExists(name.to_string()));
        }
        info!(remote = name, url = %remote.url, "added remote");
        self.remotes.insert(name.to_string(), remote);
        Ok(())
    }

    pub fn remove_remote(&mut self, name: &str) -> SyncResult<RemoteConfig> {
        let removed = self
            .remotes
            .remove(name)
            .ok_or_else(|| SyncError::UnknownRemote(name.to_string()))?;
        info!(remote = name, "removed remote");
        Ok(removed)
    }

    pub fn remote(&self, name: &str) -> SyncResult<&RemoteConfig> {
        self.remotes
            .get(name)
            .ok_or_else(|| SyncError::UnknownRemote(name.to_string()))
    }

    /// Transport settings for `remote`, with pushes described from `ctx`.
    pub fn transport_settings(&self, remote: &RemoteConfig, ctx: Option<&RepoContext>) -> TransportSettings {
        let mut s3 = self.s3.clone().unwrap_or_default();
        if let Some(secs) = remote.timeout_secs {
            s3 = s3.with_deadline(Duration::from_secs(secs));
        }
        if let Some(name) = &remote.transformer {
            s3.transformer = name.clone();
        }
        TransportSettings {
            s3,
            repo: ctx.cloned(),
            ..Default::default()
        }
    }
}
