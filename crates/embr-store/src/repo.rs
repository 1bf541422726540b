use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Reserved directory at the repository root.
pub const REPO_DIR: &str = ".eb";

/// Older spelling of [`REPO_DIR`]; recognised but never created.
pub const ALT_REPO_DIR: &str = ".embr";

/// Environment variable naming the repository root explicitly.
pub const REPO_ROOT_ENV: &str = "EB_REPO_ROOT";

/// How many parent directories discovery will climb before giving up.
const MAX_DISCOVERY_DEPTH: usize = 64;

static CACHED: OnceLock<RepoContext> = OnceLock::new();

/// Location of a repository: its root and the reserved directory under it.
///
/// Library code takes this explicitly. [`RepoContext::cached`] exists for
/// binaries that want to discover once and reuse the result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoContext {
    root: PathBuf,
    eb_dir: PathBuf,
}

impl RepoContext {
    /// Wrap an existing repository root without checking it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let eb_dir = reserved_dir(&root).unwrap_or_else(|| root.join(REPO_DIR));
        Self { root, eb_dir }
    }

    /// Create `.eb/` and its standard subdirectories under `root`.
    pub fn init(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let ctx = Self {
            eb_dir: root.join(REPO_DIR),
            root,
        };
        std::fs::create_dir_all(ctx.objects_dir().join("temp"))?;
        std::fs::create_dir_all(ctx.sets_dir())?;
        debug!(root = %ctx.root.display(), "initialized repository");
        Ok(ctx)
    }

    /// Walk up from `start` to the first directory holding `.eb` or `.embr`.
    pub fn discover(start: impl AsRef<Path>) -> StoreResult<Self> {
        let start = start.as_ref();
        let mut dir = Some(start);
        let mut depth = 0;
        while let Some(candidate) = dir {
            if depth > MAX_DISCOVERY_DEPTH {
                break;
            }
            if let Some(eb_dir) = reserved_dir(candidate) {
                return Ok(Self {
                    root: candidate.to_path_buf(),
                    eb_dir,
                });
            }
            dir = candidate.parent();
            depth += 1;
        }
        Err(StoreError::InvalidRepository(start.to_path_buf()))
    }

    /// Use `EB_REPO_ROOT` if set, else discover from the current directory.
    pub fn from_env() -> StoreResult<Self> {
        match env::var_os(REPO_ROOT_ENV) {
            Some(root) if !root.is_empty() => {
                let root = PathBuf::from(root);
                reserved_dir(&root)
                    .map(|eb_dir| Self { root: root.clone(), eb_dir })
                    .ok_or(StoreError::InvalidRepository(root))
            }
            _ => Self::discover(env::current_dir()?),
        }
    }

    /// [`RepoContext::from_env`], computed at most once per process.
    ///
    /// Failures are not cached.
    pub fn cached() -> StoreResult<&'static Self> {
        if let Some(ctx) = CACHED.get() {
            return Ok(ctx);
        }
        let ctx = Self::from_env()?;
        Ok(CACHED.get_or_init(|| ctx))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn eb_dir(&self) -> &Path {
        &self.eb_dir
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.eb_dir.join("objects")
    }

    pub fn sets_dir(&self) -> PathBuf {
        self.eb_dir.join("sets")
    }

    pub fn set_dir(&self, name: &str) -> PathBuf {
        self.sets_dir().join(name)
    }

    pub fn head_path(&self) -> PathBuf {
        self.eb_dir.join("HEAD")
    }

    pub fn config_path(&self) -> PathBuf {
        self.eb_dir.join("config.toml")
    }
}

/// The reserved directory under `root`, preferring `.eb`.
fn reserved_dir(root: &Path) -> Option<PathBuf> {
    [REPO_DIR, ALT_REPO_DIR]
        .into_iter()
        .map(|name| root.join(name))
        .find(|p| p.is_dir())
}
