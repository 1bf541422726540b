use tracing::level_filters::LevelFilter;

pub const DEBUG_LEVEL_ENV: &str = "EB_DEBUG_LEVEL";

/// Verbosity of diagnostic output, `EB_DEBUG_LEVEL` 0 through 5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    None = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl DebugLevel {
    pub fn from_number(n: u8) -> Self {
        match n {
            0 => Self::None,
            1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            4 => Self::Debug,
            _ => Self::Trace,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `EB_DEBUG_LEVEL` wins; a truthy `EB_DEBUG` or `DEBUG` means info.
    /// Warnings are shown when nothing is set.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(n) = env(DEBUG_LEVEL_ENV).and_then(|v| v.trim().parse::<u8>().ok()) {
            return Self::from_number(n);
        }
        let truthy = |key: &str| {
            env(key).is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        };
        if truthy("EB_DEBUG") || truthy("DEBUG") {
            Self::Info
        } else {
            Self::Warn
        }
    }

    /// `--verbose` raises the level to at least debug.
    pub fn with_verbose(self, verbose: bool) -> Self {
        if verbose {
            self.max(Self::Debug)
        } else {
            self
        }
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            Self::None => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}
