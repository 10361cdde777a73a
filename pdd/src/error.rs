use std::path::PathBuf;

use thiserror::Error;

/// Script module lookup errors.
///
/// Both variants are the "not found" class: they abort the current
/// `load`/`require` only and are reported on the host output.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("'{name}' not found")]
    NotFound { name: String, path: PathBuf },

    #[error("'{name}' not found (R2DEC_HOME is unset and there is no user data directory)")]
    NoBaseDir { name: String },
}

impl ResolveError {
    /// File name the script asked for, extension included.
    pub fn name(&self) -> &str {
        match self {
            ResolveError::NotFound { name, .. } | ResolveError::NoBaseDir { name } => name,
        }
    }
}

/// Outcome of a failed `ScriptHost::run`.
///
/// By the time one of these is returned the diagnostic has already been
/// printed on the host output; callers only need to log it.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("a decompiler script is already running")]
    Busy,

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("fatal engine error: {0}")]
    Fatal(String),
}

/// Preference store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config is locked, cannot create '{0}'")]
    Locked(String),

    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    #[error("'{key}' is a boolean, got '{value}'")]
    NotBoolean { key: String, value: String },
}
