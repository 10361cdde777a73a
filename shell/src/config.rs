//! Optional JSON config file, merged under the command-line flags.
//!
//! ```json
//! {
//!   "r2": "/usr/local/bin/r2",
//!   "home": "/src/r2dec-js",
//!   "timeout_secs": 30,
//!   "preferences": { "r2dec.casts": "true", "r2dec.theme": "dark+" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use pdd::ModuleResolver;
use serde::Deserialize;

pub const DEFAULT_R2: &str = "r2";

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    pub r2: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub preferences: BTreeMap<String, String>,
}

/// Effective settings after merging flags over the file.
#[derive(Debug)]
pub struct Settings {
    pub r2: PathBuf,
    pub resolver: ModuleResolver,
    pub timeout: Option<Duration>,
    pub preferences: BTreeMap<String, String>,
}

impl ShellConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Flags win over file values; without either the package root comes
    /// from `R2DEC_HOME` or the r2pm install path.
    pub fn resolve(self, r2: Option<PathBuf>, home: Option<PathBuf>, timeout_secs: Option<u64>) -> Settings {
        let resolver = match home.or(self.home) {
            Some(dir) => ModuleResolver::with_base(dir),
            None => ModuleResolver::from_env(),
        };
        Settings {
            r2: r2.or(self.r2).unwrap_or_else(|| PathBuf::from(DEFAULT_R2)),
            resolver,
            timeout: timeout_secs.or(self.timeout_secs).map(Duration::from_secs),
            preferences: self.preferences,
        }
    }
}
