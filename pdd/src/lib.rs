//! Embedding bridge for the r2dec decompiler.
//!
//! The decompiler itself is a JavaScript package (`require.js` plus the
//! `libdec/` tree) installed by r2pm or pointed to by `R2DEC_HOME`. This crate
//! owns everything between the host's command line and that package:
//!
//!   pdd[a|b|i|u|?] ──► cmd::Command ──► ScriptHost::run ──► r2dec_main(args)
//!                                           │
//!                                           ├─ r2cmd(cmd)               host command output
//!                                           ├─ ___internal_load(file)   raw module text
//!                                           └─ ___internal_require(mod) evaluate module globally
//!
//! A fresh QuickJS runtime is created for every invocation and dropped when
//! the call returns, so nothing leaks between two `pdd` commands.

pub mod bridge;
pub mod cmd;
pub mod config;
pub mod error;
pub mod host;
pub mod plugin;
pub mod resolver;
pub mod scripting;

#[cfg(test)]
pub(crate) mod testing;

pub use cmd::Command;
pub use config::{PreferenceStore, Preferences};
pub use error::{ConfigError, ResolveError, ScriptError};
pub use host::{CompletionKind, Host, SharedHost};
pub use plugin::PddPlugin;
pub use resolver::{ModuleKind, ModuleResolver, ModuleSource};
pub use scripting::{EngineState, FatalPolicy, ScriptHost, ScriptHostConfig};
