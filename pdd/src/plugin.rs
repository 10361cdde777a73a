//! The plugin surface seen by the host: `init` once, then `call` per line.

use log::debug;

use crate::cmd::{self, PREFIX};
use crate::config;
use crate::error::ConfigError;
use crate::host::{self, CompletionKind, Host, SharedHost};
use crate::scripting::ScriptHost;

pub const NAME: &str = "r2dec";
pub const DESCRIPTION: &str = "experimental pseudo-C decompiler for radare2";

/// Top-level command words offered for completion.
pub const COMMANDS: [&str; 5] = ["pdd", "pdda", "pddb", "pddi", "pddu"];

/// Options completed after `pdd`.
pub const OPTIONS: [&str; 9] = [
    "--assembly",
    "--blocks",
    "--casts",
    "--colors",
    "--debug",
    "--html",
    "--issue",
    "--paddr",
    "--xrefs",
];

/// `e cmd.pdc=?` lists the available pseudo-code plugins.
const PDC_PROBE: &str = "e cmd.pdc";

#[derive(Default)]
pub struct PddPlugin {
    scripts: ScriptHost,
}

impl PddPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script_host(scripts: ScriptHost) -> Self {
        Self { scripts }
    }

    pub fn script_host(&self) -> &ScriptHost {
        &self.scripts
    }

    /// Registers the `r2dec.*` preferences and the completion entries.
    pub fn init(&self, host: &mut dyn Host) -> Result<(), ConfigError> {
        config::register(host.config())?;

        for command in COMMANDS {
            host.autocomplete(None, command, CompletionKind::Default);
        }
        for option in OPTIONS {
            host.autocomplete(Some(PREFIX), option, CompletionKind::Option);
        }
        debug!(
            "{NAME}: {} commands and {} options registered",
            COMMANDS.len(),
            OPTIONS.len()
        );
        Ok(())
    }

    /// Handles one host command line. Returns true when the line was ours.
    pub fn call(&self, host: &SharedHost, input: &str) -> bool {
        if input.starts_with(PDC_PROBE) && input.contains('=') && input.contains('?') {
            // Let the host keep listing the other candidates.
            host::print_line(host, NAME);
            return false;
        }

        match input.strip_prefix(PREFIX) {
            Some(rest) => {
                cmd::dispatch(&self.scripts, host, &cmd::route(rest));
                true
            }
            None => false,
        }
    }
}
