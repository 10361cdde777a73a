//! `pdd` command routing.
//!
//! The host hands over everything after the three-letter prefix; the first
//! character picks the variant.

use std::fmt::Write as _;

use log::{debug, warn};

use crate::config::PREFERENCES;
use crate::host::SharedHost;
use crate::resolver::HOME_ENV;
use crate::scripting::ScriptHost;

pub const PREFIX: &str = "pdd";

pub const ISSUE_FLAG: &str = "--issue";
pub const ASSEMBLY_FLAG: &str = "--assembly";
pub const BLOCKS_FLAG: &str = "--blocks";

/// Host command run by `pddu`.
pub const UPGRADE_COMMAND: &str = "!r2pm -ci r2dec";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `pdd` / `pdd <text>`: the text is forwarded verbatim.
    Decompile(String),
    /// `pdda`
    DecompileWithAssembly,
    /// `pddb`
    BlocksOnly,
    /// `pddi`
    IssueReport,
    /// `pddu`
    Upgrade,
    /// `pdd?` and anything unrecognised.
    Help,
}

impl Command {
    /// Parses the text following `pdd`. Only the first character matters,
    /// except after a space, where the rest is the decompiler argument.
    pub fn parse(input: &str) -> Self {
        let mut chars = input.chars();
        match chars.next() {
            None => Command::Decompile(String::new()),
            Some(' ') => Command::Decompile(chars.as_str().to_string()),
            Some('u') => Command::Upgrade,
            Some('i') => Command::IssueReport,
            Some('a') => Command::DecompileWithAssembly,
            Some('b') => Command::BlocksOnly,
            Some(_) => Command::Help,
        }
    }

    /// Argument text for `r2dec_main`, or `None` when no script runs.
    pub fn script_args(&self) -> Option<&str> {
        match self {
            Command::Decompile(args) => Some(args.as_str()),
            Command::DecompileWithAssembly => Some(ASSEMBLY_FLAG),
            Command::BlocksOnly => Some(BLOCKS_FLAG),
            Command::IssueReport => Some(ISSUE_FLAG),
            Command::Upgrade | Command::Help => None,
        }
    }
}

pub fn route(input: &str) -> Command {
    let command = Command::parse(input);
    debug!("{PREFIX}{input:?} -> {command:?}");
    command
}

pub fn usage() -> String {
    let mut text = String::from(
        "Usage: pdd [args] - core plugin for r2dec\n\
         \x20pdd   - decompile current function\n\
         \x20pdd?  - show this help\n\
         \x20pdda  - decompile current function with side assembly\n\
         \x20pddb  - decompile current function but shows only scopes\n\
         \x20pddu  - install/upgrade r2dec via r2pm\n\
         \x20pddi  - generates the issue data\n\
         Evaluable Variables:\n",
    );
    for pref in PREFERENCES {
        let _ = writeln!(text, " {:<14}- {}", pref.key, pref.description);
    }
    text.push_str("Environment\n");
    let _ = writeln!(
        text,
        " {HOME_ENV}  defaults to the root directory of the r2dec repo"
    );
    text
}

/// Executes `command` against `host`.
pub fn dispatch(scripts: &ScriptHost, host: &SharedHost, command: &Command) {
    match command {
        Command::Decompile(args) => decompile(scripts, host, args),
        Command::DecompileWithAssembly => decompile(scripts, host, ASSEMBLY_FLAG),
        Command::BlocksOnly => decompile(scripts, host, BLOCKS_FLAG),
        Command::IssueReport => decompile(scripts, host, ISSUE_FLAG),
        Command::Upgrade => upgrade(host),
        Command::Help => help(host),
    }
}

pub fn decompile(scripts: &ScriptHost, host: &SharedHost, args: &str) {
    if let Err(err) = scripts.run(host, args) {
        warn!("{PREFIX}: {err}");
    }
}

pub fn upgrade(host: &SharedHost) {
    let Ok(mut host) = host.try_borrow_mut() else {
        warn!("host busy, cannot run {UPGRADE_COMMAND}");
        return;
    };
    let output = host.cmd(UPGRADE_COMMAND);
    host.print(&output);
}

pub fn help(host: &SharedHost) {
    match host.try_borrow_mut() {
        Ok(mut host) => host.print(&usage()),
        Err(_) => warn!("host busy, dropped usage text"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_host, package, script_host, MockHost};

    #[test]
    fn test_route_first_character() {
        assert_eq!(route(""), Command::Decompile(String::new()));
        assert_eq!(route(" "), Command::Decompile(String::new()));
        assert_eq!(route(" --casts  0x400"), Command::Decompile("--casts  0x400".into()));
        assert_eq!(route("u"), Command::Upgrade);
        assert_eq!(route("i"), Command::IssueReport);
        assert_eq!(route("a"), Command::DecompileWithAssembly);
        assert_eq!(route("b"), Command::BlocksOnly);
        assert_eq!(route("?"), Command::Help);
        assert_eq!(route("x"), Command::Help);
    }

    #[test]
    fn test_route_ignores_trailing_text() {
        assert_eq!(route("a extra"), Command::DecompileWithAssembly);
        assert_eq!(route("bogus"), Command::BlocksOnly);
        assert_eq!(route("upgrade now"), Command::Upgrade);
        assert_eq!(route("issue"), Command::IssueReport);
        assert_eq!(route("?foo"), Command::Help);
        assert_eq!(route("\t--casts"), Command::Help);
    }

    #[test]
    fn test_script_args() {
        assert_eq!(route("").script_args(), Some(""));
        assert_eq!(route(" a b").script_args(), Some("a b"));
        assert_eq!(route("a").script_args(), Some("--assembly"));
        assert_eq!(route("b").script_args(), Some("--blocks"));
        assert_eq!(route("i").script_args(), Some("--issue"));
        assert_eq!(route("u").script_args(), None);
        assert_eq!(route("?").script_args(), None);
    }

    #[test]
    fn test_usage_lists_everything() {
        let text = usage();
        assert!(text.starts_with("Usage: pdd [args] - core plugin for r2dec\n"));
        for sub in ["pdd?", "pdda", "pddb", "pddu", "pddi"] {
            assert!(text.contains(&format!(" {sub} ")), "{sub}");
        }
        assert!(text.contains(" r2dec.casts   - if false, hides all casts in the pseudo code.\n"));
        assert!(text.contains(" r2dec.asm     - if true, shows pseudo next to the assembly.\n"));
        assert!(text.contains(" r2dec.blocks  - if true, shows only scopes blocks.\n"));
        assert!(text.ends_with(
            "Environment\n R2DEC_HOME  defaults to the root directory of the r2dec repo\n"
        ));
    }

    #[test]
    fn test_upgrade_skips_scripts() {
        let dir = package(&[("require.js", "function r2dec_main() {}")]);
        let scripts = script_host(dir.path());
        let (mock, host) = mock_host(MockHost::default().respond(UPGRADE_COMMAND, "done\n"));

        dispatch(&scripts, &host, &route("u"));
        assert_eq!(mock.borrow().commands, vec![UPGRADE_COMMAND.to_string()]);
        assert_eq!(mock.borrow().output, "done\n");
        assert_eq!(scripts.invocations(), 0);
    }

    #[test]
    fn test_help_prints_usage() {
        let dir = package(&[]);
        let scripts = script_host(dir.path());
        let (mock, host) = mock_host(MockHost::default());

        dispatch(&scripts, &host, &route("?"));
        assert_eq!(mock.borrow().output, usage());
        assert!(mock.borrow().commands.is_empty());
        assert_eq!(scripts.invocations(), 0);
    }

    #[test]
    fn test_variants_pass_fixed_flags() {
        let dir = package(&[(
            "require.js",
            "function r2dec_main(args) { console.log(JSON.stringify(args)); }",
        )]);
        let scripts = script_host(dir.path());
        let (mock, host) = mock_host(MockHost::default());

        for input in ["a", "b", "i", " --html"] {
            dispatch(&scripts, &host, &route(input));
        }
        assert_eq!(
            mock.borrow().output,
            "[\"--assembly\"]\n[\"--blocks\"]\n[\"--issue\"]\n[\"--html\"]\n"
        );
    }
}
