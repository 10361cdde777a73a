//! The host application as seen from the bridge.
//!
//! Command execution, the preference store and the autocompletion registry
//! all belong to the host; the bridge only talks to them through [`Host`].

use std::cell::RefCell;
use std::rc::Rc;

use log::warn;

use crate::config::PreferenceStore;

/// Kind of an autocompletion entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// A command word (`pdda`).
    Default,
    /// An option of a parent command (`pdd --casts`).
    Option,
}

pub trait Host {
    /// Runs a host command and returns everything it printed.
    fn cmd(&mut self, command: &str) -> String;

    /// Writes to the user-visible output stream.
    fn print(&mut self, text: &str);

    /// The host's generic preference store.
    fn config(&mut self) -> &mut dyn PreferenceStore;

    /// Registers `word` for tab completion, optionally under `parent`.
    fn autocomplete(&mut self, parent: Option<&str>, word: &str, kind: CompletionKind);
}

/// Host session shared between the command loop and the script bridge.
///
/// Single-threaded by design: the host blocks on every `pdd` command.
pub type SharedHost = Rc<RefCell<dyn Host>>;

/// Prints `line` plus a newline, dropping it if the host is mid-borrow.
pub(crate) fn print_line(host: &RefCell<dyn Host>, line: &str) {
    match host.try_borrow_mut() {
        Ok(mut host) => host.print(&format!("{line}\n")),
        Err(_) => warn!("host busy, dropped output: {line}"),
    }
}
