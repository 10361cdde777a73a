//! The shell's host session: radare2 behind a [`Transport`], plus the
//! preference store and completion registry radare2 would normally own.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;

use pdd::config::{PreferenceStore, Preferences, KEY_PREFIX};
use pdd::{CompletionKind, Host, PddPlugin, SharedHost};
use tracing::{debug, warn};

use crate::r2pipe::Transport;

/// Local command listing completions for a prefix.
pub const COMPLETE_COMMAND: &str = ".complete";

#[derive(Debug, Default)]
pub struct Completions {
    entries: Vec<(Option<String>, String, CompletionKind)>,
}

impl Completions {
    pub fn add(&mut self, parent: Option<&str>, word: &str, kind: CompletionKind) {
        let entry = (parent.map(str::to_string), word.to_string(), kind);
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// `pd` lists commands; `pdd --c` lists options of `pdd`.
    pub fn complete(&self, prefix: &str) -> Vec<String> {
        let mut found: Vec<String> = match prefix.rsplit_once(' ') {
            Some((head, partial)) => {
                let parent = head.split_whitespace().next().unwrap_or_default();
                self.entries
                    .iter()
                    .filter(|(p, word, _)| p.as_deref() == Some(parent) && word.starts_with(partial))
                    .map(|(_, word, _)| format!("{head} {word}"))
                    .collect()
            }
            None => self
                .entries
                .iter()
                .filter(|(p, word, _)| p.is_none() && word.starts_with(prefix))
                .map(|(_, word, _)| word.clone())
                .collect(),
        };
        found.sort();
        found
    }
}

pub struct ShellSession<T, W> {
    transport: T,
    out: W,
    prefs: Preferences,
    completions: Completions,
}

impl<T: Transport, W: Write> ShellSession<T, W> {
    pub fn new(transport: T, out: W) -> Self {
        Self {
            transport,
            out,
            prefs: Preferences::new(),
            completions: Completions::default(),
        }
    }

    pub fn completions(&self) -> &Completions {
        &self.completions
    }

    #[cfg(test)]
    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Applies configured values on top of the registered defaults.
    pub fn apply_preferences(&mut self, values: &BTreeMap<String, String>) {
        for (key, value) in values {
            match self.prefs.set(key, value) {
                Ok(()) => debug!("{} = {}", key, value),
                Err(e) => warn!("ignoring preference {}: {}", key, e),
            }
        }
    }

    /// Serves `e r2dec.*` from the local store. `None` for anything else.
    fn preference_command(&mut self, command: &str) -> Option<String> {
        let expr = command.trim().strip_prefix("e ")?.trim();
        if !expr.starts_with(KEY_PREFIX) {
            return None;
        }

        let reply = match expr.split_once('=') {
            Some((key, value)) => match self.prefs.set(key.trim(), value.trim()) {
                Ok(()) => String::new(),
                Err(e) => format!("ERROR: {e}\n"),
            },
            None if expr.ends_with('.') => self
                .prefs
                .iter()
                .filter(|(key, _)| key.starts_with(expr))
                .map(|(key, value)| format!("{key} = {value}\n"))
                .collect(),
            None => match self.prefs.get(expr) {
                Some(value) => format!("{value}\n"),
                None => format!("ERROR: unknown config key '{expr}'\n"),
            },
        };
        Some(reply)
    }
}

impl<T: Transport, W: Write> Host for ShellSession<T, W> {
    fn cmd(&mut self, command: &str) -> String {
        if let Some(reply) = self.preference_command(command) {
            return reply;
        }
        match self.transport.cmd(command) {
            Ok(output) => output,
            Err(e) => {
                warn!("r2 command {:?} failed: {:#}", command, e);
                String::new()
            }
        }
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!("output failed: {}", e);
        }
    }

    fn config(&mut self) -> &mut dyn PreferenceStore {
        &mut self.prefs
    }

    fn autocomplete(&mut self, parent: Option<&str>, word: &str, kind: CompletionKind) {
        self.completions.add(parent, word, kind);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Runs one typed line: shell builtins first, then the plugin, then radare2.
pub fn execute<T, W>(plugin: &PddPlugin, session: &Rc<RefCell<ShellSession<T, W>>>, line: &str) -> Flow
where
    T: Transport + 'static,
    W: Write + 'static,
{
    let line = line.trim();
    match line {
        "" => return Flow::Continue,
        "q" | "quit" => return Flow::Quit,
        _ => {}
    }

    if let Some(prefix) = line.strip_prefix(COMPLETE_COMMAND) {
        let mut session = session.borrow_mut();
        let listing: String = session
            .completions()
            .complete(prefix.trim_start())
            .into_iter()
            .map(|word| word + "\n")
            .collect();
        session.print(&listing);
        return Flow::Continue;
    }

    let host: SharedHost = session.clone();
    if plugin.call(&host, line) {
        return Flow::Continue;
    }

    let mut session = session.borrow_mut();
    let output = session.cmd(line);
    session.print(&output);
    Flow::Continue
}
