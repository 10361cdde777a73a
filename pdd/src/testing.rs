//! Test fixtures: a recording host and throwaway script packages.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;

use crate::config::{PreferenceStore, Preferences};
use crate::host::{CompletionKind, Host, SharedHost};
use crate::plugin::PddPlugin;
use crate::resolver::ModuleResolver;
use crate::scripting::{ScriptHost, ScriptHostConfig};

/// Host that records every command, output and completion.
#[derive(Default)]
pub struct MockHost {
    pub commands: Vec<String>,
    pub output: String,
    pub responses: HashMap<String, String>,
    pub prefs: Preferences,
    pub completions: Vec<(Option<String>, String, CompletionKind)>,
}

impl MockHost {
    /// Canned output for `command`; anything else returns an empty string.
    pub fn respond(mut self, command: &str, output: &str) -> Self {
        self.responses.insert(command.to_string(), output.to_string());
        self
    }
}

impl Host for MockHost {
    fn cmd(&mut self, command: &str) -> String {
        self.commands.push(command.to_string());
        self.responses.get(command).cloned().unwrap_or_default()
    }

    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn config(&mut self) -> &mut dyn PreferenceStore {
        &mut self.prefs
    }

    fn autocomplete(&mut self, parent: Option<&str>, word: &str, kind: CompletionKind) {
        self.completions
            .push((parent.map(str::to_string), word.to_string(), kind));
    }
}

/// Shares `mock` as a host session and keeps a typed handle for assertions.
pub fn mock_host(mock: MockHost) -> (Rc<RefCell<MockHost>>, SharedHost) {
    let mock = Rc::new(RefCell::new(mock));
    let host: SharedHost = mock.clone();
    (mock, host)
}

/// Writes `files` (relative path, contents) into a fresh directory.
pub fn package(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }
    dir
}

pub fn script_host(dir: &Path) -> ScriptHost {
    ScriptHost::new(ModuleResolver::with_base(dir), ScriptHostConfig::default())
}

pub fn plugin(dir: &Path) -> PddPlugin {
    PddPlugin::with_script_host(script_host(dir))
}
