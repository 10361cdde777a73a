// pdd/src/resolver.rs
//! Script module lookup.
//!
//! Modules live under one base directory: `$R2DEC_HOME` when set, otherwise
//! the r2pm checkout inside the user data directory
//! (`~/.local/share/radare2/r2pm/git/r2dec-js` on Linux). Files are read
//! fresh on every request so edits show up on the next `pdd`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::ResolveError;

/// Environment variable overriding the script package root.
pub const HOME_ENV: &str = "R2DEC_HOME";

/// Package location relative to the user data directory.
pub const INSTALL_SUBDIR: [&str; 4] = ["radare2", "r2pm", "git", "r2dec-js"];

/// Extension appended by `require`.
pub const SCRIPT_EXT: &str = ".js";

/// How a module name maps onto a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Name used verbatim (`require.js`).
    Load,
    /// Script extension appended (`libdec/libdec` -> `libdec/libdec.js`).
    Require,
}

impl ModuleKind {
    pub fn file_name(self, name: &str) -> String {
        match self {
            ModuleKind::Load => name.to_string(),
            ModuleKind::Require => format!("{name}{SCRIPT_EXT}"),
        }
    }
}

/// One module's source, read from disk for a single evaluation.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// File name relative to the base directory.
    pub file: String,
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone)]
enum Base {
    /// Looked up from the process environment on every read.
    Environment,
    Fixed(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ModuleResolver {
    base: Base,
}

/// Picks the package root: a non-empty override wins over the data directory.
pub fn resolve_base(override_dir: Option<OsString>, data_dir: Option<PathBuf>) -> Option<PathBuf> {
    match override_dir {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => data_dir.map(|dir| INSTALL_SUBDIR.iter().fold(dir, |path, part| path.join(part))),
    }
}

impl ModuleResolver {
    /// Resolver honouring `R2DEC_HOME` and the default install path.
    pub fn from_env() -> Self {
        Self { base: Base::Environment }
    }

    /// Resolver rooted at a fixed directory, ignoring the environment.
    pub fn with_base(dir: impl Into<PathBuf>) -> Self {
        Self {
            base: Base::Fixed(dir.into()),
        }
    }

    pub fn base_dir(&self) -> Option<PathBuf> {
        match &self.base {
            Base::Environment => resolve_base(std::env::var_os(HOME_ENV), dirs::data_dir()),
            Base::Fixed(dir) => Some(dir.clone()),
        }
    }

    pub fn path_for(&self, name: &str, kind: ModuleKind) -> Result<PathBuf, ResolveError> {
        let file = kind.file_name(name);
        match self.base_dir() {
            Some(base) => Ok(base.join(file)),
            None => Err(ResolveError::NoBaseDir { name: file }),
        }
    }

    /// Reads `name` as given, e.g. the `require.js` driver.
    pub fn load(&self, name: &str) -> Result<ModuleSource, ResolveError> {
        self.read(name, ModuleKind::Load)
    }

    /// Reads `name` with the script extension appended.
    pub fn require(&self, name: &str) -> Result<ModuleSource, ResolveError> {
        self.read(name, ModuleKind::Require)
    }

    fn read(&self, name: &str, kind: ModuleKind) -> Result<ModuleSource, ResolveError> {
        let path = self.path_for(name, kind)?;
        let file = kind.file_name(name);
        debug!("load: {}", path.display());

        match fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                trace!("read {} bytes from {}", bytes.len(), path.display());
                Ok(ModuleSource {
                    file,
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                    path,
                })
            }
            Ok(_) => {
                debug!("{} is empty", path.display());
                Err(not_found(file, &path))
            }
            Err(err) => {
                debug!("cannot read {}: {}", path.display(), err);
                Err(not_found(file, &path))
            }
        }
    }
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

fn not_found(name: String, path: &Path) -> ResolveError {
    ResolveError::NotFound {
        name,
        path: path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::package;

    #[test]
    fn test_override_wins_over_data_dir() {
        let base = resolve_base(Some("/tmp/x".into()), Some(PathBuf::from("/home/u/.local/share")));
        assert_eq!(base, Some(PathBuf::from("/tmp/x")));

        let resolver = ModuleResolver::with_base(base.unwrap());
        assert_eq!(
            resolver.path_for("require.js", ModuleKind::Load).unwrap(),
            PathBuf::from("/tmp/x/require.js")
        );
    }

    #[test]
    fn test_default_install_path() {
        let base = resolve_base(None, Some(PathBuf::from("/home/u/.local/share")));
        assert_eq!(
            base,
            Some(PathBuf::from("/home/u/.local/share/radare2/r2pm/git/r2dec-js"))
        );

        // An empty override counts as unset.
        let base = resolve_base(Some(OsString::new()), Some(PathBuf::from("/data")));
        assert_eq!(base, Some(PathBuf::from("/data/radare2/r2pm/git/r2dec-js")));

        assert_eq!(resolve_base(None, None), None);
    }

    #[test]
    fn test_from_env_reads_home_variable() {
        let saved = std::env::var_os(HOME_ENV);
        let dir = package(&[("require.js", "var a = 1;")]);

        std::env::set_var(HOME_ENV, dir.path());
        let resolver = ModuleResolver::from_env();
        assert_eq!(resolver.base_dir(), Some(dir.path().to_path_buf()));
        assert_eq!(resolver.load("require.js").unwrap().text, "var a = 1;");

        // Looked up again on every call.
        std::env::set_var(HOME_ENV, "/tmp/x");
        assert_eq!(
            resolver.path_for("require.js", ModuleKind::Load).unwrap(),
            PathBuf::from("/tmp/x/require.js")
        );

        std::env::set_var(HOME_ENV, "");
        assert_eq!(resolver.base_dir(), resolve_base(None, dirs::data_dir()));

        match saved {
            Some(value) => std::env::set_var(HOME_ENV, value),
            None => std::env::remove_var(HOME_ENV),
        }
    }

    #[test]
    fn test_require_appends_extension() {
        let resolver = ModuleResolver::with_base("/opt/r2dec");
        assert_eq!(
            resolver.path_for("libdec/libdec", ModuleKind::Require).unwrap(),
            PathBuf::from("/opt/r2dec/libdec/libdec.js")
        );
        assert_eq!(
            resolver.path_for("libdec/libdec", ModuleKind::Load).unwrap(),
            PathBuf::from("/opt/r2dec/libdec/libdec")
        );
    }

    #[test]
    fn test_load_and_require_read_files() {
        let dir = package(&[("require.js", "var a = 1;"), ("libdec/util.js", "var b = 2;")]);
        let resolver = ModuleResolver::with_base(dir.path());

        let driver = resolver.load("require.js").unwrap();
        assert_eq!(driver.file, "require.js");
        assert_eq!(driver.text, "var a = 1;");

        let util = resolver.require("libdec/util").unwrap();
        assert_eq!(util.file, "libdec/util.js");
        assert_eq!(util.path, dir.path().join("libdec/util.js"));
        assert_eq!(util.text, "var b = 2;");
    }

    #[test]
    fn test_missing_and_empty_are_not_found() {
        let dir = package(&[("empty.js", "")]);
        let resolver = ModuleResolver::with_base(dir.path());

        let err = resolver.require("foo").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(err.name(), "foo.js");
        assert_eq!(err.to_string(), "'foo.js' not found");

        let err = resolver.load("empty.js").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[test]
    fn test_reads_are_not_cached() {
        let dir = package(&[("require.js", "first")]);
        let resolver = ModuleResolver::with_base(dir.path());
        assert_eq!(resolver.load("require.js").unwrap().text, "first");

        fs::write(dir.path().join("require.js"), "second").unwrap();
        assert_eq!(resolver.load("require.js").unwrap().text, "second");
    }
}
