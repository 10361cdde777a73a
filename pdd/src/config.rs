//! `r2dec.*` evaluable variables.
//!
//! The plugin registers six preferences once at init; after that the host's
//! generic `e key=value` mechanism owns them and the scripts read them back
//! through `r2cmd("e r2dec.<name>")`.

use std::collections::BTreeMap;

use log::debug;

use crate::error::ConfigError;

/// Common prefix of every key owned by the plugin.
pub const KEY_PREFIX: &str = "r2dec.";

/// A preference definition: key, default value and help text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preference {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

/// The fixed preference set. Boolean keys default to `"false"`.
pub const PREFERENCES: [Preference; 6] = [
    Preference {
        key: "r2dec.casts",
        default: "false",
        description: "if false, hides all casts in the pseudo code.",
    },
    Preference {
        key: "r2dec.asm",
        default: "false",
        description: "if true, shows pseudo next to the assembly.",
    },
    Preference {
        key: "r2dec.blocks",
        default: "false",
        description: "if true, shows only scopes blocks.",
    },
    Preference {
        key: "r2dec.xrefs",
        default: "false",
        description: "if true, shows all xrefs in the pseudo code.",
    },
    Preference {
        key: "r2dec.paddr",
        default: "false",
        description: "if true, all xrefs uses physical addresses compare.",
    },
    Preference {
        key: "r2dec.theme",
        default: "default",
        description: "defines the color theme to be used on r2dec.",
    },
];

/// The host's generic preference mechanism.
///
/// Creating a key with a `true`/`false` value makes it a boolean key; later
/// writes to it must stay boolean. While locked, unknown keys are rejected.
pub trait PreferenceStore {
    fn lock(&mut self, locked: bool);
    fn is_locked(&self) -> bool;
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError>;
    fn describe(&mut self, key: &str, description: &str) -> Result<(), ConfigError>;
}

/// Creates the `r2dec.*` keys with their defaults, then locks the store.
///
/// The store is relocked even when one of the keys fails to register.
pub fn register(store: &mut dyn PreferenceStore) -> Result<(), ConfigError> {
    store.lock(false);
    let result = PREFERENCES.iter().try_for_each(|pref| {
        store.set(pref.key, pref.default)?;
        store.describe(pref.key, pref.description)
    });
    store.lock(true);
    debug!("registered {} r2dec preferences", PREFERENCES.len());
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceKind {
    Bool,
    Str,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    kind: PreferenceKind,
    description: String,
}

/// In-memory [`PreferenceStore`].
#[derive(Debug, Default)]
pub struct Preferences {
    entries: BTreeMap<String, Entry>,
    locked: bool,
}

/// `true`/`1` and `false`/`0`, nothing else.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let entry = self.entries.get(key)?;
        match entry.kind {
            PreferenceKind::Bool => parse_bool(&entry.value),
            PreferenceKind::Str => None,
        }
    }

    pub fn kind(&self, key: &str) -> Option<PreferenceKind> {
        self.entries.get(key).map(|entry| entry.kind)
    }

    pub fn description(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.description.as_str())
    }

    /// Keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.value.as_str()))
    }
}

impl PreferenceStore for Preferences {
    fn lock(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = match entry.kind {
                PreferenceKind::Bool => match parse_bool(value) {
                    Some(flag) => flag.to_string(),
                    None => {
                        return Err(ConfigError::NotBoolean {
                            key: key.to_string(),
                            value: value.to_string(),
                        })
                    }
                },
                PreferenceKind::Str => value.to_string(),
            };
            return Ok(());
        }

        if self.locked {
            return Err(ConfigError::Locked(key.to_string()));
        }
        let kind = match value {
            "true" | "false" => PreferenceKind::Bool,
            _ => PreferenceKind::Str,
        };
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                kind,
                description: String::new(),
            },
        );
        Ok(())
    }

    fn describe(&mut self, key: &str, description: &str) -> Result<(), ConfigError> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.description = description.to_string();
                Ok(())
            }
            None => Err(ConfigError::UnknownKey(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> Preferences {
        let mut prefs = Preferences::new();
        register(&mut prefs).unwrap();
        prefs
    }

    #[test]
    fn test_register_defaults() {
        let prefs = registered();
        assert!(prefs.is_locked());
        assert_eq!(prefs.iter().count(), 6);

        for pref in PREFERENCES {
            assert!(pref.key.starts_with(KEY_PREFIX));
            assert_eq!(prefs.get(pref.key).as_deref(), Some(pref.default));
            assert_eq!(prefs.description(pref.key), Some(pref.description));
        }
        assert_eq!(prefs.get_bool("r2dec.casts"), Some(false));
        assert_eq!(prefs.kind("r2dec.theme"), Some(PreferenceKind::Str));
        assert_eq!(prefs.get_bool("r2dec.theme"), None);
    }

    #[test]
    fn test_locked_rejects_new_keys() {
        let mut prefs = registered();
        assert_eq!(
            prefs.set("r2dec.color", "true"),
            Err(ConfigError::Locked("r2dec.color".into()))
        );
        assert_eq!(prefs.get("r2dec.color"), None);

        // Existing keys stay writable.
        prefs.set("r2dec.theme", "dark").unwrap();
        assert_eq!(prefs.get("r2dec.theme").as_deref(), Some("dark"));
    }

    #[test]
    fn test_bool_keys_only_take_bools() {
        let mut prefs = registered();
        prefs.set("r2dec.asm", "1").unwrap();
        assert_eq!(prefs.get("r2dec.asm").as_deref(), Some("true"));
        assert_eq!(prefs.get_bool("r2dec.asm"), Some(true));

        assert_eq!(
            prefs.set("r2dec.asm", "yes"),
            Err(ConfigError::NotBoolean {
                key: "r2dec.asm".into(),
                value: "yes".into()
            })
        );
        assert_eq!(prefs.get_bool("r2dec.asm"), Some(true));
    }

    #[test]
    fn test_describe_unknown_key() {
        let mut prefs = Preferences::new();
        assert_eq!(
            prefs.describe("r2dec.nope", "x"),
            Err(ConfigError::UnknownKey("r2dec.nope".into()))
        );
    }

    #[test]
    fn test_register_relocks_on_failure() {
        let mut prefs = Preferences::new();
        prefs.set("r2dec.theme", "true").unwrap();

        // r2dec.theme already exists as a boolean, so its string default fails.
        assert_eq!(
            register(&mut prefs),
            Err(ConfigError::NotBoolean {
                key: "r2dec.theme".into(),
                value: "default".into()
            })
        );
        assert!(prefs.is_locked());
        assert_eq!(prefs.get("r2dec.asm").as_deref(), Some("false"));
    }
}
