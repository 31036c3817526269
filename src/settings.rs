//! Editor settings and preferences
//!
//! Each preference is read once from storage when the settings are loaded and
//! written back on every change. Keys are part of the stored format: renaming
//! one silently drops the saved value.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{ApplyError, HostError, SettingsError};
use crate::host::{GistCredentials, HostApp};
use crate::observable::SubscriptionId;
use crate::preference::{Persistence, Preference, PreferenceValue};
use crate::storage::StorageAdapter;

/// Storage keys
///
/// The host-only flag is stored as `alwaysOpenNodesInHostEditor`. Earlier
/// releases wrote it as `alwaysOpenNodesInVisualStudioCodeEditor`; values
/// saved under that name are not read.
pub mod keys {
    pub const THEME: &str = "theme";
    pub const LANGUAGE: &str = "language";
    pub const REDRAW_THROTTLE: &str = "redrawThrottle";
    pub const GIST_TOKEN: &str = "gistToken";
    pub const GIST_FILE: &str = "gistFile";
    pub const SPELLCHECK_ENABLED: &str = "spellcheckEnabled";
    pub const TRANSCRIBE_ENABLED: &str = "transcribeEnabled";
    pub const COMPLETE_TAGS_ENABLED: &str = "completeTagsEnabled";
    pub const COMPLETE_WORDS_ENABLED: &str = "completeWordsEnabled";
    pub const NIGHT_MODE_ENABLED: &str = "nightModeEnabled";
    pub const CREATE_NODES_ENABLED: &str = "createNodesEnabled";
    pub const EDITOR_STATS_ENABLED: &str = "editorStatsEnabled";
    pub const MARKUP_LANGUAGE: &str = "markupLanguage";
    pub const ALWAYS_OPEN_NODES_IN_HOST_EDITOR: &str = "alwaysOpenNodesInHostEditor";

    /// Every key that is written to storage
    pub const PERSISTED: [&str; 13] = [
        THEME,
        LANGUAGE,
        REDRAW_THROTTLE,
        GIST_TOKEN,
        GIST_FILE,
        SPELLCHECK_ENABLED,
        COMPLETE_TAGS_ENABLED,
        COMPLETE_WORDS_ENABLED,
        NIGHT_MODE_ENABLED,
        CREATE_NODES_ENABLED,
        EDITOR_STATS_ENABLED,
        MARKUP_LANGUAGE,
        ALWAYS_OPEN_NODES_IN_HOST_EDITOR,
    ];

    /// Every recognized key, persisted or not
    pub const ALL: [&str; 14] = [
        THEME,
        LANGUAGE,
        REDRAW_THROTTLE,
        GIST_TOKEN,
        GIST_FILE,
        SPELLCHECK_ENABLED,
        TRANSCRIBE_ENABLED,
        COMPLETE_TAGS_ENABLED,
        COMPLETE_WORDS_ENABLED,
        NIGHT_MODE_ENABLED,
        CREATE_NODES_ENABLED,
        EDITOR_STATS_ENABLED,
        MARKUP_LANGUAGE,
        ALWAYS_OPEN_NODES_IN_HOST_EDITOR,
    ];
}

/// Values used when storage has nothing
pub mod defaults {
    pub const THEME: &str = "classic";
    pub const LANGUAGE: &str = "en-GB";
    /// Milliseconds between workspace redraws
    pub const REDRAW_THROTTLE: u32 = 50;
    pub const SPELLCHECK_ENABLED: bool = true;
    pub const TRANSCRIBE_ENABLED: bool = false;
    pub const COMPLETE_TAGS_ENABLED: bool = true;
    pub const COMPLETE_WORDS_ENABLED: bool = true;
    pub const NIGHT_MODE_ENABLED: bool = false;
    pub const CREATE_NODES_ENABLED: bool = true;
    pub const EDITOR_STATS_ENABLED: bool = false;
    pub const MARKUP_LANGUAGE: &str = "bbcode";
    pub const ALWAYS_OPEN_NODES_IN_HOST_EDITOR: bool = false;
}

/// Live editor settings
#[derive(Debug)]
pub struct Settings {
    storage: Rc<StorageAdapter>,

    // === Appearance ===
    pub theme: Preference<String>,
    pub language: Preference<String>,
    pub night_mode_enabled: Preference<bool>,

    // === Workspace ===
    /// Milliseconds between redraws
    pub redraw_throttle: Preference<u32>,
    pub create_nodes_enabled: Preference<bool>,

    // === Gist sync ===
    pub gist_token: Preference<Option<String>>,
    pub gist_file: Preference<Option<String>>,

    // === Editor ===
    pub spellcheck_enabled: Preference<bool>,
    /// Session only, never persisted
    pub transcribe_enabled: Preference<bool>,
    pub complete_tags_enabled: Preference<bool>,
    pub complete_words_enabled: Preference<bool>,
    pub editor_stats_enabled: Preference<bool>,
    pub markup_language: Preference<String>,

    // === Host only ===
    /// Set by the embedding host; not shown in the settings menu
    pub always_open_nodes_in_host_editor: Preference<bool>,
}

impl Settings {
    /// Read every preference from storage
    pub fn load(storage: Rc<StorageAdapter>) -> Self {
        use Persistence::{Never, WriteThrough};

        let text = |key, default: &str| {
            Preference::load(key, default.to_string(), WriteThrough, Rc::clone(&storage))
        };
        let flag = |key, default: bool| {
            Preference::load(key, default, WriteThrough, Rc::clone(&storage))
        };
        let nullable = |key| {
            Preference::<Option<String>>::load(key, None, WriteThrough, Rc::clone(&storage))
        };

        let settings = Self {
            theme: text(keys::THEME, defaults::THEME),
            language: text(keys::LANGUAGE, defaults::LANGUAGE),
            night_mode_enabled: flag(keys::NIGHT_MODE_ENABLED, defaults::NIGHT_MODE_ENABLED),

            redraw_throttle: Preference::load(
                keys::REDRAW_THROTTLE,
                defaults::REDRAW_THROTTLE,
                WriteThrough,
                Rc::clone(&storage),
            ),
            create_nodes_enabled: flag(keys::CREATE_NODES_ENABLED, defaults::CREATE_NODES_ENABLED),

            gist_token: nullable(keys::GIST_TOKEN),
            gist_file: nullable(keys::GIST_FILE),

            spellcheck_enabled: flag(keys::SPELLCHECK_ENABLED, defaults::SPELLCHECK_ENABLED),
            transcribe_enabled: Preference::load(
                keys::TRANSCRIBE_ENABLED,
                defaults::TRANSCRIBE_ENABLED,
                Never,
                Rc::clone(&storage),
            ),
            complete_tags_enabled: flag(
                keys::COMPLETE_TAGS_ENABLED,
                defaults::COMPLETE_TAGS_ENABLED,
            ),
            complete_words_enabled: flag(
                keys::COMPLETE_WORDS_ENABLED,
                defaults::COMPLETE_WORDS_ENABLED,
            ),
            editor_stats_enabled: flag(keys::EDITOR_STATS_ENABLED, defaults::EDITOR_STATS_ENABLED),
            markup_language: text(keys::MARKUP_LANGUAGE, defaults::MARKUP_LANGUAGE),

            always_open_nodes_in_host_editor: flag(
                keys::ALWAYS_OPEN_NODES_IN_HOST_EDITOR,
                defaults::ALWAYS_OPEN_NODES_IN_HOST_EDITOR,
            ),

            storage: Rc::clone(&storage),
        };

        log::info!(
            "Loaded settings ({} storage): theme={}, language={}, markup={}",
            settings.storage.mode().as_str(),
            settings.theme.get(),
            settings.language.get(),
            settings.markup_language.get()
        );
        settings
    }

    pub fn storage(&self) -> &StorageAdapter {
        &self.storage
    }

    /// Current gist credentials
    pub fn gist_credentials(&self) -> GistCredentials {
        GistCredentials {
            token: self.gist_token.get().clone(),
            file: self.gist_file.get().clone(),
        }
    }

    /// Push the current values into the host application
    ///
    /// Every setter runs even if an earlier one fails; failures are logged and
    /// returned together. Night mode is toggled on every call regardless of
    /// `night_mode_enabled`.
    pub fn apply(&self, host: &mut dyn HostApp) -> Result<(), ApplyError> {
        let mut failures = Vec::new();
        let mut record = |result: Result<(), HostError>| {
            if let Err(e) = result {
                log::warn!("Applying settings: {}", e);
                failures.push(e);
            }
        };

        record(host.set_theme(self.theme.get()));
        record(host.set_language(self.language.get()));
        record(host.toggle_night_mode());
        record(host.set_markup_language(self.markup_language.get()));
        record(match host.workspace_mut() {
            Some(workspace) => workspace.set_throttle(*self.redraw_throttle.get()),
            None => Err(HostError::Unsupported("workspace.setThrottle")),
        });
        record(host.set_gist_credentials(self.gist_credentials()));

        if failures.is_empty() {
            log::info!("Settings applied");
            Ok(())
        } else {
            Err(ApplyError { failures })
        }
    }

    /// Copy of every current value
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            theme: self.theme.get().clone(),
            language: self.language.get().clone(),
            redraw_throttle: *self.redraw_throttle.get(),
            gist_token: self.gist_token.get().clone(),
            gist_file: self.gist_file.get().clone(),
            spellcheck_enabled: *self.spellcheck_enabled.get(),
            transcribe_enabled: *self.transcribe_enabled.get(),
            complete_tags_enabled: *self.complete_tags_enabled.get(),
            complete_words_enabled: *self.complete_words_enabled.get(),
            night_mode_enabled: *self.night_mode_enabled.get(),
            create_nodes_enabled: *self.create_nodes_enabled.get(),
            editor_stats_enabled: *self.editor_stats_enabled.get(),
            markup_language: self.markup_language.get().clone(),
            always_open_nodes_in_host_editor: *self.always_open_nodes_in_host_editor.get(),
        }
    }

    /// Assign the fields present in `patch` through the normal setters
    ///
    /// Fields left out of the patch are untouched. Changed values notify
    /// subscribers and persist as usual. Returns the number of preferences
    /// that changed.
    pub fn update(&mut self, patch: SettingsPatch) -> usize {
        fn assign<T: PreferenceValue>(pref: &mut Preference<T>, value: Option<T>) -> bool {
            value.is_some_and(|v| pref.set(v))
        }

        let changed = [
            assign(&mut self.theme, patch.theme),
            assign(&mut self.language, patch.language),
            assign(&mut self.redraw_throttle, patch.redraw_throttle),
            assign(&mut self.gist_token, patch.gist_token),
            assign(&mut self.gist_file, patch.gist_file),
            assign(&mut self.spellcheck_enabled, patch.spellcheck_enabled),
            assign(&mut self.transcribe_enabled, patch.transcribe_enabled),
            assign(&mut self.complete_tags_enabled, patch.complete_tags_enabled),
            assign(&mut self.complete_words_enabled, patch.complete_words_enabled),
            assign(&mut self.night_mode_enabled, patch.night_mode_enabled),
            assign(&mut self.create_nodes_enabled, patch.create_nodes_enabled),
            assign(&mut self.editor_stats_enabled, patch.editor_stats_enabled),
            assign(&mut self.markup_language, patch.markup_language),
            assign(
                &mut self.always_open_nodes_in_host_editor,
                patch.always_open_nodes_in_host_editor,
            ),
        ];
        changed.iter().filter(|c| **c).count()
    }

    /// Assign every default through the normal setters
    pub fn reset_to_defaults(&mut self) -> usize {
        self.update(SettingsSnapshot::default().into())
    }

    /// Current value of one preference as JSON
    pub fn get_value(&self, key: &str) -> Result<serde_json::Value, SettingsError> {
        let known = keys::ALL.contains(&key);
        serde_json::to_value(self.snapshot())
            .ok()
            .and_then(|mut all| all.get_mut(key).map(serde_json::Value::take))
            .filter(|_| known)
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
    }

    /// Assign one preference from a JSON value
    ///
    /// Returns `true` if the value changed (and was persisted).
    pub fn set_value(
        &mut self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<bool, SettingsError> {
        if !keys::ALL.contains(&key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        let mut fields = serde_json::Map::new();
        fields.insert(key.to_string(), value);
        let patch: SettingsPatch = serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|e| SettingsError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(self.update(patch) > 0)
    }

    /// Run `callback` with the new value (as JSON) whenever `key` changes
    pub fn subscribe_value(
        &mut self,
        key: &str,
        callback: impl FnMut(&serde_json::Value) + 'static,
    ) -> Result<SubscriptionId, SettingsError> {
        let callback: JsonCallback = Box::new(callback);
        let id = match key {
            keys::THEME => watch(&mut self.theme, callback),
            keys::LANGUAGE => watch(&mut self.language, callback),
            keys::REDRAW_THROTTLE => watch(&mut self.redraw_throttle, callback),
            keys::GIST_TOKEN => watch(&mut self.gist_token, callback),
            keys::GIST_FILE => watch(&mut self.gist_file, callback),
            keys::SPELLCHECK_ENABLED => watch(&mut self.spellcheck_enabled, callback),
            keys::TRANSCRIBE_ENABLED => watch(&mut self.transcribe_enabled, callback),
            keys::COMPLETE_TAGS_ENABLED => watch(&mut self.complete_tags_enabled, callback),
            keys::COMPLETE_WORDS_ENABLED => watch(&mut self.complete_words_enabled, callback),
            keys::NIGHT_MODE_ENABLED => watch(&mut self.night_mode_enabled, callback),
            keys::CREATE_NODES_ENABLED => watch(&mut self.create_nodes_enabled, callback),
            keys::EDITOR_STATS_ENABLED => watch(&mut self.editor_stats_enabled, callback),
            keys::MARKUP_LANGUAGE => watch(&mut self.markup_language, callback),
            keys::ALWAYS_OPEN_NODES_IN_HOST_EDITOR => {
                watch(&mut self.always_open_nodes_in_host_editor, callback)
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        };
        Ok(id)
    }

    /// Drop a subscription made with [`Settings::subscribe_value`]
    pub fn unsubscribe_value(&mut self, key: &str, id: SubscriptionId) -> bool {
        match key {
            keys::THEME => self.theme.unsubscribe(id),
            keys::LANGUAGE => self.language.unsubscribe(id),
            keys::REDRAW_THROTTLE => self.redraw_throttle.unsubscribe(id),
            keys::GIST_TOKEN => self.gist_token.unsubscribe(id),
            keys::GIST_FILE => self.gist_file.unsubscribe(id),
            keys::SPELLCHECK_ENABLED => self.spellcheck_enabled.unsubscribe(id),
            keys::TRANSCRIBE_ENABLED => self.transcribe_enabled.unsubscribe(id),
            keys::COMPLETE_TAGS_ENABLED => self.complete_tags_enabled.unsubscribe(id),
            keys::COMPLETE_WORDS_ENABLED => self.complete_words_enabled.unsubscribe(id),
            keys::NIGHT_MODE_ENABLED => self.night_mode_enabled.unsubscribe(id),
            keys::CREATE_NODES_ENABLED => self.create_nodes_enabled.unsubscribe(id),
            keys::EDITOR_STATS_ENABLED => self.editor_stats_enabled.unsubscribe(id),
            keys::MARKUP_LANGUAGE => self.markup_language.unsubscribe(id),
            keys::ALWAYS_OPEN_NODES_IN_HOST_EDITOR => {
                self.always_open_nodes_in_host_editor.unsubscribe(id)
            }
            _ => false,
        }
    }
}

type JsonCallback = Box<dyn FnMut(&serde_json::Value)>;

fn watch<T>(pref: &mut Preference<T>, mut callback: JsonCallback) -> SubscriptionId
where
    T: PreferenceValue + Serialize,
{
    log::debug!("Watching setting {}", pref.key());
    pref.subscribe(move |value| match serde_json::to_value(value) {
        Ok(json) => callback(&json),
        Err(e) => log::warn!("Cannot report setting change: {}", e),
    })
}

/// Plain copy of all settings, keyed like storage
///
/// Missing fields deserialize to their defaults. To change only some
/// settings, use [`SettingsPatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsSnapshot {
    pub theme: String,
    pub language: String,
    pub redraw_throttle: u32,
    pub gist_token: Option<String>,
    pub gist_file: Option<String>,
    pub spellcheck_enabled: bool,
    pub transcribe_enabled: bool,
    pub complete_tags_enabled: bool,
    pub complete_words_enabled: bool,
    pub night_mode_enabled: bool,
    pub create_nodes_enabled: bool,
    pub editor_stats_enabled: bool,
    pub markup_language: String,
    pub always_open_nodes_in_host_editor: bool,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            theme: defaults::THEME.to_string(),
            language: defaults::LANGUAGE.to_string(),
            redraw_throttle: defaults::REDRAW_THROTTLE,
            gist_token: None,
            gist_file: None,
            spellcheck_enabled: defaults::SPELLCHECK_ENABLED,
            transcribe_enabled: defaults::TRANSCRIBE_ENABLED,
            complete_tags_enabled: defaults::COMPLETE_TAGS_ENABLED,
            complete_words_enabled: defaults::COMPLETE_WORDS_ENABLED,
            night_mode_enabled: defaults::NIGHT_MODE_ENABLED,
            create_nodes_enabled: defaults::CREATE_NODES_ENABLED,
            editor_stats_enabled: defaults::EDITOR_STATS_ENABLED,
            markup_language: defaults::MARKUP_LANGUAGE.to_string(),
            always_open_nodes_in_host_editor: defaults::ALWAYS_OPEN_NODES_IN_HOST_EDITOR,
        }
    }
}

/// A partial update: only the fields present are assigned
///
/// For the nullable gist fields, a missing field leaves the value alone while
/// an explicit `null` clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SettingsPatch {
    pub theme: Option<String>,
    pub language: Option<String>,
    pub redraw_throttle: Option<u32>,
    #[serde(deserialize_with = "present")]
    pub gist_token: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub gist_file: Option<Option<String>>,
    pub spellcheck_enabled: Option<bool>,
    pub transcribe_enabled: Option<bool>,
    pub complete_tags_enabled: Option<bool>,
    pub complete_words_enabled: Option<bool>,
    pub night_mode_enabled: Option<bool>,
    pub create_nodes_enabled: Option<bool>,
    pub editor_stats_enabled: Option<bool>,
    pub markup_language: Option<String>,
    pub always_open_nodes_in_host_editor: Option<bool>,
}

/// Present field (possibly `null`) becomes `Some`
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<SettingsSnapshot> for SettingsPatch {
    fn from(snapshot: SettingsSnapshot) -> Self {
        Self {
            theme: Some(snapshot.theme),
            language: Some(snapshot.language),
            redraw_throttle: Some(snapshot.redraw_throttle),
            gist_token: Some(snapshot.gist_token),
            gist_file: Some(snapshot.gist_file),
            spellcheck_enabled: Some(snapshot.spellcheck_enabled),
            transcribe_enabled: Some(snapshot.transcribe_enabled),
            complete_tags_enabled: Some(snapshot.complete_tags_enabled),
            complete_words_enabled: Some(snapshot.complete_words_enabled),
            night_mode_enabled: Some(snapshot.night_mode_enabled),
            create_nodes_enabled: Some(snapshot.create_nodes_enabled),
            editor_stats_enabled: Some(snapshot.editor_stats_enabled),
            markup_language: Some(snapshot.markup_language),
            always_open_nodes_in_host_editor: Some(snapshot.always_open_nodes_in_host_editor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Workspace;
    use crate::storage::{MemoryStorage, StorageMode};
    use proptest::prelude::*;
    use std::cell::RefCell;

    const FLAGS: [(&str, bool); 7] = [
        (keys::SPELLCHECK_ENABLED, defaults::SPELLCHECK_ENABLED),
        (keys::COMPLETE_TAGS_ENABLED, defaults::COMPLETE_TAGS_ENABLED),
        (keys::COMPLETE_WORDS_ENABLED, defaults::COMPLETE_WORDS_ENABLED),
        (keys::NIGHT_MODE_ENABLED, defaults::NIGHT_MODE_ENABLED),
        (keys::CREATE_NODES_ENABLED, defaults::CREATE_NODES_ENABLED),
        (keys::EDITOR_STATS_ENABLED, defaults::EDITOR_STATS_ENABLED),
        (
            keys::ALWAYS_OPEN_NODES_IN_HOST_EDITOR,
            defaults::ALWAYS_OPEN_NODES_IN_HOST_EDITOR,
        ),
    ];

    fn load(memory: &MemoryStorage) -> Settings {
        Settings::load(Rc::new(StorageAdapter::standalone(memory.clone())))
    }

    fn flag_value(settings: &Settings, key: &str) -> bool {
        let pref = match key {
            keys::SPELLCHECK_ENABLED => &settings.spellcheck_enabled,
            keys::COMPLETE_TAGS_ENABLED => &settings.complete_tags_enabled,
            keys::COMPLETE_WORDS_ENABLED => &settings.complete_words_enabled,
            keys::NIGHT_MODE_ENABLED => &settings.night_mode_enabled,
            keys::CREATE_NODES_ENABLED => &settings.create_nodes_enabled,
            keys::EDITOR_STATS_ENABLED => &settings.editor_stats_enabled,
            keys::ALWAYS_OPEN_NODES_IN_HOST_EDITOR => &settings.always_open_nodes_in_host_editor,
            other => panic!("not a flag: {}", other),
        };
        *pref.get()
    }

    /// Host that records every call
    #[derive(Default)]
    struct RecordingHost {
        calls: Vec<String>,
        workspace: RecordingWorkspace,
        fail_theme: bool,
        no_workspace: bool,
    }

    #[derive(Default)]
    struct RecordingWorkspace {
        throttles: Vec<u32>,
    }

    impl Workspace for RecordingWorkspace {
        fn set_throttle(&mut self, ms: u32) -> Result<(), HostError> {
            self.throttles.push(ms);
            Ok(())
        }
    }

    impl HostApp for RecordingHost {
        fn set_theme(&mut self, name: &str) -> Result<(), HostError> {
            self.calls.push(format!("setTheme({})", name));
            if self.fail_theme {
                return Err(HostError::Failed {
                    setter: "setTheme",
                    message: "unknown theme".to_string(),
                });
            }
            Ok(())
        }

        fn set_language(&mut self, code: &str) -> Result<(), HostError> {
            self.calls.push(format!("setLanguage({})", code));
            Ok(())
        }

        fn toggle_night_mode(&mut self) -> Result<(), HostError> {
            self.calls.push("toggleNightMode()".to_string());
            Ok(())
        }

        fn set_markup_language(&mut self, name: &str) -> Result<(), HostError> {
            self.calls.push(format!("setMarkupLanguage({})", name));
            Ok(())
        }

        fn set_gist_credentials(&mut self, credentials: GistCredentials) -> Result<(), HostError> {
            self.calls.push(format!(
                "setGistCredentials({:?}, {:?})",
                credentials.token, credentials.file
            ));
            Ok(())
        }

        fn workspace_mut(&mut self) -> Option<&mut dyn Workspace> {
            if self.no_workspace {
                None
            } else {
                Some(&mut self.workspace)
            }
        }
    }

    /// Host that implements nothing
    struct BareHost;

    impl HostApp for BareHost {}

    #[test]
    fn test_defaults_from_empty_storage() {
        let memory = MemoryStorage::new();
        let settings = load(&memory);

        assert_eq!(settings.snapshot(), SettingsSnapshot::default());
        assert_eq!(settings.theme.get(), "classic");
        assert_eq!(settings.language.get(), "en-GB");
        assert_eq!(*settings.redraw_throttle.get(), 50);
        assert_eq!(*settings.gist_token.get(), None);
        assert_eq!(*settings.gist_file.get(), None);
        assert_eq!(settings.markup_language.get(), "bbcode");
        assert!(!*settings.transcribe_enabled.get());
        assert!(memory.writes().is_empty());
    }

    #[test]
    fn test_flags_absent_true_and_other() {
        for (key, default) in FLAGS {
            let absent = load(&MemoryStorage::new());
            assert_eq!(flag_value(&absent, key), default, "{} absent", key);

            let on = load(&MemoryStorage::with_entries([(key, "true")]));
            assert!(flag_value(&on, key), "{} = true", key);

            let off = load(&MemoryStorage::with_entries([(key, "false")]));
            assert!(!flag_value(&off, key), "{} = false", key);

            let junk = load(&MemoryStorage::with_entries([(key, "yes")]));
            assert!(!flag_value(&junk, key), "{} = yes", key);
        }
    }

    #[test]
    fn test_redraw_throttle_parsing() {
        let settings = load(&MemoryStorage::with_entries([(keys::REDRAW_THROTTLE, "120")]));
        assert_eq!(*settings.redraw_throttle.get(), 120);

        let settings = load(&MemoryStorage::with_entries([(keys::REDRAW_THROTTLE, "soon")]));
        assert_eq!(*settings.redraw_throttle.get(), 50);
    }

    #[test]
    fn test_theme_change_persists_once_and_reloads() {
        let memory = MemoryStorage::new();
        let mut settings = load(&memory);

        settings.theme.set("dark".to_string());

        assert_eq!(
            memory.writes(),
            vec![("theme".to_string(), Some("dark".to_string()))]
        );
        let reloaded = load(&memory);
        assert_eq!(reloaded.theme.get(), "dark");
    }

    #[test]
    fn test_values_encode_as_strings() {
        let memory = MemoryStorage::new();
        let mut settings = load(&memory);

        settings.redraw_throttle.set(75);
        settings.spellcheck_enabled.set(false);
        settings.gist_token.set(Some("ghp_123".to_string()));

        assert_eq!(
            memory.writes(),
            vec![
                ("redrawThrottle".to_string(), Some("75".to_string())),
                ("spellcheckEnabled".to_string(), Some("false".to_string())),
                ("gistToken".to_string(), Some("ghp_123".to_string())),
            ]
        );
        let reloaded = load(&memory);
        assert_eq!(reloaded.snapshot(), settings.snapshot());
    }

    #[test]
    fn test_transcribe_never_persisted() {
        let memory = MemoryStorage::with_entries([(keys::TRANSCRIBE_ENABLED, "true")]);
        let mut settings = load(&memory);
        assert!(!*settings.transcribe_enabled.get());

        for i in 0..10 {
            settings.transcribe_enabled.set(i % 2 == 0);
        }

        assert!(memory.writes_for(keys::TRANSCRIBE_ENABLED).is_empty());
        assert!(memory.writes().is_empty());
    }

    #[test]
    fn test_host_managed_reads_and_writes_nothing() {
        let memory = MemoryStorage::with_entries([
            (keys::THEME, "dark"),
            (keys::REDRAW_THROTTLE, "200"),
            (keys::SPELLCHECK_ENABLED, "false"),
        ]);
        let adapter = StorageAdapter::with_backend(StorageMode::HostManaged, memory.clone());
        let mut settings = Settings::load(Rc::new(adapter));

        assert_eq!(settings.snapshot(), SettingsSnapshot::default());

        settings.theme.set("midnight".to_string());
        settings.redraw_throttle.set(10);
        settings.gist_file.set(Some("story.yarn".to_string()));
        settings.gist_file.set(None);

        assert_eq!(memory.reads(), 0);
        assert!(memory.writes().is_empty());
    }

    #[test]
    fn test_apply_calls_each_setter_once() {
        let memory = MemoryStorage::with_entries([
            (keys::THEME, "dark"),
            (keys::LANGUAGE, "de-DE"),
            (keys::MARKUP_LANGUAGE, "html"),
            (keys::REDRAW_THROTTLE, "30"),
            (keys::GIST_TOKEN, "tok"),
            (keys::GIST_FILE, "file.json"),
        ]);
        let settings = load(&memory);
        let mut host = RecordingHost::default();

        settings.apply(&mut host).unwrap();

        assert_eq!(
            host.calls,
            vec![
                "setTheme(dark)",
                "setLanguage(de-DE)",
                "toggleNightMode()",
                "setMarkupLanguage(html)",
                "setGistCredentials(Some(\"tok\"), Some(\"file.json\"))",
            ]
        );
        assert_eq!(host.workspace.throttles, vec![30]);
    }

    #[test]
    fn test_apply_toggles_night_mode_every_time() {
        let memory = MemoryStorage::with_entries([(keys::NIGHT_MODE_ENABLED, "false")]);
        let settings = load(&memory);
        let mut host = RecordingHost::default();

        settings.apply(&mut host).unwrap();
        settings.apply(&mut host).unwrap();

        let toggles = host.calls.iter().filter(|c| *c == "toggleNightMode()").count();
        assert_eq!(toggles, 2);
    }

    #[test]
    fn test_apply_continues_past_failures() {
        let settings = load(&MemoryStorage::new());
        let mut host = RecordingHost {
            fail_theme: true,
            no_workspace: true,
            ..Default::default()
        };

        let err = settings.apply(&mut host).unwrap_err();

        let failed: Vec<_> = err.failures.iter().map(|f| f.setter()).collect();
        assert_eq!(failed, vec!["setTheme", "workspace.setThrottle"]);
        assert_eq!(host.calls.len(), 5);
    }

    #[test]
    fn test_apply_on_bare_host_reports_every_setter() {
        let settings = load(&MemoryStorage::new());

        let err = settings.apply(&mut BareHost).unwrap_err();

        assert_eq!(err.failures.len(), 6);
        assert!(err
            .failures
            .iter()
            .all(|f| matches!(f, HostError::Unsupported(_))));
    }

    #[test]
    fn test_update_from_snapshot_persists_changes() {
        let memory = MemoryStorage::new();
        let mut settings = load(&memory);
        let snapshot = SettingsSnapshot {
            theme: "dark".to_string(),
            transcribe_enabled: true,
            ..Default::default()
        };

        assert_eq!(settings.update(snapshot.into()), 2);

        assert_eq!(
            memory.writes(),
            vec![("theme".to_string(), Some("dark".to_string()))]
        );
        assert!(*settings.transcribe_enabled.get());
    }

    #[test]
    fn test_partial_update_leaves_other_keys_alone() {
        let memory = MemoryStorage::with_entries([
            (keys::GIST_TOKEN, "ghp_secret"),
            (keys::LANGUAGE, "de-DE"),
            (keys::SPELLCHECK_ENABLED, "false"),
        ]);
        let mut settings = load(&memory);
        let patch: SettingsPatch = serde_json::from_str(r#"{"theme":"dark"}"#).unwrap();

        assert_eq!(settings.update(patch), 1);

        assert_eq!(
            memory.writes(),
            vec![("theme".to_string(), Some("dark".to_string()))]
        );
        let reloaded = load(&memory);
        assert_eq!(reloaded.gist_token.get().as_deref(), Some("ghp_secret"));
        assert_eq!(reloaded.language.get(), "de-DE");
        assert!(!*reloaded.spellcheck_enabled.get());
    }

    #[test]
    fn test_patch_null_clears_nullable() {
        let memory = MemoryStorage::with_entries([
            (keys::GIST_TOKEN, "ghp_secret"),
            (keys::GIST_FILE, "story.yarn"),
        ]);
        let mut settings = load(&memory);
        let patch: SettingsPatch = serde_json::from_str(r#"{"gistToken":null}"#).unwrap();

        assert_eq!(patch.gist_token, Some(None));
        assert_eq!(patch.gist_file, None);
        assert_eq!(settings.update(patch), 1);

        assert_eq!(memory.writes(), vec![("gistToken".to_string(), None)]);
        assert_eq!(settings.gist_file.get().as_deref(), Some("story.yarn"));
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let result = serde_json::from_str::<SettingsPatch>(r#"{"colour":"red"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_and_set_value_by_key() {
        let memory = MemoryStorage::new();
        let mut settings = load(&memory);

        assert_eq!(
            settings.get_value(keys::REDRAW_THROTTLE).unwrap(),
            serde_json::json!(50)
        );
        assert_eq!(settings.get_value(keys::GIST_TOKEN).unwrap(), serde_json::Value::Null);

        assert!(settings.set_value(keys::REDRAW_THROTTLE, serde_json::json!(120)).unwrap());
        assert!(!settings.set_value(keys::REDRAW_THROTTLE, serde_json::json!(120)).unwrap());

        assert_eq!(
            memory.writes(),
            vec![("redrawThrottle".to_string(), Some("120".to_string()))]
        );
        assert_eq!(*settings.redraw_throttle.get(), 120);
    }

    #[test]
    fn test_set_value_errors() {
        let mut settings = load(&MemoryStorage::new());

        assert_eq!(
            settings.set_value("colour", serde_json::json!("red")),
            Err(SettingsError::UnknownKey("colour".to_string()))
        );
        assert!(matches!(
            settings.set_value(keys::SPELLCHECK_ENABLED, serde_json::json!("yes")),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(
            settings.get_value("colour"),
            Err(SettingsError::UnknownKey("colour".to_string()))
        );
        assert!(*settings.spellcheck_enabled.get());
    }

    #[test]
    fn test_subscribe_value_reports_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut settings = load(&MemoryStorage::new());
        let sink = Rc::clone(&seen);
        let id = settings
            .subscribe_value(keys::THEME, move |v| sink.borrow_mut().push(v.clone()))
            .unwrap();

        settings.theme.set("dark".to_string());
        settings.language.set("fr-FR".to_string());
        assert!(settings.unsubscribe_value(keys::THEME, id));
        settings.theme.set("classic".to_string());

        assert_eq!(*seen.borrow(), vec![serde_json::json!("dark")]);
        assert!(settings.subscribe_value("colour", |_| {}).is_err());
    }

    #[test]
    fn test_preferences_carry_their_keys_and_defaults() {
        let settings = load(&MemoryStorage::with_entries([(keys::THEME, "dark")]));

        assert_eq!(settings.theme.key(), keys::THEME);
        assert_eq!(settings.theme.default_value(), defaults::THEME);
        assert_eq!(settings.theme.get(), "dark");
        assert_eq!(settings.transcribe_enabled.persistence(), Persistence::Never);
        assert_eq!(settings.gist_token.persistence(), Persistence::WriteThrough);
    }

    #[test]
    fn test_reset_to_defaults() {
        let memory = MemoryStorage::with_entries([
            (keys::THEME, "dark"),
            (keys::EDITOR_STATS_ENABLED, "true"),
        ]);
        let mut settings = load(&memory);

        assert_eq!(settings.reset_to_defaults(), 2);
        assert_eq!(settings.snapshot(), SettingsSnapshot::default());
        assert_eq!(load(&memory).snapshot(), SettingsSnapshot::default());
    }

    #[test]
    fn test_snapshot_json_uses_storage_keys() {
        let settings = load(&MemoryStorage::new());
        let json = serde_json::to_value(settings.snapshot()).unwrap();

        for key in keys::PERSISTED {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json.get(keys::TRANSCRIBE_ENABLED).is_some());
    }

    #[test]
    fn test_partial_snapshot_json_fills_defaults() {
        let snapshot: SettingsSnapshot =
            serde_json::from_str(r#"{"theme":"dark","redrawThrottle":90}"#).unwrap();

        assert_eq!(snapshot.theme, "dark");
        assert_eq!(snapshot.redraw_throttle, 90);
        assert_eq!(snapshot.language, defaults::LANGUAGE);
        assert!(snapshot.spellcheck_enabled);
    }

    proptest! {
        #[test]
        fn prop_stored_flag_is_true_only_for_literal(value in ".*") {
            let memory = MemoryStorage::with_entries([(keys::SPELLCHECK_ENABLED, value.clone())]);
            let settings = load(&memory);
            prop_assert_eq!(*settings.spellcheck_enabled.get(), value == "true");
        }
    }
}
