//! Persisted server configuration.
//!
//! The store holds the whole document in memory and writes it back after every
//! mutation. A failed save never undoes the in-memory change; it only marks the
//! store dirty so a later write or `flush` can catch up.

pub mod coerce;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};

use crate::error::{McpError, Result};

pub use coerce::{coerce, validate, ConfigKey, ConfigValue, ValueKind};

/// The configuration document: key order is preserved on save.
pub type ServerConfig = Map<String, JsonValue>;

/// Directory under the home directory holding the document.
const CONFIG_DIR: &str = ".claude-server-commander";
const CONFIG_FILE: &str = "config.json";

/// Commands refused by default.
const DEFAULT_BLOCKED_COMMANDS: &[&str] = &[
    "mkfs", "format", "mount", "umount", "fdisk", "dd", "parted", "diskpart", "sudo", "su",
    "passwd", "adduser", "useradd", "usermod", "groupadd", "chsh", "visudo", "shutdown", "reboot",
    "halt", "poweroff", "init", "iptables", "firewall", "netsh", "sfc", "bcdedit", "reg", "net",
    "sc", "runas", "cipher", "takeown",
];

/// Result of a write that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The document was written to disk.
    Saved,
    /// The value changed in memory but the document could not be saved.
    Unsaved {
        /// Why the save failed
        reason: McpError,
    },
}

impl WriteOutcome {
    /// Whether the change reached disk.
    pub fn is_saved(&self) -> bool {
        matches!(self, WriteOutcome::Saved)
    }
}

/// Owner of the configuration document.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: ServerConfig,
    dirty: bool,
    load_error: Option<McpError>,
}

impl ConfigStore {
    /// Create an empty store bound to `path`. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: ServerConfig::new(),
            dirty: false,
            load_error: None,
        }
    }

    /// Read the document from disk.
    ///
    /// Failures are recorded, not returned: the store falls back to an empty
    /// document and the cause is available from [`ConfigStore::load_error`].
    pub async fn load(&mut self) -> &ServerConfig {
        match read_document(&self.path).await {
            Ok(config) => {
                tracing::debug!("Loaded {} config keys from {}", config.len(), self.path.display());
                self.config = config;
                self.load_error = None;
            }
            Err(err) => {
                tracing::warn!("{}", err);
                self.config = ServerConfig::new();
                self.load_error = Some(err);
            }
        }
        self.dirty = false;
        &self.config
    }

    /// The current in-memory document.
    pub fn read(&self) -> &ServerConfig {
        &self.config
    }

    /// A single value, if set.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.config.get(key)
    }

    /// Coerce, validate, apply and persist a value.
    ///
    /// Returns `Err` only for validation failures, in which case the document
    /// is untouched. A failed save yields `Ok(WriteOutcome::Unsaved)`.
    pub async fn write(&mut self, key: &str, raw: JsonValue) -> Result<WriteOutcome> {
        let value = validate(key, coerce(key, raw))?.into_json();
        tracing::debug!("Setting config '{}' to {}", key, value);
        self.config.insert(key.to_string(), value);
        Ok(self.persist().await)
    }

    /// Retry saving a dirty document. A clean store is left alone.
    pub async fn flush(&mut self) -> WriteOutcome {
        if !self.dirty {
            return WriteOutcome::Saved;
        }
        self.persist().await
    }

    /// Whether the in-memory document has changes not yet on disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Failure recorded by the last `load`, if any.
    pub fn load_error(&self) -> Option<&McpError> {
        self.load_error.as_ref()
    }

    /// Location of the persisted document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&mut self) -> WriteOutcome {
        match save_document(&self.path, &self.config).await {
            Ok(()) => {
                self.dirty = false;
                WriteOutcome::Saved
            }
            Err(reason) => {
                tracing::error!("{}; keeping change in memory only", reason);
                self.dirty = true;
                WriteOutcome::Unsaved { reason }
            }
        }
    }
}

async fn read_document(path: &Path) -> Result<ServerConfig> {
    let load_failed = |reason: String| McpError::LoadFailed {
        path: path.display().to_string(),
        reason,
    };

    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| load_failed(e.to_string()))?;
    match serde_json::from_str::<JsonValue>(&text).map_err(|e| load_failed(e.to_string()))? {
        JsonValue::Object(map) => Ok(map),
        other => Err(load_failed(format!(
            "expected a JSON object at the top level, found {}",
            json_type_name(&other)
        ))),
    }
}

/// Write `config` to `path` as pretty JSON, creating parent directories.
pub(crate) async fn save_document(path: &Path, config: &ServerConfig) -> Result<()> {
    let persist_failed = |reason: String| McpError::PersistFailed {
        path: path.display().to_string(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| persist_failed(e.to_string()))?;
    }
    let text = serde_json::to_string_pretty(config).map_err(|e| persist_failed(e.to_string()))?;
    tokio::fs::write(path, text)
        .await
        .map_err(|e| persist_failed(e.to_string()))
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Default document location: `~/.claude-server-commander/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Shell used when the document does not name one.
pub fn default_shell() -> String {
    if cfg!(windows) {
        "powershell.exe".to_string()
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "bash".to_string())
    }
}

/// Document written by `setup` when none exists yet.
pub fn default_document() -> ServerConfig {
    let mut config = ServerConfig::new();
    config.insert(
        ConfigKey::BlockedCommands.name().to_string(),
        JsonValue::Array(
            DEFAULT_BLOCKED_COMMANDS
                .iter()
                .map(|c| JsonValue::String(c.to_string()))
                .collect(),
        ),
    );
    config.insert(
        ConfigKey::DefaultShell.name().to_string(),
        JsonValue::String(default_shell()),
    );
    config.insert(
        ConfigKey::AllowedDirectories.name().to_string(),
        JsonValue::Array(Vec::new()),
    );
    config.insert(
        ConfigKey::TelemetryEnabled.name().to_string(),
        JsonValue::Bool(true),
    );
    config.insert(
        ConfigKey::FileWriteLineLimit.name().to_string(),
        JsonValue::from(50u64),
    );
    config.insert(
        ConfigKey::FileReadLineLimit.name().to_string(),
        JsonValue::from(1000u64),
    );
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("config.json"))
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert!(store.load().await.is_empty());
        assert!(matches!(store.load_error(), Some(McpError::LoadFailed { .. })));
        assert!(store.read().is_empty());
    }

    #[tokio::test]
    async fn test_load_rejects_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "[1, 2, 3]").unwrap();
        let mut store = store_in(&dir);

        store.load().await;
        assert!(store.read().is_empty());
        assert!(store.load_error().is_some());
    }

    #[tokio::test]
    async fn test_load_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"defaultShell":"/bin/zsh","custom":{"nested":true}}"#,
        )
        .unwrap();
        let mut store = store_in(&dir);

        store.load().await;
        assert!(store.load_error().is_none());
        assert_eq!(store.get("custom"), Some(&json!({"nested": true})));
    }

    #[tokio::test]
    async fn test_write_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.load().await;

        let outcome = store
            .write("allowedDirectories", json!("[\"/tmp\",\"/home\"]"))
            .await
            .unwrap();
        assert!(outcome.is_saved());
        assert!(!store.is_dirty());

        let mut reloaded = store_in(&dir);
        reloaded.load().await;
        assert_eq!(
            reloaded.get("allowedDirectories"),
            Some(&json!(["/tmp", "/home"]))
        );
    }

    #[tokio::test]
    async fn test_rejected_write_leaves_document_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.load().await;
        store.write("defaultShell", json!("/bin/sh")).await.unwrap();
        let before = store.read().clone();

        let err = store.write("defaultShell", json!(12)).await.unwrap_err();
        assert!(matches!(err, McpError::ValidationFailed { .. }));
        assert_eq!(store.read(), &before);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_value_and_marks_dirty() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the document path makes every save fail.
        let mut store = ConfigStore::new(dir.path());
        store.load().await;

        let outcome = store.write("defaultShell", json!("/bin/bash")).await.unwrap();
        assert!(matches!(
            outcome,
            WriteOutcome::Unsaved {
                reason: McpError::PersistFailed { .. }
            }
        ));
        assert_eq!(store.get("defaultShell"), Some(&json!("/bin/bash")));
        assert!(store.is_dirty());
        assert!(!store.flush().await.is_saved());
    }

    #[tokio::test]
    async fn test_flush_clean_store_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        assert!(store.flush().await.is_saved());
        assert!(!dir.path().join("config.json").exists());
    }

    #[test]
    fn test_default_document_shape() {
        let doc = default_document();
        assert_eq!(doc.get("allowedDirectories"), Some(&json!([])));
        assert!(doc
            .get("blockedCommands")
            .and_then(|v| v.as_array())
            .is_some_and(|a| a.iter().any(|c| c == "sudo")));
        assert_eq!(doc.get("fileReadLineLimit"), Some(&json!(1000)));
    }
}
