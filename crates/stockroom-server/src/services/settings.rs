// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug)]
pub struct SettingsError(pub String);

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierToggle {
    pub chat_enabled: bool,
}

enum Backing {
    File(PathBuf),
    Memory(AtomicBool),
}

/// Owner of the chat-notification toggle. File-backed settings are read from
/// disk on every query so edits made by other processes apply immediately.
pub struct NotifierSettings {
    backing: Backing,
    default_enabled: bool,
    write_lock: Mutex<()>,
}

impl NotifierSettings {
    #[must_use]
    pub fn file(path: PathBuf, default_enabled: bool) -> Self {
        Self {
            backing: Backing::File(path),
            default_enabled,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn in_memory(enabled: bool) -> Self {
        Self {
            backing: Backing::Memory(AtomicBool::new(enabled)),
            default_enabled: enabled,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn is_enabled(&self) -> bool {
        match &self.backing {
            Backing::Memory(flag) => flag.load(Ordering::Relaxed),
            Backing::File(path) => match read_toggle(path).await {
                Ok(Some(toggle)) => toggle.chat_enabled,
                Ok(None) => self.default_enabled,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "notifier settings unreadable; using default");
                    self.default_enabled
                }
            },
        }
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        match &self.backing {
            Backing::Memory(flag) => {
                flag.store(enabled, Ordering::Relaxed);
                Ok(())
            }
            Backing::File(path) => {
                write_toggle(
                    path,
                    NotifierToggle {
                        chat_enabled: enabled,
                    },
                )
                .await
            }
        }
    }
}

async fn read_toggle(path: &Path) -> Result<Option<NotifierToggle>, SettingsError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SettingsError(format!("parse settings failed: {e}"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SettingsError(format!("read settings failed: {e}"))),
    }
}

async fn write_toggle(path: &Path, toggle: NotifierToggle) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SettingsError(format!("create settings dir failed: {e}")))?;
    }
    let bytes = serde_json::to_vec_pretty(&toggle)
        .map_err(|e| SettingsError(format!("encode settings failed: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| SettingsError(format!("write settings failed: {e}")))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| SettingsError(format!("commit settings failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_toggle_defaults_then_persists_and_reads_external_edits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conf").join("settings.json");
        let settings = NotifierSettings::file(path.clone(), true);
        assert!(settings.is_enabled().await);

        settings.set_enabled(false).await.expect("disable");
        assert!(!settings.is_enabled().await);
        let raw = std::fs::read_to_string(&path).expect("settings file");
        assert!(raw.contains("\"chat_enabled\": false"));
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::write(&path, br#"{"chat_enabled": true}"#).expect("external edit");
        assert!(settings.is_enabled().await);

        std::fs::write(&path, b"not json").expect("corrupt");
        assert!(settings.is_enabled().await, "falls back to default");
    }

    #[tokio::test]
    async fn memory_toggle_flips() {
        let settings = NotifierSettings::in_memory(false);
        assert!(!settings.is_enabled().await);
        settings.set_enabled(true).await.expect("enable");
        assert!(settings.is_enabled().await);
    }
}
