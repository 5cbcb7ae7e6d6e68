//! Filesystem storage used by the app.
//!
//! - [`FsCollection`] implements the collection collaborators of the core (directory
//!   snapshot, GPX reads and every mutation) on top of a root directory.
//! - [`FilePreferencesStore`] keeps `settings.json` and persists the map view.
//!
//! Both live in a per-user app data directory, see [`app_data_dir`].

mod collection;

pub use collection::FsCollection;

use super::preferences::Preferences;
use hiking_map_lib::{CoreError, MapView, Result, SettingsStore};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const APP_DIR_NAME: &str = "Hiking Map";
const APP_DIR_NAME_UNIX: &str = ".hiking-map";
const SETTINGS_FILE: &str = "settings.json";
const COLLECTION_DIR: &str = "gpx";

/// Per-user app data directory
///
/// - macOS: `~/Library/Application Support/Hiking Map`
/// - Windows: `%APPDATA%/Hiking Map`
/// - Else: `~/.hiking-map`
///
/// `dev` selects a separate "Dev" variant of each.
pub fn app_data_dir(dev: bool) -> PathBuf {
    let suffix = if dev { " Dev" } else { "" };

    if cfg!(windows)
        && let Ok(appdata) = std::env::var("APPDATA")
    {
        return Path::new(&appdata).join(format!("{APP_DIR_NAME}{suffix}"));
    }

    if let Ok(home) = std::env::var("HOME") {
        let home = Path::new(&home);
        if cfg!(target_os = "macos") {
            return home
                .join("Library")
                .join("Application Support")
                .join(format!("{APP_DIR_NAME}{suffix}"));
        }
        let suffix = if dev { "-dev" } else { "" };
        return home.join(format!("{APP_DIR_NAME_UNIX}{suffix}"));
    }

    // Fallback to current directory
    Path::new(".").join(format!("{APP_DIR_NAME_UNIX}{}", if dev { "-dev" } else { "" }))
}

/// Default collection root inside the app data directory
pub fn default_collection_root(data_dir: &Path) -> PathBuf {
    data_dir.join(COLLECTION_DIR)
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

/// `settings.json` backed preferences
///
/// The in-memory copy is the source of truth; every change rewrites the whole file.
#[derive(Debug)]
pub struct FilePreferencesStore {
    path: PathBuf,
    current: Mutex<Preferences>,
}

impl FilePreferencesStore {
    /// Load preferences from `path`
    ///
    /// A missing or unreadable file yields the defaults.
    pub async fn open(path: PathBuf) -> Self {
        let preferences = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt settings file {}: {}", path.display(), e);
                Preferences::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                tracing::warn!("Error loading settings from {}: {}", path.display(), e);
                Preferences::default()
            }
        };

        Self {
            path,
            current: Mutex::new(preferences),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Preferences>> {
        self.current
            .lock()
            .map_err(|e| CoreError::Io(std::io::Error::other(format!("mutex poisoned: {}", e))))
    }

    /// Snapshot of the current preferences
    pub fn preferences(&self) -> Result<Preferences> {
        Ok(self.lock()?.clone())
    }

    /// Validate and persist new preferences
    pub async fn save(&self, preferences: Preferences) -> Result<()> {
        preferences.validate()?;
        let json = {
            let mut current = self.lock()?;
            *current = preferences;
            to_json(&current)?
        };
        self.write(json).await
    }

    async fn write(&self, json: String) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

fn to_json(preferences: &Preferences) -> Result<String> {
    serde_json::to_string_pretty(preferences).map_err(|e| CoreError::Json(e.to_string()))
}

impl SettingsStore for FilePreferencesStore {
    async fn save_map_view(&self, view: MapView) -> Result<()> {
        let json = {
            let mut current = self.lock()?;
            current.map = view;
            to_json(&current)?
        };
        self.write(json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::preferences::MapProvider;

    #[test]
    fn test_app_data_dir_variants() {
        let release = app_data_dir(false);
        let dev = app_data_dir(true);
        assert_ne!(release, dev);
        assert_eq!(default_collection_root(&release), release.join("gpx"));
        assert_eq!(settings_path(&dev), dev.join("settings.json"));
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferencesStore::open(dir.path().join("settings.json")).await;
        assert_eq!(store.preferences().unwrap(), Preferences::default());
    }

    #[tokio::test]
    async fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FilePreferencesStore::open(path).await;
        assert_eq!(store.preferences().unwrap(), Preferences::default());
    }

    #[tokio::test]
    async fn test_map_view_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = FilePreferencesStore::open(path.clone()).await;

        let view = MapView {
            center: [46.5, 8.0],
            zoom: 13.0,
        };
        store.save_map_view(view).await.unwrap();

        let reopened = FilePreferencesStore::open(path).await;
        assert_eq!(reopened.preferences().unwrap().map, view);
    }

    #[tokio::test]
    async fn test_invalid_preferences_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = FilePreferencesStore::open(path.clone()).await;

        let mut prefs = store.preferences().unwrap();
        prefs.map_provider = MapProvider::Mapy;
        assert!(matches!(
            store.save(prefs).await,
            Err(CoreError::Validation(_))
        ));
        assert!(!path.exists());
        assert_eq!(store.preferences().unwrap().map_provider, MapProvider::Osm);
    }
}
