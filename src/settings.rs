//! Playback settings for dlna-explorer
//!
//! Repeat modes are remembered per content category. Storage is pluggable
//! through [`SettingsStorage`]; the in-memory [`MemoryStorage`] is the only
//! backend shipped. Consumers that must not run before the settings exist
//! wait on a [`SettingsReady`] signal instead of polling.

use crate::{
    content::ContentCategory,
    error::{Error, Result},
};
use clap::ValueEnum;
use log::debug;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};
use tokio::sync::oneshot;

/// How a playback session moves through its playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum RepeatMode {
    /// Play the current item and stop
    #[default]
    PlayOnce,
    /// Play through the playlist once
    Sequential,
    /// Play through the playlist, wrapping around at both ends
    RepeatAll,
    /// Play the current item over and over
    RepeatOne,
}

impl RepeatMode {
    /// The mode a user toggle moves to
    pub fn next(self) -> Self {
        match self {
            RepeatMode::PlayOnce => RepeatMode::Sequential,
            RepeatMode::Sequential => RepeatMode::RepeatAll,
            RepeatMode::RepeatAll => RepeatMode::RepeatOne,
            RepeatMode::RepeatOne => RepeatMode::PlayOnce,
        }
    }

    /// Parses a stored mode name, falling back to [`RepeatMode::PlayOnce`]
    pub fn of(name: &str) -> Self {
        match name {
            "SEQUENTIAL" => RepeatMode::Sequential,
            "REPEAT_ALL" => RepeatMode::RepeatAll,
            "REPEAT_ONE" => RepeatMode::RepeatOne,
            _ => RepeatMode::PlayOnce,
        }
    }

    /// Name used in storage
    pub fn name(self) -> &'static str {
        match self {
            RepeatMode::PlayOnce => "PLAY_ONCE",
            RepeatMode::Sequential => "SEQUENTIAL",
            RepeatMode::RepeatAll => "REPEAT_ALL",
            RepeatMode::RepeatOne => "REPEAT_ONE",
        }
    }

    /// Short message shown to the user when the mode changes
    pub fn message(self) -> &'static str {
        match self {
            RepeatMode::PlayOnce => "Play once",
            RepeatMode::Sequential => "Play sequentially",
            RepeatMode::RepeatAll => "Repeat all",
            RepeatMode::RepeatOne => "Repeat one",
        }
    }

    /// Whether next/previous may move the cursor at all
    pub fn allows_skip(self) -> bool {
        matches!(self, RepeatMode::Sequential | RepeatMode::RepeatAll)
    }

    /// Whether navigation wraps around the ends of the playlist
    pub fn wraps(self) -> bool {
        self == RepeatMode::RepeatAll
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Key/value storage backing [`Settings`]
pub trait SettingsStorage: Send + Sync {
    /// Reads a value
    fn get(&self, key: &str) -> Option<String>;
    /// Writes a value
    fn put(&self, key: &str, value: &str);
}

/// Storage that lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

/// Typed access to the persisted playback settings
#[derive(Clone)]
pub struct Settings {
    storage: Arc<dyn SettingsStorage>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Settings").finish_non_exhaustive()
    }
}

impl Settings {
    /// Wraps a storage backend
    pub fn new(storage: Arc<dyn SettingsStorage>) -> Self {
        Self { storage }
    }

    /// Settings backed by a fresh [`MemoryStorage`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Starts loading settings on a background task
    ///
    /// The returned signal resolves once the settings can be read.
    pub fn initialize(storage: Arc<dyn SettingsStorage>) -> SettingsReady {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let settings = Settings::new(storage);
            debug!("Settings ready");
            let _ = tx.send(settings);
        });
        SettingsReady { rx }
    }

    /// Repeat mode stored for a content category
    pub fn repeat_mode(&self, category: ContentCategory) -> RepeatMode {
        self.storage
            .get(&repeat_mode_key(category))
            .map(|name| RepeatMode::of(&name))
            .unwrap_or_default()
    }

    /// Stores the repeat mode of a content category
    pub fn set_repeat_mode(&self, category: ContentCategory, mode: RepeatMode) {
        debug!("Storing repeat mode {mode} for {category}");
        self.storage.put(&repeat_mode_key(category), mode.name());
    }
}

fn repeat_mode_key(category: ContentCategory) -> String {
    format!("repeat_mode.{category}")
}

/// One-shot signal resolving to the loaded [`Settings`]
#[derive(Debug)]
pub struct SettingsReady {
    rx: oneshot::Receiver<Settings>,
}

impl SettingsReady {
    /// A signal that is already resolved
    pub fn ready(settings: Settings) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(settings);
        Self { rx }
    }

    /// Waits for the settings to become available
    pub async fn wait(self) -> Result<Settings> {
        self.rx.await.map_err(|_| Error::SettingsUnavailable {
            context: "Settings loader stopped before completing".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_mode_cycle() {
        let mut mode = RepeatMode::PlayOnce;
        let mut seen = vec![mode];
        for _ in 0..4 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![
                RepeatMode::PlayOnce,
                RepeatMode::Sequential,
                RepeatMode::RepeatAll,
                RepeatMode::RepeatOne,
                RepeatMode::PlayOnce,
            ]
        );
    }

    #[test]
    fn test_repeat_mode_of() {
        assert_eq!(RepeatMode::of("REPEAT_ALL"), RepeatMode::RepeatAll);
        assert_eq!(RepeatMode::of(RepeatMode::RepeatOne.name()), RepeatMode::RepeatOne);
        assert_eq!(RepeatMode::of("garbage"), RepeatMode::PlayOnce);
    }

    #[test]
    fn test_repeat_mode_navigation_flags() {
        assert!(!RepeatMode::PlayOnce.allows_skip());
        assert!(!RepeatMode::RepeatOne.allows_skip());
        assert!(RepeatMode::Sequential.allows_skip());
        assert!(!RepeatMode::Sequential.wraps());
        assert!(RepeatMode::RepeatAll.wraps());
    }

    #[test]
    fn test_settings_per_category() {
        let settings = Settings::in_memory();
        assert_eq!(settings.repeat_mode(ContentCategory::Music), RepeatMode::PlayOnce);

        settings.set_repeat_mode(ContentCategory::Music, RepeatMode::RepeatAll);
        assert_eq!(settings.repeat_mode(ContentCategory::Music), RepeatMode::RepeatAll);
        assert_eq!(settings.repeat_mode(ContentCategory::Movie), RepeatMode::PlayOnce);
    }

    #[tokio::test]
    async fn test_settings_ready_signal() {
        let storage = Arc::new(MemoryStorage::new());
        storage.put("repeat_mode.movie", "SEQUENTIAL");

        let settings = Settings::initialize(storage).wait().await.unwrap();
        assert_eq!(settings.repeat_mode(ContentCategory::Movie), RepeatMode::Sequential);
    }

    #[tokio::test]
    async fn test_settings_ready_dropped_sender() {
        let (tx, rx) = oneshot::channel::<Settings>();
        drop(tx);
        let ready = SettingsReady { rx };
        assert!(matches!(
            ready.wait().await,
            Err(Error::SettingsUnavailable { .. })
        ));
    }
}
