use std::sync::Arc;

use crate::store::Store;

pub const DARK_MODE_KEY: &str = "darkMode";
pub const SPEECH_ENABLED_KEY: &str = "speechEnabled";

/// Boolean UI preferences. Anything other than a stored `"true"` reads as off.
pub struct Preferences {
    store: Arc<Store>,
    dark_mode: bool,
    speech_enabled: bool,
}

impl Preferences {
    pub fn load(store: Arc<Store>) -> Self {
        let dark_mode = read_flag(&store, DARK_MODE_KEY);
        let speech_enabled = read_flag(&store, SPEECH_ENABLED_KEY);
        Self {
            store,
            dark_mode,
            speech_enabled,
        }
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn speech_enabled(&self) -> bool {
        self.speech_enabled
    }

    pub fn set_dark_mode(&mut self, on: bool) {
        self.dark_mode = on;
        write_flag(&self.store, DARK_MODE_KEY, on);
    }

    pub fn set_speech_enabled(&mut self, on: bool) {
        self.speech_enabled = on;
        write_flag(&self.store, SPEECH_ENABLED_KEY, on);
    }
}

fn read_flag(store: &Store, key: &str) -> bool {
    match store.get(key) {
        Ok(value) => value.as_deref() == Some("true"),
        Err(e) => {
            log::warn!("Could not read preference {key}: {e:#}");
            false
        }
    }
}

fn write_flag(store: &Store, key: &str, on: bool) {
    if let Err(e) = store.set(key, if on { "true" } else { "false" }) {
        log::warn!("Could not save preference {key}: {e:#}");
    }
}
