//! User preference persistence
//!
//! The preference bag is an opaque key-value store with three keys: lens
//! facing (int), horizontal flip (bool) and white-balance mode (int). Writes
//! are synchronous; values are read once when the session holder is built.

use crate::errors::MirrorCamError;
use crate::types::{LensFacing, WhiteBalanceMode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

pub const KEY_LENS_FACING: &str = "lens_facing";
pub const KEY_FLIP_HORIZONTAL: &str = "flip_horizontal";
pub const KEY_WHITE_BALANCE_MODE: &str = "white_balance_mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Int(i64),
    Bool(bool),
}

impl PreferenceValue {
    pub fn as_int(self) -> Option<i64> {
        match self {
            PreferenceValue::Int(v) => Some(v),
            PreferenceValue::Bool(_) => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            PreferenceValue::Bool(v) => Some(v),
            PreferenceValue::Int(_) => None,
        }
    }
}

/// Scoped key-value persistence
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Option<PreferenceValue>;

    fn set(&mut self, key: &str, value: PreferenceValue) -> Result<(), MirrorCamError>;
}

/// Non-persistent store, mainly for tests
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferenceStore {
    values: HashMap<String, PreferenceValue>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<PreferenceValue> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: PreferenceValue) -> Result<(), MirrorCamError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a TOML file, rewritten on every `set`
#[derive(Debug)]
pub struct TomlPreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, PreferenceValue>,
}

impl TomlPreferenceStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is reported.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MirrorCamError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| MirrorCamError::Io {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| MirrorCamError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            BTreeMap::new()
        };
        log::debug!("Opened preference store {:?} ({} keys)", path, values.len());
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), MirrorCamError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| MirrorCamError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let contents = toml::to_string(&self.values)?;
        fs::write(&self.path, contents).map_err(|source| MirrorCamError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl PreferenceStore for TomlPreferenceStore {
    fn get(&self, key: &str) -> Option<PreferenceValue> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: PreferenceValue) -> Result<(), MirrorCamError> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

/// The persisted subset of UI state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserPreferences {
    pub lens_facing: LensFacing,
    pub flip_horizontal: bool,
    pub white_balance: WhiteBalanceMode,
}

impl UserPreferences {
    /// Read all three keys; absent or malformed values fall back to defaults.
    pub fn load(store: &dyn PreferenceStore, default_lens: LensFacing) -> Self {
        let lens_facing = store
            .get(KEY_LENS_FACING)
            .and_then(PreferenceValue::as_int)
            .and_then(LensFacing::from_code)
            .unwrap_or(default_lens);
        let flip_horizontal = store
            .get(KEY_FLIP_HORIZONTAL)
            .and_then(PreferenceValue::as_bool)
            .unwrap_or(false);
        let white_balance = store
            .get(KEY_WHITE_BALANCE_MODE)
            .and_then(PreferenceValue::as_int)
            .and_then(WhiteBalanceMode::from_code)
            .unwrap_or(WhiteBalanceMode::Auto);

        Self {
            lens_facing,
            flip_horizontal,
            white_balance,
        }
    }

    pub fn store_lens(
        store: &mut dyn PreferenceStore,
        lens: LensFacing,
    ) -> Result<(), MirrorCamError> {
        store.set(KEY_LENS_FACING, PreferenceValue::Int(lens.code()))
    }

    pub fn store_flip(store: &mut dyn PreferenceStore, flip: bool) -> Result<(), MirrorCamError> {
        store.set(KEY_FLIP_HORIZONTAL, PreferenceValue::Bool(flip))
    }

    pub fn store_white_balance(
        store: &mut dyn PreferenceStore,
        mode: WhiteBalanceMode,
    ) -> Result<(), MirrorCamError> {
        store.set(KEY_WHITE_BALANCE_MODE, PreferenceValue::Int(mode.code()))
    }
}
