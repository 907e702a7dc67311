//! Configuration management for mirrorcam
//!
//! Loads and saves the TOML configuration: default lens and focus behavior,
//! the system default display id, fault presentation timing and where user
//! preferences are stored.

use crate::errors::MirrorCamError;
use crate::types::LensFacing;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorCamConfig {
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    pub faults: FaultConfig,
    pub preferences: PreferencesConfig,
}

/// Camera session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Lens used when no preference has been stored yet
    pub default_lens: LensFacing,
    /// Tap-to-focus auto-cancel duration in milliseconds
    pub focus_auto_cancel_ms: u64,
}

/// Display discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Id of the system's default (built-in) display
    pub default_display_id: u32,
}

/// Fault presentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// How long a control fault stays visible, in milliseconds
    pub transient_fault_ttl_ms: u64,
}

/// Preference persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferencesConfig {
    /// File holding the persisted preference bag
    pub path: String,
}

impl Default for MirrorCamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                default_lens: LensFacing::Back,
                focus_auto_cancel_ms: 3000,
            },
            display: DisplayConfig {
                default_display_id: 0,
            },
            faults: FaultConfig {
                transient_fault_ttl_ms: 3000,
            },
            preferences: PreferencesConfig {
                path: "mirrorcam-prefs.toml".to_string(),
            },
        }
    }
}

impl MirrorCamConfig {
    /// Load configuration from TOML file; a missing file yields defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MirrorCamError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| MirrorCamError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: MirrorCamConfig =
            toml::from_str(&contents).map_err(|source| MirrorCamError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        config.validate()?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MirrorCamError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| MirrorCamError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;

        fs::write(path, toml_string).map_err(|source| MirrorCamError::Io {
            path: path.display().to_string(),
            source,
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("mirrorcam.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), MirrorCamError> {
        if self.camera.focus_auto_cancel_ms == 0 {
            return Err(MirrorCamError::InvalidConfig(
                "focus_auto_cancel_ms must be greater than zero".to_string(),
            ));
        }
        if self.faults.transient_fault_ttl_ms == 0 {
            return Err(MirrorCamError::InvalidConfig(
                "transient_fault_ttl_ms must be greater than zero".to_string(),
            ));
        }
        if self.preferences.path.trim().is_empty() {
            return Err(MirrorCamError::InvalidConfig(
                "preferences path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MirrorCamConfig::default();
        assert_eq!(config.camera.default_lens, LensFacing::Back);
        assert_eq!(config.camera.focus_auto_cancel_ms, 3000);
        assert_eq!(config.display.default_display_id, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = MirrorCamConfig::default();
        bad.camera.focus_auto_cancel_ms = 0;
        assert!(bad.validate().is_err());

        let mut bad = MirrorCamConfig::default();
        bad.faults.transient_fault_ttl_ms = 0;
        assert!(bad.validate().is_err());

        let mut bad = MirrorCamConfig::default();
        bad.preferences.path = "  ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mirrorcam.toml");

        let mut config = MirrorCamConfig::default();
        config.camera.default_lens = LensFacing::Front;
        config.display.default_display_id = 4;
        config.save_to_file(&path).unwrap();

        let loaded = MirrorCamConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&MirrorCamConfig::default()).unwrap();
        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[display]"));
        assert!(toml_string.contains("[faults]"));
        assert!(toml_string.contains("[preferences]"));
        assert!(toml_string.contains("default_lens = \"back\""));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = MirrorCamConfig::load_from_file(dir.path().join("missing.toml"));
        assert_eq!(result.unwrap(), MirrorCamConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        let mut config = MirrorCamConfig::default();
        config.faults.transient_fault_ttl_ms = 0;
        config.save_to_file(&path).unwrap();

        assert!(matches!(
            MirrorCamConfig::load_from_file(&path),
            Err(MirrorCamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[camera\n").unwrap();
        assert!(matches!(
            MirrorCamConfig::load_from_file(&path),
            Err(MirrorCamError::Parse { .. })
        ));
    }
}
