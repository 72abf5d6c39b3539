//! Application configuration
//!
//! Settings come from an optional TOML file, then environment overrides.
//! Every field has a default so a missing file or a partial file is fine.

use crate::error::{Result, ScribeError};
use crate::imaging::DEFAULT_EXTENSIONS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const ENV_TESSDATA: &str = "SCANSCRIBE_TESSDATA";
pub const ENV_LANG: &str = "SCANSCRIBE_LANG";
pub const ENV_CAMERA_DIR: &str = "SCANSCRIBE_CAMERA_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribeConfig {
    pub engine: EngineSettings,
    pub camera: CameraSettings,
    pub batch: BatchSettings,
    pub export: ExportSettings,
}

/// Recognition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Tesseract language code(s), e.g. "eng" or "eng+deu"
    pub language: String,
    /// Directory holding the Tesseract language data (system default if unset)
    pub tessdata_dir: Option<PathBuf>,
    /// Apply Otsu binarization before recognition
    pub binarize: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            tessdata_dir: None,
            binarize: false,
        }
    }
}

/// Camera settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Device opened when no index is given
    pub device_index: u32,
    /// Target interval between preview frames
    pub preview_interval_ms: u64,
    /// Root directory of the frame-source devices (`video<N>` below it)
    pub frames_dir: PathBuf,
    /// Also write captured frames to disk
    pub save_captures: bool,
    /// Where captured frames are written
    pub capture_dir: PathBuf,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            preview_interval_ms: 30,
            frames_dir: PathBuf::from("camera"),
            save_captures: true,
            capture_dir: PathBuf::from("."),
        }
    }
}

impl CameraSettings {
    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms.max(1))
    }
}

/// Batch processing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Recognized image extensions (case-insensitive)
    pub extensions: Vec<String>,
    /// Width of the `=` rule around each per-file header
    pub separator_width: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            separator_width: 50,
        }
    }
}

/// Document export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub document_title: String,
    pub font_size: f32,
    pub title_font_size: f32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            document_title: "OCR Extracted Text".to_string(),
            font_size: 11.0,
            title_font_size: 16.0,
        }
    }
}

impl ScribeConfig {
    /// Load from `path` if given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let config = load_config(path)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_TESSDATA).filter(|v| !v.is_empty()) {
            self.engine.tessdata_dir = Some(PathBuf::from(dir));
        }
        if let Some(lang) = lookup(ENV_LANG).filter(|v| !v.is_empty()) {
            self.engine.language = lang;
        }
        if let Some(dir) = lookup(ENV_CAMERA_DIR).filter(|v| !v.is_empty()) {
            self.camera.frames_dir = PathBuf::from(dir);
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<ScribeConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ScribeError::Config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map_err(|e| ScribeError::Config(format!("invalid {}: {e}", path.display())))
}

/// Save configuration to a TOML file
pub fn save_config(config: &ScribeConfig, path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ScribeError::Config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| ScribeError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ScribeConfig::default();
        assert_eq!(config.engine.language, "eng");
        assert!(config.engine.tessdata_dir.is_none());
        assert_eq!(config.camera.preview_interval_ms, 30);
        assert_eq!(config.batch.separator_width, 50);
        assert_eq!(config.batch.extensions.len(), 6);
        assert_eq!(config.export.document_title, "OCR Extracted Text");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nlanguage = \"deu\"\n\n[camera]\ndevice_index = 2").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.engine.language, "deu");
        assert!(!config.engine.binarize);
        assert_eq!(config.camera.device_index, 2);
        assert_eq!(config.camera.preview_interval_ms, 30);
        assert_eq!(config.batch.separator_width, 50);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = ScribeConfig::default();
        config.engine.binarize = true;
        config.export.font_size = 9.5;

        let file = NamedTempFile::new().unwrap();
        save_config(&config, file.path()).unwrap();
        let loaded = load_config(file.path()).unwrap();

        assert!(loaded.engine.binarize);
        assert!((loaded.export.font_size - 9.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/scanscribe.toml"));
        assert!(matches!(result, Err(ScribeError::Config(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();
        assert!(matches!(load_config(file.path()), Err(ScribeError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_TESSDATA, "/usr/share/tessdata"),
            (ENV_LANG, "fra"),
            (ENV_CAMERA_DIR, ""),
        ]
        .into_iter()
        .collect();

        let mut config = ScribeConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.engine.tessdata_dir,
            Some(PathBuf::from("/usr/share/tessdata"))
        );
        assert_eq!(config.engine.language, "fra");
        // empty values are ignored
        assert_eq!(config.camera.frames_dir, PathBuf::from("camera"));
    }

    #[test]
    fn test_preview_interval_never_zero() {
        let settings = CameraSettings {
            preview_interval_ms: 0,
            ..CameraSettings::default()
        };
        assert_eq!(settings.preview_interval(), Duration::from_millis(1));
    }
}
