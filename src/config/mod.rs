use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::editor::history::DEFAULT_HISTORY_CAPACITY;
use crate::editor::viewport::DEFAULT_FIT_PADDING;
use crate::editor::SessionOptions;
use crate::ocr::resolve_ocr_language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "retext";
const APP_CONFIG_FILE: &str = "config.json";

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ocr_language: Option<String>,
    pub history_capacity: usize,
    pub fit_padding: f64,
    pub desktop_notifications: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ocr_language: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            fit_padding: DEFAULT_FIT_PADDING,
            desktop_notifications: true,
        }
    }
}

impl AppConfig {
    /// Session settings with the OCR language resolved against `$LANG`.
    pub fn to_session_options(&self) -> SessionOptions {
        let fit_padding = if self.fit_padding.is_finite() && self.fit_padding >= 0.0 {
            self.fit_padding
        } else {
            tracing::warn!(fit_padding = self.fit_padding, "invalid fit_padding; using default");
            DEFAULT_FIT_PADDING
        };
        SessionOptions {
            ocr_language: resolve_ocr_language(self.ocr_language.as_deref()),
            history_capacity: self.history_capacity,
            fit_padding,
            ..SessionOptions::default()
        }
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => parse_app_config(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

fn parse_app_config(contents: &str) -> serde_json::Result<AppConfig> {
    serde_json::from_str(contents)
}

fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
