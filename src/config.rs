//! Settings file for `config.toml` under the user's config directory.
//!
//! Every key is optional; anything missing falls back to the built-in defaults and
//! command-line flags override whatever the file says.

use crate::model::ScaleFactor;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "image-upscaler";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_TEARDOWN_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: Option<String>,
    pub scale_factor: Option<ScaleFactor>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub progress_interval: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub teardown_delay: Option<Duration>,
    /// Directory the upscaled image is saved to when `--output` is not given.
    pub download_dir: Option<PathBuf>,
}

/// `<config dir>/image-upscaler/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME))
}

/// Load settings from `path`, or from the default location when `None`.
///
/// Never fails: a missing file means defaults, an unreadable or invalid one is
/// logged and ignored.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Settings::default(),
        },
    };

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings(Some(&temp.path().join("nope.toml")));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parses_every_key() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
base_url = "https://upscale.example"
scale_factor = 4
request_timeout = "45s"
progress_interval = "100ms"
teardown_delay = "1s"
download_dir = "/tmp/upscaled"
"#,
        )
        .unwrap();

        let settings = load_settings(Some(&path));
        assert_eq!(settings.base_url.as_deref(), Some("https://upscale.example"));
        assert_eq!(settings.scale_factor, Some(ScaleFactor::X4));
        assert_eq!(settings.request_timeout, Some(Duration::from_secs(45)));
        assert_eq!(settings.progress_interval, Some(Duration::from_millis(100)));
        assert_eq!(settings.teardown_delay, Some(Duration::from_secs(1)));
        assert_eq!(settings.download_dir, Some(PathBuf::from("/tmp/upscaled")));
    }

    #[test]
    fn partial_file_leaves_other_keys_unset() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "scale_factor = 2\n").unwrap();

        let settings = load_settings(Some(&path));
        assert_eq!(settings.scale_factor, Some(ScaleFactor::X2));
        assert_eq!(settings.base_url, None);
        assert_eq!(settings.request_timeout, None);
    }

    #[test]
    fn invalid_toml_falls_back_to_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "not valid toml {{{{").unwrap();
        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn unsupported_scale_factor_is_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "scale_factor = 3\nbase_url = \"http://x\"\n").unwrap();
        assert_eq!(load_settings(Some(&path)), Settings::default());
    }
}
