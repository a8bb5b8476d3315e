use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct RollcallConfig {
    pub api: ApiConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the people API; photo paths resolve against its origin
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Preferred camera facing mode ("user" or "environment")
    #[serde(default = "default_facing_mode")]
    pub facing_mode: String,

    /// Resolution hint sent when acquiring the device (width, height)
    #[serde(default = "default_ideal_resolution")]
    pub ideal_resolution: (u32, u32),

    /// Width / height ratio of captured photos
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,

    /// JPEG quality for captured photos (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Countdown length for timed captures
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u8,

    /// Length of one countdown step in milliseconds
    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,

    /// Largest accepted image file for imports
    #[serde(default = "default_max_import_bytes")]
    pub max_import_bytes: u64,
}

impl CaptureConfig {
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl RollcallConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("rollcall.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("api.base_url", default_base_url())?
            .set_default("api.timeout_seconds", default_timeout_seconds())?
            .set_default("api.user_agent", default_user_agent())?
            .set_default("capture.facing_mode", default_facing_mode())?
            .set_default(
                "capture.ideal_resolution",
                vec![default_ideal_resolution().0, default_ideal_resolution().1],
            )?
            .set_default("capture.aspect_ratio", default_aspect_ratio())?
            .set_default("capture.jpeg_quality", default_jpeg_quality() as u64)?
            .set_default(
                "capture.countdown_seconds",
                default_countdown_seconds() as u64,
            )?
            .set_default("capture.countdown_tick_ms", default_countdown_tick_ms())?
            .set_default("capture.max_import_bytes", default_max_import_bytes())?
            .add_source(File::with_name(&path_str).required(false))
            // ROLLCALL_API__BASE_URL overrides api.base_url
            .add_source(
                Environment::with_prefix("ROLLCALL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: RollcallConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = reqwest::Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::Message(format!(
                "API base_url '{}' is not a valid URL: {}",
                self.api.base_url, e
            ))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ConfigError::Message(format!(
                "API base_url must use http or https, got '{}'",
                base.scheme()
            )));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "API timeout_seconds must be greater than 0".to_string(),
            ));
        }

        let capture = &self.capture;
        if capture.ideal_resolution.0 == 0 || capture.ideal_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Capture ideal_resolution must be greater than 0".to_string(),
            ));
        }

        if !capture.aspect_ratio.is_finite() || capture.aspect_ratio <= 0.0 {
            return Err(ConfigError::Message(
                "Capture aspect_ratio must be a positive number".to_string(),
            ));
        }

        if capture.jpeg_quality == 0 || capture.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Capture jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if capture.countdown_seconds == 0 {
            return Err(ConfigError::Message(
                "Capture countdown_seconds must be greater than 0".to_string(),
            ));
        }

        if capture.countdown_tick_ms == 0 {
            return Err(ConfigError::Message(
                "Capture countdown_tick_ms must be greater than 0".to_string(),
            ));
        }

        if capture.max_import_bytes == 0 {
            return Err(ConfigError::Message(
                "Capture max_import_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing_mode: default_facing_mode(),
            ideal_resolution: default_ideal_resolution(),
            aspect_ratio: default_aspect_ratio(),
            jpeg_quality: default_jpeg_quality(),
            countdown_seconds: default_countdown_seconds(),
            countdown_tick_ms: default_countdown_tick_ms(),
            max_import_bytes: default_max_import_bytes(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_seconds() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("rollcall/{}", env!("CARGO_PKG_VERSION"))
}

fn default_facing_mode() -> String {
    "user".to_string()
}
fn default_ideal_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_aspect_ratio() -> f64 {
    1.0
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_countdown_seconds() -> u8 {
    3
}
fn default_countdown_tick_ms() -> u64 {
    1000
}
fn default_max_import_bytes() -> u64 {
    5 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RollcallConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.capture.max_import_bytes, 5 * 1024 * 1024);
        assert_eq!(config.capture.countdown_seconds, 3);
        assert_eq!(config.capture.countdown_tick(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[api]\nbase_url = \"https://roster.example.org/api\"\n\n[capture]\njpeg_quality = 75"
        )
        .unwrap();

        let config = RollcallConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.api.base_url, "https://roster.example.org/api");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.capture.jpeg_quality, 75);
        assert_eq!(config.capture.ideal_resolution, (1280, 720));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = RollcallConfig::load_from_file("/nonexistent/rollcall-test.toml").unwrap();
        assert_eq!(config.capture.aspect_ratio, 1.0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RollcallConfig::default();

        config.api.base_url = "ftp://example.org".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "http://localhost:8000".to_string();
        config.capture.aspect_ratio = 0.0;
        assert!(config.validate().is_err());

        config.capture.aspect_ratio = 4.0 / 3.0;
        config.capture.jpeg_quality = 101;
        assert!(config.validate().is_err());

        config.capture.jpeg_quality = 90;
        config.capture.countdown_seconds = 0;
        assert!(config.validate().is_err());

        config.capture.countdown_seconds = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_print_config_round_trips() {
        let config = RollcallConfig::default();
        let rendered = config.to_toml().unwrap();

        assert!(rendered.contains("[api]"));
        assert!(rendered.contains("[capture]"));

        let parsed: RollcallConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
