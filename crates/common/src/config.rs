//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Render surface defaults.
    pub render: RenderDefaults,

    /// Capture provider defaults.
    pub capture: CaptureDefaults,

    /// Local remote-control listener.
    pub ingress: IngressConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Render surface parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Render tick period in milliseconds.
    pub tick_ms: u64,

    /// Pointer-inside poll period in milliseconds.
    pub hover_poll_ms: u64,

    /// Delay before controls hide once the pointer has left.
    pub hide_delay_ms: u64,

    /// How long the "Opacity: N%" indicator stays on screen.
    pub opacity_indicator_ms: u64,

    /// Background fill behind the captured image.
    pub background: [u8; 3],

    /// Minimum host window size in logical pixels.
    pub min_window_width: u32,
    pub min_window_height: u32,

    /// Width of a freshly opened surface.
    pub initial_window_width: u32,
}

/// Capture provider parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Provider tick period in milliseconds.
    pub tick_ms: u64,

    /// Consecutive failed relocations before a window is declared lost.
    pub lost_after_misses: u32,

    /// Which capture backend to select at startup.
    pub backend: BackendKind,
}

/// Capture backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-memory virtual desktop.
    #[default]
    Synthetic,
}

/// Remote ingress listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Whether the listener is started at all.
    pub enabled: bool,

    /// Loopback port.
    pub port: u16,

    /// Request body ceiling in bytes.
    pub max_request_bytes: usize,

    /// Per-connection read timeout in milliseconds.
    pub read_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "pipview=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            tick_ms: 33,
            hover_poll_ms: 200,
            hide_delay_ms: 3000,
            opacity_indicator_ms: 1000,
            background: [0, 0, 0],
            min_window_width: 200,
            min_window_height: 150,
            initial_window_width: 400,
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            tick_ms: 33,
            lost_after_misses: 30,
            backend: BackendKind::default(),
        }
    }
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 38474,
            max_request_bytes: 1024,
            read_timeout_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("pipview").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"ingress": {"port": 40000}}"#).unwrap();
        assert_eq!(config.ingress.port, 40000);
        assert_eq!(config.ingress.max_request_bytes, 1024);
        assert_eq!(config.render.tick_ms, 33);
        assert_eq!(config.capture.backend, BackendKind::Synthetic);
    }

    #[test]
    fn defaults_match_reference_timings() {
        let render = RenderDefaults::default();
        assert_eq!(render.hover_poll_ms, 200);
        assert_eq!(render.hide_delay_ms, 3000);
        assert_eq!((render.min_window_width, render.min_window_height), (200, 150));
    }
}
