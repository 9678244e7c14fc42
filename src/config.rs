//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **impl blocks**: Add methods to structs
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER__HOST, APP_PERFORMANCE__MAX_AUDIO_SECONDS, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use crate::lipsync::AnalyzerConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Hard upper bound for `performance.max_payload_bytes`.
///
/// The body extractor is sized to this once at startup; the live limit is
/// checked per request so it can be changed at runtime.
pub const PAYLOAD_CEILING_BYTES: usize = 256 * 1024 * 1024;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, lipsync, performance)
/// keeps each concern's settings together and maps directly onto TOML tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub lipsync: LipSyncConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Lip-sync analysis settings.
///
/// ## Fields:
/// - `strict_format`: Reject buffers whose WAV header is not 16-bit mono 24 kHz PCM.
///   Off by default: the TTS provider's output is trusted and only the length is checked.
/// - `log_distributions`: Log mouth-shape counts before and after coverage enforcement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncConfig {
    pub strict_format: bool,
    pub log_distributions: bool,
}

/// Request size limits.
///
/// ## Fields:
/// - `max_payload_bytes`: Largest accepted request body (raw or multipart)
/// - `max_audio_seconds`: Longest recording that will be analyzed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_payload_bytes: usize,
    pub max_audio_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 8080,
            },
            lipsync: LipSyncConfig {
                strict_format: false,
                log_distributions: true,
            },
            performance: PerformanceConfig {
                max_payload_bytes: 32 * 1024 * 1024,  // ~11 minutes of 24 kHz mono PCM
                max_audio_seconds: 600,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_LIPSYNC__STRICT_FORMAT=true`: Validate WAV headers
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // Double underscore separates sections so field names keep their underscores
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        // Deployment platforms set these without the APP_ prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Payload limit can hold at least a WAV header and stays under the ceiling
    /// - Maximum audio duration is greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.performance.max_payload_bytes < crate::lipsync::format::HEADER_BYTES {
            return Err(anyhow::anyhow!(
                "Max payload bytes must be at least the {}-byte WAV header",
                crate::lipsync::format::HEADER_BYTES
            ));
        }

        if self.performance.max_payload_bytes > PAYLOAD_CEILING_BYTES {
            return Err(anyhow::anyhow!(
                "Max payload bytes cannot exceed {}",
                PAYLOAD_CEILING_BYTES
            ));
        }

        if self.performance.max_audio_seconds == 0 {
            return Err(anyhow::anyhow!("Max audio seconds must be greater than 0"));
        }

        Ok(())
    }

    /// Build the analyzer settings from the current configuration.
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            strict_format: self.lipsync.strict_format,
            max_audio_seconds: self.performance.max_audio_seconds,
            log_distributions: self.lipsync.log_distributions,
        }
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// Only the fields present in the JSON are changed. For example,
    /// `{"lipsync": {"strict_format": true}}` turns on header validation and
    /// leaves everything else alone.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = u16::try_from(port)
                    .map_err(|_| anyhow::anyhow!("Server port {} is out of range", port))?;
            }
        }

        if let Some(lipsync) = partial_config.get("lipsync") {
            if let Some(strict) = lipsync.get("strict_format").and_then(|v| v.as_bool()) {
                self.lipsync.strict_format = strict;
            }
            if let Some(log) = lipsync.get("log_distributions").and_then(|v| v.as_bool()) {
                self.lipsync.log_distributions = log;
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(bytes) = performance.get("max_payload_bytes").and_then(|v| v.as_u64()) {
                self.performance.max_payload_bytes = bytes as usize;
            }
            if let Some(seconds) = performance.get("max_audio_seconds").and_then(|v| v.as_u64()) {
                self.performance.max_audio_seconds = seconds;
            }
        }

        self.validate()?;
        Ok(())
    }
}
