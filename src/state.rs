//! # Application State Management
//!
//! This module manages shared state that needs to be accessed by multiple HTTP request handlers
//! simultaneously.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: Multiple HTTP requests run simultaneously and all need access to the same state
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time (but not both)
//! - **Why needed**: Multiple requests can read config simultaneously, but only one can update it
//!
//! ## What is NOT here:
//! Lip-sync results. Each analysis result is returned to the request that
//! asked for it and never stored, so concurrent requests cannot see or
//! overwrite each other's cues.

use crate::config::AppConfig;
use crate::lipsync::LipSyncAnalyzer;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request and analysis metrics, updated by middleware and handlers
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Metrics collected across all HTTP requests and analyses.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of error responses since server start
    pub error_count: u64,

    /// Analyses currently running on the blocking pool
    pub active_analyses: u32,

    pub analysis: AnalysisMetrics,

    /// Key: endpoint name (e.g., "POST /api/v1/lipsync")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Totals over every completed or rejected lip-sync analysis.
#[derive(Debug, Default, Clone)]
pub struct AnalysisMetrics {
    pub completed: u64,
    pub rejected: u64,
    pub frames_emitted: u64,
    pub audio_seconds: f64,
    pub total_duration_ms: f64,
}

impl AnalysisMetrics {
    pub fn average_duration_ms(&self) -> f64 {
        if self.completed > 0 {
            self.total_duration_ms / self.completed as f64
        } else {
            0.0
        }
    }
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Update the configuration with validation.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Build an analyzer for the configuration as it is right now.
    ///
    /// Analyzers are cheap (configuration only), so each request gets its own
    /// and picks up runtime config changes immediately.
    pub fn analyzer(&self) -> LipSyncAnalyzer {
        LipSyncAnalyzer::new(self.get_config().analyzer_config())
    }

    /// Record one finished request against the totals and its endpoint.
    pub fn record_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
        if is_error {
            metrics.error_count += 1;
        }

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Count an analysis as in flight until the returned guard is dropped.
    ///
    /// Dropping covers every exit, including the handler future being
    /// cancelled when the client disconnects mid-analysis.
    pub fn begin_analysis(&self) -> ActiveAnalysis {
        self.metrics.write().unwrap().active_analyses += 1;
        ActiveAnalysis {
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn record_analysis(&self, frames: usize, audio_seconds: f64, elapsed_ms: f64) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.analysis.completed += 1;
        metrics.analysis.frames_emitted += frames as u64;
        metrics.analysis.audio_seconds += audio_seconds;
        metrics.analysis.total_duration_ms += elapsed_ms;
    }

    pub fn record_rejected_analysis(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.analysis.rejected += 1;
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Cloning avoids holding the lock while the HTTP response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Guard returned by [`AppState::begin_analysis`].
#[must_use = "the analysis stops counting as active when the guard is dropped"]
pub struct ActiveAnalysis {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for ActiveAnalysis {
    fn drop(&mut self) {
        // Never panic in drop; a poisoned lock just loses the update
        if let Ok(mut metrics) = self.metrics.write() {
            metrics.active_analyses = metrics.active_analyses.saturating_sub(1);
        }
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate as a fraction (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
