//! Debug endpoints for exercising the lip-sync analyzer
//!
//! These endpoints are useful for development and debugging without needing
//! a TTS pipeline to produce real speech audio.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::lipsync::{run_analysis, LipSyncResponse};
use crate::lipsync::format::{self, encode_pcm16_wav};
use crate::lipsync::signal::speech_like_tone;
use crate::state::AppState;

/// Request to analyze synthetic speech-like audio
#[derive(Debug, Default, Deserialize)]
pub struct TestLipSyncRequest {
    /// Audio duration in seconds (defaults to 2.0)
    pub duration_seconds: Option<f64>,
    /// Carrier frequency in Hz (defaults to 220.0)
    pub frequency_hz: Option<f64>,
    /// Syllables per second (defaults to 4.0)
    pub syllable_hz: Option<f64>,
}

/// Response from the synthetic lip-sync test
#[derive(Debug, Serialize)]
pub struct TestLipSyncResponse {
    pub success: bool,
    pub test_audio_info: String,
    pub wav_bytes: usize,
    pub analysis: LipSyncResponse,
}

/// Analyze a generated tone with a syllable envelope
///
/// POST /debug/test-lipsync
/// Body: {"duration_seconds": 2.0, "frequency_hz": 220.0, "syllable_hz": 4.0}
pub async fn test_lipsync(
    state: web::Data<AppState>,
    req: web::Json<TestLipSyncRequest>,
) -> AppResult<HttpResponse> {
    let duration = req.duration_seconds.unwrap_or(2.0);
    let frequency = req.frequency_hz.unwrap_or(220.0);
    let syllables = req.syllable_hz.unwrap_or(4.0);

    let max_seconds = state.get_config().performance.max_audio_seconds;
    if !(duration > 0.0 && duration <= max_seconds as f64) {
        return Err(AppError::ValidationError(format!(
            "duration_seconds must be in (0, {}]",
            max_seconds
        )));
    }
    if !(frequency > 0.0 && frequency < format::SAMPLE_RATE as f64 / 2.0) {
        return Err(AppError::ValidationError(format!(
            "frequency_hz must be below the Nyquist limit of {} Hz",
            format::SAMPLE_RATE / 2
        )));
    }
    if !(syllables > 0.0) {
        return Err(AppError::ValidationError(
            "syllable_hz must be positive".to_string(),
        ));
    }

    tracing::info!(
        "Debug: Testing lip sync with {:.1}s of {:.0}Hz tone at {:.1} syllables/s",
        duration,
        frequency,
        syllables
    );

    let wav = encode_pcm16_wav(&speech_like_tone(duration, frequency, syllables));
    let wav_bytes = wav.len();
    let analysis = run_analysis(&state, web::Bytes::from(wav), true).await?;

    tracing::info!("Debug: Generated {} mouth cues", analysis.result.len());

    Ok(HttpResponse::Ok().json(TestLipSyncResponse {
        success: true,
        test_audio_info: format!(
            "Generated {:.1}s of {:.0}Hz tone with {:.1}Hz syllable envelope",
            duration, frequency, syllables
        ),
        wav_bytes,
        analysis,
    }))
}

/// Get debug info about the expected input format and active settings
///
/// GET /debug/environment
pub async fn debug_environment(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let env_info = serde_json::json!({
        "rust_log": std::env::var("RUST_LOG").unwrap_or_else(|_| "not set".to_string()),
        "input_format": {
            "header_bytes": format::HEADER_BYTES,
            "sample_rate": format::SAMPLE_RATE,
            "channels": format::CHANNELS,
            "bits_per_sample": format::BITS_PER_SAMPLE,
            "frames_per_second": format::FRAMES_PER_SECOND,
        },
        "strict_format": config.lipsync.strict_format,
        "max_audio_seconds": config.performance.max_audio_seconds,
        "max_payload_bytes": config.performance.max_payload_bytes,
    });

    Ok(HttpResponse::Ok().json(env_info))
}

/// Configuration for debug routes
pub fn configure_debug_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/debug")
            .route("/test-lipsync", web::post().to(test_lipsync))
            .route("/environment", web::get().to(debug_environment)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_synthetic_lipsync_has_open_mouth_frames() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .configure(configure_debug_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/debug/test-lipsync")
            .set_json(serde_json::json!({"duration_seconds": 3.0}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["wav_bytes"], 44 + 3 * 24_000 * 2);

        let cues = body["analysis"]["mouthCues"].as_array().unwrap();
        assert_eq!(cues.len(), 72);
        assert!(cues.iter().any(|cue| cue["value"] != "B"));
        assert_eq!(body["analysis"]["diagnostics"]["total_frames"], 72);
    }

    #[actix_web::test]
    async fn test_rejects_out_of_range_duration() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .configure(configure_debug_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/debug/test-lipsync")
            .set_json(serde_json::json!({"duration_seconds": -1.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_environment_reports_format() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .configure(configure_debug_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/debug/environment").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["input_format"]["sample_rate"], 24_000);
        assert_eq!(body["input_format"]["header_bytes"], 44);
    }
}
