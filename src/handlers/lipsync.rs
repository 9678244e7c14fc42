//! # Lip-Sync REST API Handlers
//!
//! Turns synthesized speech into mouth cues for the avatar renderer. Each
//! request carries its own audio and gets its own cue list back; nothing is
//! written to disk or kept in server state.
//!
//! ## Available Endpoints:
//! - `POST /api/v1/lipsync` - Raw WAV bytes in the body (`application/octet-stream`)
//! - `POST /api/v1/lipsync/upload` - Multipart form with an `audio` file field
//!
//! Both accept `?diagnostics=true` to include the analysis report.
//!
//! ## Response:
//! ```json
//! {
//!   "mouthCues": [
//!     { "start": 0.0, "end": 0.041666666666666664, "value": "B" },
//!     { "start": 0.041666666666666664, "end": 0.08333333333333333, "value": "C" }
//!   ]
//! }
//! ```

use crate::error::{AppError, AppResult};
use crate::lipsync::{AnalysisReport, LipSyncResult};
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Name of the multipart field holding the audio file.
pub const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// Include the `AnalysisReport` in the response
    #[serde(default)]
    pub diagnostics: bool,
}

/// Cue list plus optional diagnostics.
///
/// The cue list is flattened so clients that only know the `mouthCues`
/// shape can read the response unchanged.
#[derive(Debug, Serialize)]
pub struct LipSyncResponse {
    #[serde(flatten)]
    pub result: LipSyncResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<AnalysisReport>,
}

/// Analyze a WAV buffer sent as the raw request body.
///
/// ## Endpoint: `POST /api/v1/lipsync`
pub async fn analyze_audio(
    state: web::Data<AppState>,
    query: web::Query<AnalyzeQuery>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let response = run_analysis(&state, body, query.diagnostics).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Analyze a WAV file uploaded as multipart form data.
///
/// ## Endpoint: `POST /api/v1/lipsync/upload`
///
/// The first field named `audio` is analyzed; any other fields are drained
/// and ignored.
pub async fn analyze_upload(
    state: web::Data<AppState>,
    query: web::Query<AnalyzeQuery>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let limit = state.get_config().performance.max_payload_bytes;
    let audio = read_audio_field(&mut payload, limit).await?;

    let response = run_analysis(&state, audio, query.diagnostics).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn read_audio_field(payload: &mut Multipart, limit: usize) -> AppResult<web::Bytes> {
    let mut audio: Option<web::BytesMut> = None;

    while let Some(field) = payload.next().await {
        let mut field = field?;
        let wanted = audio.is_none() && field.name() == Some(AUDIO_FIELD);
        let mut buffer = web::BytesMut::new();

        // Unwanted fields still have to be read to reach the next one
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if !wanted {
                continue;
            }
            if buffer.len() + chunk.len() > limit {
                return Err(AppError::PayloadTooLarge(format!(
                    "Audio upload exceeds {} bytes",
                    limit
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        if wanted {
            audio = Some(buffer);
        }
    }

    audio
        .map(|buffer| buffer.freeze())
        .ok_or_else(|| AppError::BadRequest(format!("Missing '{}' file field", AUDIO_FIELD)))
}

/// Run one analysis on the blocking pool and record its metrics.
///
/// The analyzer is CPU-bound and synchronous, so it must not run on the
/// async worker threads.
pub(crate) async fn run_analysis(
    state: &web::Data<AppState>,
    audio: web::Bytes,
    include_diagnostics: bool,
) -> AppResult<LipSyncResponse> {
    let limit = state.get_config().performance.max_payload_bytes;
    if audio.len() > limit {
        return Err(AppError::PayloadTooLarge(format!(
            "Audio buffer is {} bytes, limit is {}",
            audio.len(),
            limit
        )));
    }

    let analyzer = state.analyzer();

    let active = state.begin_analysis();
    let outcome = web::block(move || analyzer.analyze_checked(&audio)).await;
    drop(active);

    let (result, report) = match outcome? {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(error = %e, "Rejected audio buffer");
            state.record_rejected_analysis();
            return Err(e.into());
        }
    };

    state.record_analysis(result.len(), report.audio_seconds, report.elapsed_ms);

    Ok(LipSyncResponse {
        result,
        diagnostics: include_diagnostics.then_some(report),
    })
}

/// Configuration for lip-sync routes (mounted under `/api/v1`).
pub fn configure_lipsync_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/lipsync")
            .route("", web::post().to(analyze_audio))
            .route("/upload", web::post().to(analyze_upload)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, PAYLOAD_CEILING_BYTES};
    use crate::lipsync::format::encode_pcm16_wav;
    use crate::lipsync::signal::speech_like_tone;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};

    fn app_state(config: AppConfig) -> web::Data<AppState> {
        web::Data::new(AppState::new(config))
    }

    fn multipart_body(boundary: &str, name: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"speech.wav\"\r\n",
                name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        body
    }

    #[actix_web::test]
    async fn test_raw_body_returns_cues() {
        let state = app_state(AppConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(configure_lipsync_routes),
        )
        .await;

        let wav = encode_pcm16_wav(&speech_like_tone(1.0, 200.0, 4.0));
        let req = test::TestRequest::post()
            .uri("/lipsync")
            .insert_header((header::CONTENT_TYPE, "application/octet-stream"))
            .set_payload(wav)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let cues = body["mouthCues"].as_array().unwrap();
        assert_eq!(cues.len(), 24);
        assert_eq!(cues[0]["value"], "B");
        assert_eq!(cues[23]["value"], "B");
        assert!(body.get("diagnostics").is_none());

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.analysis.completed, 1);
        assert_eq!(metrics.analysis.frames_emitted, 24);
        assert_eq!(metrics.active_analyses, 0);
    }

    #[actix_web::test]
    async fn test_diagnostics_are_opt_in() {
        let app = test::init_service(
            App::new()
                .app_data(app_state(AppConfig::default()))
                .configure(configure_lipsync_routes),
        )
        .await;

        let wav = encode_pcm16_wav(&speech_like_tone(2.0, 200.0, 4.0));
        let req = test::TestRequest::post()
            .uri("/lipsync?diagnostics=true")
            .set_payload(wav)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["diagnostics"]["total_frames"], 48);
        assert_eq!(body["diagnostics"]["target_minimum"], 2);
        assert_eq!(body["mouthCues"].as_array().unwrap().len(), 48);
    }

    #[actix_web::test]
    async fn test_short_buffer_is_rejected() {
        let state = app_state(AppConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(configure_lipsync_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/lipsync")
            .set_payload(vec![0u8; 12])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "validation_error");
        assert_eq!(state.get_metrics_snapshot().analysis.rejected, 1);
    }

    #[actix_web::test]
    async fn test_header_only_buffer_has_empty_cues() {
        let app = test::init_service(
            App::new()
                .app_data(app_state(AppConfig::default()))
                .configure(configure_lipsync_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/lipsync")
            .set_payload(encode_pcm16_wav(&[]))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["mouthCues"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn test_strict_format_rejects_foreign_header() {
        let mut config = AppConfig::default();
        config.lipsync.strict_format = true;
        let app = test::init_service(
            App::new()
                .app_data(app_state(config))
                .configure(configure_lipsync_routes),
        )
        .await;

        let mut wav = encode_pcm16_wav(&[0i16; 4800]);
        wav[24..28].copy_from_slice(&44_100u32.to_le_bytes());
        let req = test::TestRequest::post()
            .uri("/lipsync")
            .set_payload(wav)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_payload_limit() {
        let mut config = AppConfig::default();
        config.performance.max_payload_bytes = 1000;
        let app = test::init_service(
            App::new()
                .app_data(app_state(config))
                .configure(configure_lipsync_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/lipsync")
            .set_payload(encode_pcm16_wav(&[0i16; 2400]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[actix_web::test]
    async fn test_raised_payload_limit_applies_without_restart() {
        let mut config = AppConfig::default();
        config.performance.max_payload_bytes = 1000;
        let state = app_state(config);
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .app_data(web::PayloadConfig::new(PAYLOAD_CEILING_BYTES))
                .configure(configure_lipsync_routes),
        )
        .await;

        let wav = encode_pcm16_wav(&[0i16; 2400]);
        let req = test::TestRequest::post()
            .uri("/lipsync")
            .set_payload(wav.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let mut raised = state.get_config();
        raised
            .update_from_json(r#"{"performance": {"max_payload_bytes": 1000000}}"#)
            .unwrap();
        state.update_config(raised).unwrap();

        let req = test::TestRequest::post()
            .uri("/lipsync")
            .set_payload(wav)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_multipart_upload() {
        let app = test::init_service(
            App::new()
                .app_data(app_state(AppConfig::default()))
                .configure(configure_lipsync_routes),
        )
        .await;

        let boundary = "lipsyncboundary";
        let wav = encode_pcm16_wav(&speech_like_tone(0.5, 200.0, 4.0));
        let req = test::TestRequest::post()
            .uri("/lipsync/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(multipart_body(boundary, AUDIO_FIELD, &wav))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["mouthCues"].as_array().unwrap().len(), 12);
    }

    #[actix_web::test]
    async fn test_multipart_without_audio_field() {
        let app = test::init_service(
            App::new()
                .app_data(app_state(AppConfig::default()))
                .configure(configure_lipsync_routes),
        )
        .await;

        let boundary = "lipsyncboundary";
        let req = test::TestRequest::post()
            .uri("/lipsync/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(multipart_body(boundary, "notes", b"hello"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
