use crate::{config::AppConfig, error::AppResult, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

fn config_json(config: &AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "lipsync": {
            "strict_format": config.lipsync.strict_format,
            "log_distributions": config.lipsync.log_distributions
        },
        "performance": {
            "max_payload_bytes": config.performance.max_payload_bytes,
            "max_audio_seconds": config.performance.max_audio_seconds
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_json(&config)
    })))
}

/// Apply a partial configuration update.
///
/// `server` changes are stored but only take effect after a restart. Lip-sync
/// and limit changes apply to the next request.
pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| crate::error::AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(crate::error::AppError::ValidationError)?;

    tracing::info!(
        strict_format = current_config.lipsync.strict_format,
        max_audio_seconds = current_config.performance.max_audio_seconds,
        "Configuration updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_json(&current_config)
    })))
}
