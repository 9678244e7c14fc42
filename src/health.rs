use crate::state::{AppMetrics, AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "avatar-lipsync-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(&metrics),
            "active_analyses": metrics.active_analyses
        },
        "memory": get_memory_info(),
        "lipsync": {
            "input_format": {
                "header_bytes": crate::lipsync::format::HEADER_BYTES,
                "sample_rate": crate::lipsync::format::SAMPLE_RATE,
                "channels": crate::lipsync::format::CHANNELS,
                "bits_per_sample": crate::lipsync::format::BITS_PER_SAMPLE
            },
            "frames_per_second": crate::lipsync::format::FRAMES_PER_SECOND,
            "strict_format": config.lipsync.strict_format
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();
    let config = state.get_config();

    let endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": error_rate(&metrics),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "analysis": {
            "active": metrics.active_analyses,
            "completed": metrics.analysis.completed,
            "rejected": metrics.analysis.rejected,
            "frames_emitted": metrics.analysis.frames_emitted,
            "audio_seconds_analyzed": metrics.analysis.audio_seconds,
            "average_duration_ms": metrics.analysis.average_duration_ms()
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info(),
        "limits": {
            "max_payload_bytes": config.performance.max_payload_bytes,
            "max_audio_seconds": config.performance.max_audio_seconds
        }
    }))
}

fn error_rate(metrics: &AppMetrics) -> f64 {
    if metrics.request_count > 0 {
        metrics.error_count as f64 / metrics.request_count as f64
    } else {
        0.0
    }
}

#[cfg(target_os = "linux")]
fn get_memory_info() -> serde_json::Value {
    let pid = std::process::id();

    if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
        let mut vm_rss = 0;
        let mut vm_size = 0;

        for line in status.lines() {
            if line.starts_with("VmRSS:") {
                if let Some(kb_str) = line.split_whitespace().nth(1) {
                    vm_rss = kb_str.parse::<u64>().unwrap_or(0) * 1024;
                }
            } else if line.starts_with("VmSize:") {
                if let Some(kb_str) = line.split_whitespace().nth(1) {
                    vm_size = kb_str.parse::<u64>().unwrap_or(0) * 1024;
                }
            }
        }

        return json!({
            "resident_memory_bytes": vm_rss,
            "virtual_memory_bytes": vm_size,
            "available": true
        });
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": "Could not read /proc status"
    })
}

#[cfg(not(target_os = "linux"))]
fn get_memory_info() -> serde_json::Value {
    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": "Memory info not available on this platform"
    })
}
