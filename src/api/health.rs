use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Ready once configuration is loaded; reports the active metrics settings.
pub async fn ready(State(state): State<AppState>) -> Json<Value> {
    let metrics = &state.config.metrics;
    Json(json!({
        "status": "ready",
        "pnlMode": match metrics.pnl_mode {
            crate::config::PnlMode::Gross => "gross",
            crate::config::PnlMode::Net => "net",
        },
        "riskFreeRate": metrics.risk_free_rate,
        "drawdownThreshold": metrics.drawdown_threshold,
        "maxBatchSize": state.config.max_batch_size,
    }))
}
