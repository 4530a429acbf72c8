use axum::extract::State;
use axum::Json;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::MetricsConfig;
use crate::domain::{AccountSnapshot, AddressMetrics, Fill, TimeMs, TransferStats};
use crate::engine::compute_metrics;
use crate::error::AppError;

/// One address's already-fetched history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRequest {
    pub user: String,
    #[serde(default)]
    pub fills: Vec<Value>,
    #[serde(default)]
    pub ledger: Vec<Value>,
    #[serde(default)]
    pub funding: Vec<Value>,
    pub clearinghouse_state: Option<Value>,
    pub snapshot_time_ms: Option<i64>,
    pub transfer_stats: Option<TransferStats>,
}

#[derive(Debug, Deserialize)]
pub struct BatchMetricsRequest {
    pub accounts: Vec<MetricsRequest>,
}

fn decode_fills(user: &str, raw: &[Value]) -> Vec<Fill> {
    raw.iter()
        .filter_map(|record| match Fill::from_json(record) {
            Ok(fill) => Some(fill),
            Err(e) => {
                warn!(user = %user, error = %e, "Skipping malformed fill");
                None
            }
        })
        .collect()
}

fn evaluate(request: MetricsRequest, config: &MetricsConfig) -> Result<AddressMetrics, AppError> {
    let snapshot = request
        .clearinghouse_state
        .as_ref()
        .map(|state| {
            AccountSnapshot::from_clearinghouse_state(
                state,
                request.snapshot_time_ms.map(TimeMs::new),
            )
        })
        .transpose()
        .map_err(|e| AppError::BadRequest(format!("Invalid clearinghouseState: {}", e)))?;

    let fills = decode_fills(&request.user, &request.fills);

    Ok(compute_metrics(
        &request.user,
        &fills,
        &request.ledger,
        &request.funding,
        snapshot.as_ref(),
        request.transfer_stats.as_ref(),
        config,
    )?)
}

pub async fn post_metrics(
    State(state): State<AppState>,
    Json(request): Json<MetricsRequest>,
) -> Result<Json<AddressMetrics>, AppError> {
    info!(
        user = %request.user,
        fills = request.fills.len(),
        ledger = request.ledger.len(),
        "Computing metrics"
    );
    let metrics = evaluate(request, &state.config.metrics)?;
    Ok(Json(metrics))
}

pub async fn post_metrics_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchMetricsRequest>,
) -> Result<Json<Vec<AddressMetrics>>, AppError> {
    let max = state.config.max_batch_size;
    if batch.accounts.len() > max {
        return Err(AppError::BadRequest(format!(
            "Batch of {} accounts exceeds limit of {}",
            batch.accounts.len(),
            max
        )));
    }

    info!(accounts = batch.accounts.len(), "Computing batch metrics");

    let config = state.config.metrics;
    let tasks = batch.accounts.into_iter().map(|request| async move {
        tokio::task::spawn_blocking(move || evaluate(request, &config)).await?
    });
    let results = try_join_all(tasks).await?;

    Ok(Json(results))
}
