use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::activity::ActivityView;
use crate::dashboard::{self, DashboardView};
use crate::error::FarmError;
use crate::lifecycle::EmergencyReport;
use crate::orchestrator::OperationPreview;
use crate::positions::{PositionFilter, PositionsView};
use crate::state::FarmState;
use crate::types::{
    ActivityLog, ApiResponse, Position, PositionId, TradeConfig, WalletId, AVAILABLE_VENUES,
    TRADING_PAIRS,
};
use crate::wallets::{Chain, WalletsOverview};

type ApiResult<T> = Result<Json<ApiResponse<T>>, FarmError>;

#[derive(Debug, Deserialize)]
pub struct WalletsQuery {
    pub chain: Option<Chain>,
}

#[derive(Debug, Deserialize)]
pub struct SetTag {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub struct EmergencyRequest {
    pub confirmation: String,
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "vikings-farm",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /catalog - selectable venues and pairs
pub async fn get_catalog() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::ok(serde_json::json!({
        "venues": AVAILABLE_VENUES,
        "pairs": TRADING_PAIRS,
    })))
}

/// GET /wallets
pub async fn get_wallets(
    State(state): State<Arc<FarmState>>,
    Query(query): Query<WalletsQuery>,
) -> Json<ApiResponse<WalletsOverview>> {
    Json(ApiResponse::ok(
        state.wallets_overview(query.chain.unwrap_or_default()),
    ))
}

/// PUT /wallets/:wallet_id/tag
pub async fn set_wallet_tag(
    State(state): State<Arc<FarmState>>,
    Path(wallet_id): Path<String>,
    Json(input): Json<SetTag>,
) -> ApiResult<serde_json::Value> {
    let tag = state.set_wallet_tag(&WalletId(wallet_id.clone()), &input.tag)?;
    Ok(Json(ApiResponse::ok(serde_json::json!({
        "wallet_id": wallet_id,
        "tag": tag,
    }))))
}

/// GET /dashboard
pub async fn get_dashboard(State(state): State<Arc<FarmState>>) -> Json<ApiResponse<DashboardView>> {
    Json(ApiResponse::ok(dashboard::view(state.stats())))
}

/// POST /operations/preview - estimate without staging
pub async fn preview_operation(
    State(state): State<Arc<FarmState>>,
    Json(config): Json<TradeConfig>,
) -> Json<ApiResponse<OperationPreview>> {
    Json(ApiResponse::ok(state.preview(&config)))
}

/// POST /operations/stage
pub async fn stage_operation(
    State(state): State<Arc<FarmState>>,
    Json(config): Json<TradeConfig>,
) -> ApiResult<OperationPreview> {
    Ok(Json(ApiResponse::ok(state.stage_operation(config)?)))
}

/// POST /operations/confirm
pub async fn confirm_operation(State(state): State<Arc<FarmState>>) -> ApiResult<Vec<Position>> {
    let batch = state.confirm_operation()?;
    Ok(Json(ApiResponse::ok(batch.positions)))
}

/// DELETE /operations/pending
pub async fn cancel_operation(
    State(state): State<Arc<FarmState>>,
) -> ApiResult<serde_json::Value> {
    let cancelled = state.cancel_operation()?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "cancelled": cancelled }))))
}

/// POST /operations - submit without the preview step
pub async fn submit_operation(
    State(state): State<Arc<FarmState>>,
    Json(config): Json<TradeConfig>,
) -> ApiResult<Vec<Position>> {
    let batch = state.submit_operation(&config)?;
    Ok(Json(ApiResponse::ok(batch.positions)))
}

/// GET /positions?venue=&side=&status=
pub async fn get_positions(
    State(state): State<Arc<FarmState>>,
    Query(filter): Query<PositionFilter>,
) -> ApiResult<PositionsView> {
    Ok(Json(ApiResponse::ok(state.positions_view(&filter)?)))
}

/// POST /positions/:position_id/close
pub async fn close_position(
    State(state): State<Arc<FarmState>>,
    Path(position_id): Path<String>,
) -> ApiResult<ActivityLog> {
    let log = state.close_position(&PositionId(position_id))?;
    Ok(Json(ApiResponse::ok(log)))
}

/// POST /positions/:position_id/cancel-close
pub async fn cancel_close(
    State(state): State<Arc<FarmState>>,
    Path(position_id): Path<String>,
) -> ApiResult<Position> {
    let position = state.cancel_close(&PositionId(position_id))?;
    Ok(Json(ApiResponse::ok(position)))
}

/// POST /positions/close-all
pub async fn close_all(State(state): State<Arc<FarmState>>) -> ApiResult<Vec<ActivityLog>> {
    Ok(Json(ApiResponse::ok(state.close_all()?)))
}

/// POST /emergency-close
pub async fn emergency_close(
    State(state): State<Arc<FarmState>>,
    Json(input): Json<EmergencyRequest>,
) -> ApiResult<EmergencyReport> {
    Ok(Json(ApiResponse::ok(
        state.emergency_close(&input.confirmation)?,
    )))
}

/// GET /activity - newest first
pub async fn get_activity(State(state): State<Arc<FarmState>>) -> ApiResult<Vec<ActivityView>> {
    Ok(Json(ApiResponse::ok(state.activity_view()?)))
}

/// GET /activity/export - CSV download
pub async fn export_activity(State(state): State<Arc<FarmState>>) -> Result<Response, FarmError> {
    let (filename, csv) = state.export_activity()?;
    let disposition = format!("attachment; filename=\"{filename}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
