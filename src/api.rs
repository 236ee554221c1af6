//! HTTP and WebSocket routes

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::FarmState;
use crate::websocket;

pub fn create_router(state: Arc<FarmState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/catalog", get(handlers::get_catalog))
        // Wallets & dashboard
        .route("/wallets", get(handlers::get_wallets))
        .route("/wallets/:wallet_id/tag", put(handlers::set_wallet_tag))
        .route("/dashboard", get(handlers::get_dashboard))
        // Operations
        .route("/operations", post(handlers::submit_operation))
        .route("/operations/preview", post(handlers::preview_operation))
        .route("/operations/stage", post(handlers::stage_operation))
        .route("/operations/confirm", post(handlers::confirm_operation))
        .route("/operations/pending", delete(handlers::cancel_operation))
        // Positions
        .route("/positions", get(handlers::get_positions))
        .route("/positions/close-all", post(handlers::close_all))
        .route("/positions/:position_id/close", post(handlers::close_position))
        .route("/positions/:position_id/cancel-close", post(handlers::cancel_close))
        .route("/emergency-close", post(handlers::emergency_close))
        // Activity
        .route("/activity", get(handlers::get_activity))
        .route("/activity/export", get(handlers::export_activity))
        .route("/ws", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
