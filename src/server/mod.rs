pub mod admin;
pub mod ws_handler;

use axum::{routing::get, Router};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::types::TradeEvent;

use admin::AdminState;
use ws_handler::ws_handler;

pub fn build_telemetry_router(events_tx: broadcast::Sender<TradeEvent>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(events_tx)
}

pub fn build_admin_router(admin_state: AdminState) -> Router {
    use axum::{middleware, routing::post};

    Router::new()
        .route("/admin/status", get(admin::get_status))
        .route("/admin/reset", post(admin::post_reset))
        .route("/admin/trainer", post(admin::post_trainer))
        .layer(middleware::from_fn_with_state(
            admin_state.clone(),
            admin::require_bearer_token,
        ))
        .with_state(admin_state)
}
