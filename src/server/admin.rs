use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::protocol::engine::TradeEngine;
use crate::species::species_name;
use crate::storage::SlotTable;
use crate::types::SessionSnapshot;

#[derive(Clone)]
pub struct AdminState {
    pub token: String,
    pub engine: Arc<Mutex<TradeEngine>>,
    pub slots: Arc<Mutex<SlotTable>>,
}

/// Axum middleware: require `Authorization: Bearer <token>` header.
pub async fn require_bearer_token(
    State(admin): State<AdminState>,
    req: Request,
    next: Next,
) -> Response {
    let auth = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth {
        Some(value) if value == format!("Bearer {}", admin.token) => next.run(req).await,
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct StoredView {
    pub slot: usize,
    pub species: u8,
    pub species_name: &'static str,
    pub level: u8,
    pub nickname: String,
    pub ot_name: String,
    pub source: String,
    pub stored_at_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session: SessionSnapshot,
    pub stored: Vec<StoredView>,
    pub capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct SetTrainerRequest {
    pub id: u16,
    pub name: String,
}

pub async fn get_status(State(admin): State<AdminState>) -> Json<StatusResponse> {
    let session = admin.engine.lock().snapshot();
    let slots = admin.slots.lock();
    let stored = slots
        .list()
        .into_iter()
        .map(|(slot, s)| StoredView {
            slot,
            species: s.pokemon.core.species,
            species_name: species_name(s.pokemon.core.species),
            level: s.pokemon.core.level,
            nickname: s.pokemon.nickname.clone(),
            ot_name: s.pokemon.ot_name.clone(),
            source: s.source.clone(),
            stored_at_ms: s.stored_at_ms,
        })
        .collect();
    let capacity = slots.capacity();
    Json(StatusResponse { session, stored, capacity })
}

pub async fn post_reset(State(admin): State<AdminState>) -> StatusCode {
    admin.engine.lock().reset();
    StatusCode::OK
}

pub async fn post_trainer(
    State(admin): State<AdminState>,
    Json(req): Json<SetTrainerRequest>,
) -> StatusCode {
    admin.engine.lock().set_local_trainer(req.id, &req.name);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::session::TrainerIdentity;
    use axum::{
        middleware,
        routing::{get, post},
        Router,
    };
    use axum_test::TestServer;

    fn make_state(token: &str) -> AdminState {
        let mut table = SlotTable::new(8);
        table.seed_demo();
        let slots = Arc::new(Mutex::new(table));
        let engine = TradeEngine::new(
            Box::new(Arc::clone(&slots)),
            TrainerIdentity { id: 7, name: "RED".into() },
        );
        AdminState {
            token: token.into(),
            engine: Arc::new(Mutex::new(engine)),
            slots,
        }
    }

    fn build_app(state: AdminState) -> Router {
        Router::new()
            .route("/admin/status", get(get_status))
            .route("/admin/reset", post(post_reset))
            .route("/admin/trainer", post(post_trainer))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                require_bearer_token,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_status_requires_auth() {
        let server = TestServer::new(build_app(make_state("secret"))).unwrap();
        let res = server.get("/admin/status").await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_with_valid_token() {
        let server = TestServer::new(build_app(make_state("secret"))).unwrap();
        let res = server
            .get("/admin/status")
            .add_header(
                axum::http::header::AUTHORIZATION,
                axum::http::HeaderValue::from_static("Bearer secret"),
            )
            .await;
        assert_eq!(res.status_code(), StatusCode::OK);
        let body: serde_json::Value = res.json();
        assert_eq!(body["session"]["phase"], "IDLE");
        assert_eq!(body["session"]["outgoing_sent"], false);
        assert_eq!(body["stored"].as_array().unwrap().len(), 3);
        assert_eq!(body["stored"][0]["species_name"], "PIKACHU");
    }

    #[tokio::test]
    async fn test_status_with_wrong_token() {
        let server = TestServer::new(build_app(make_state("secret"))).unwrap();
        let res = server
            .get("/admin/status")
            .add_header(
                axum::http::header::AUTHORIZATION,
                axum::http::HeaderValue::from_static("Bearer wrongtoken"),
            )
            .await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_post_trainer_updates_snapshot() {
        let state = make_state("tok");
        let server = TestServer::new(build_app(state.clone())).unwrap();
        let res = server
            .post("/admin/trainer")
            .add_header(
                axum::http::header::AUTHORIZATION,
                axum::http::HeaderValue::from_static("Bearer tok"),
            )
            .json(&serde_json::json!({"id": 99, "name": "LANCE"}))
            .await;
        assert_eq!(res.status_code(), StatusCode::OK);
        let snap = state.engine.lock().snapshot();
        assert_eq!(snap.trainer_id, 99);
        assert_eq!(snap.trainer_name, "LANCE");
    }

    #[tokio::test]
    async fn test_post_reset_returns_to_idle() {
        let state = make_state("tok");
        state.engine.lock().step(0x01); // mid-handshake
        let server = TestServer::new(build_app(state.clone())).unwrap();
        let res = server
            .post("/admin/reset")
            .add_header(
                axum::http::header::AUTHORIZATION,
                axum::http::HeaderValue::from_static("Bearer tok"),
            )
            .await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(state.engine.lock().snapshot().phase.as_str(), "IDLE");
    }
}
