pub mod assistant;
pub mod booking;
pub mod chat;
pub mod config;
pub mod llm;
pub mod notify;
pub mod partners;
pub mod shared;
pub mod storage;
pub mod tickets;

use axum::Router;
use shared::state::AppState;
use std::sync::Arc;

/// Full API surface: every module contributes its own router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(tickets::configure_ticket_routes())
        .merge(chat::configure_chat_routes())
        .merge(partners::configure_partner_routes())
        .merge(booking::configure_booking_routes())
        .route("/api/health", axum::routing::get(health))
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
