//! Control server
//!
//! Small HTTP surface next to the poll loop: query a channel on demand and
//! check liveness. The message endpoint runs a real fetch+process pass, so
//! it shares the poller's pass mutex and can never double-dispatch against
//! the timer.

use crate::error::Result;
use crate::poller::Poller;
use crate::types::MessageReport;
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Serialize)]
struct HealthReply {
    status: &'static str,
    processed_keys: usize,
}

/// On-demand pass for one channel. Best-effort: a failed fetch is an empty
/// list, per-message failures show up as their dispositions.
async fn get_messages(
    Path(channel): Path<String>,
    State(poller): State<Arc<Poller>>,
) -> Json<Vec<MessageReport>> {
    Json(poller.process_channel(&channel).await)
}

async fn health(State(poller): State<Arc<Poller>>) -> Json<HealthReply> {
    Json(HealthReply {
        status: "ok",
        processed_keys: poller.processed_keys().await,
    })
}

pub fn create_router(poller: Arc<Poller>) -> Router {
    Router::new()
        .route("/messages/{channel}", get(get_messages))
        .route("/health", get(health))
        .with_state(poller)
}

/// Bind the control socket. Runs before the poll loop starts, so an unusable
/// `server.bind` address fails startup instead of leaving the bot headless.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Control server listening on http://{}", addr);
    Ok(listener)
}

pub async fn serve(poller: Arc<Poller>, listener: TcpListener) -> Result<()> {
    let app = create_router(poller);
    axum::serve(listener, app).await?;
    Ok(())
}
