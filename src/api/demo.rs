use axum::{extract::State, http::StatusCode};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::server::AppState;

/// Samples the configured event stream in the background and answers right away.
pub async fn client(State(state): State<Arc<AppState>>) -> StatusCode {
    let sampler = state.sampler.clone();

    tokio::spawn(async move {
        match sampler.sample().await {
            Ok(batch) => {
                println!("{batch:?}");
                info!("Sampled {} events from {}", batch.len(), sampler.url());
            }
            Err(err) => warn!("Sampling {} failed: {err}", sampler.url()),
        }
    });

    StatusCode::ACCEPTED
}

/// Probes the configured echo socket in the background and answers right away.
pub async fn ws(State(state): State<Arc<AppState>>) -> StatusCode {
    let probe = state.probe.clone();

    tokio::spawn(async move {
        match probe.probe().await {
            Ok(reply) => {
                println!("{reply}");
                info!("Echo reply from {}: {reply}", probe.url());
            }
            Err(err) => warn!("Probing {} failed: {err}", probe.url()),
        }
    });

    StatusCode::ACCEPTED
}
