use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{demo, peers, users};
use crate::clients::echo_probe::EchoProbe;
use crate::clients::event_sampler::EventSampler;
use crate::config::Config;
use crate::db::repo;
use crate::error::Result;
use crate::service::users::UserService;

/// Process-wide state, built once at startup and shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub sampler: EventSampler,
    pub probe: EchoProbe,
    pub peer_interval: Duration,
}

impl AppState {
    pub fn new(users: UserService, config: &Config) -> Result<Self> {
        Ok(Self {
            users,
            sampler: EventSampler::new(&config.sse_url, config.sample_size)?,
            probe: EchoProbe::new(
                config.echo_url.as_str(),
                config.echo_message.as_str(),
                config.echo_timeout(),
            ),
            peer_interval: config.peer_interval(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/user", get(users::list).post(users::create))
        .route(
            "/user/client",
            get(demo::client)
                .put(users::update_named)
                .delete(users::delete_named),
        )
        .route(
            "/user/ws",
            get(demo::ws).put(users::update_named).delete(users::delete_named),
        )
        .route(
            "/user/{id}",
            get(users::get_by_id).put(users::update).delete(users::delete),
        )
        .route("/sse/randomNumbers", get(peers::random_numbers))
        .route("/echo", get(peers::echo))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: Config) -> Result<()> {
    let pool = repo::connect(&config.database_url, config.db_max_connections).await?;
    repo::create_user_table(&pool).await?;

    let state = Arc::new(AppState::new(UserService::new(pool.clone()), &config)?);
    info!(
        "Sampling events from {}, probing {}",
        state.sampler.url(),
        state.probe.url()
    );

    let listener = TcpListener::bind(config.bind_address).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
