use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env, default_value = "0.0.0.0:8080")]
    pub bind_address: SocketAddr,

    /// SQLite database URL. In-memory databases are pinned to a single connection.
    #[arg(long, env, default_value = "sqlite::memory:")]
    pub database_url: String,

    /// Maximum number of pooled database connections
    #[arg(long, env, default_value_t = 5)]
    pub db_max_connections: u32,

    /// Event stream consumed by `GET /user/client`
    #[arg(long, env, default_value = "http://localhost:8080/sse/randomNumbers")]
    pub sse_url: String,

    /// Number of non-empty events collected per sample
    #[arg(long, env, default_value_t = 10)]
    pub sample_size: usize,

    /// WebSocket endpoint probed by `GET /user/ws`
    #[arg(long, env, default_value = "ws://localhost:8080/echo")]
    pub echo_url: String,

    /// Text message sent by the echo probe
    #[arg(long, env, default_value = "Hello")]
    pub echo_message: String,

    /// How long the echo probe waits for a reply, in milliseconds
    #[arg(long, env, default_value_t = 5000)]
    pub echo_timeout_ms: u64,

    /// Delay between events on `/sse/randomNumbers`, in milliseconds
    #[arg(long, env, default_value_t = 1000)]
    pub peer_interval_ms: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env, default_value = "user_service=info,tower_http=info")]
    pub log_filter: String,
}

impl Config {
    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }

    pub fn peer_interval(&self) -> Duration {
        Duration::from_millis(self.peer_interval_ms)
    }
}
