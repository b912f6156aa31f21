pub mod api;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod service;

use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), error::Error> {
    dotenvy::dotenv().ok();
    let config = config::Config::parse();

    logging::init_logger(&config);
    tracing::info!("Starting user service...");

    api::server::start_server(config).await
}
