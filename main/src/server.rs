mod app;
mod stubs;
mod tools;
mod routes;

use common::config::get_config;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    let port = std::env::var("HTTP_PORT").ok().and_then(|v| v.parse::<u16>().ok()).unwrap_or(8080);

    let state = app::AppState::build(config).await?;
    let app = routes::router(state);

    let serve_address = format!("0.0.0.0:{port}");
    info!(address = %serve_address, "starting server");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
