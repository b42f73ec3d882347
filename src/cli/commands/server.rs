use clap::Args;
use std::sync::Arc;

use crate::config::config;
use crate::fixtures::Fixtures;
use crate::jsonapi::handler::ModelHandler;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (defaults to API_PORT/PORT or 8080)")]
    pub port: Option<u16>,

    #[arg(long, help = "Fixture file to seed from (defaults to FIXTURES_PATH or the demo data)")]
    pub fixtures: Option<String>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let config = config();
    tracing::info!("Starting moderator JSON:API in {:?} mode", config.environment);

    let fixtures_path = args.fixtures.or_else(|| config.server.fixtures_path.clone());
    let fixtures = Fixtures::load_or_demo(fixtures_path.as_deref())?;
    let types: Vec<String> = fixtures.types().map(String::from).collect();

    let handler: Arc<dyn ModelHandler> = Arc::new(fixtures.into_handler(&config.api.prefix));
    let app = crate::server::app(config, handler, types);

    let port = args.port.unwrap_or(config.server.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("Listening on http://{}{}", bind_addr, config.api.prefix);
    println!("🚀 Moderator JSON:API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
