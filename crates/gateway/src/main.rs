use clap::Parser;
use shelf_client_sdk::ApiClient;
use shelf_gateway::{config::GatewayConfig, probe::probe_service_account, router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(name = "shelf-gateway", version, about = "Product admin gateway")]
struct Args {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, env = "PORT", default_value_t = 9009)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let config = GatewayConfig::from_env();
    info!("Starting with {:?}", config);

    let api = ApiClient::new(&config.api_base_url)?;
    info!("Product API at {}", api.base_url());
    probe_service_account(&api, config.static_access_token.as_deref()).await;

    let state = Arc::new(AppState::new(config, Arc::new(api)));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!("Shelf gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
