//! Aura Gateway entrypoint.

use anyhow::Context as _;
use aura_gateway::routes::router;
use aura_gateway::{AppState, GatewaySettings};
use aura_telemetry::{init_telemetry, TelemetryConfig};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(path) = dotenvy::dotenv() {
        println!("loaded environment from {}", path.display());
    }

    let _guard = init_telemetry(TelemetryConfig::for_service("aura-gateway"))
        .await
        .context("telemetry init failed")?;

    let settings = GatewaySettings::load().context("configuration invalid")?;
    let addr = format!("{}:{}", settings.gateway.host, settings.gateway.port);
    let cors = cors_layer(&settings.gateway.cors_origins)?;

    info!(
        event = "startup_begin",
        service = "aura-gateway",
        %addr,
        core = %settings.gateway.core_endpoint,
        "starting"
    );

    let state = AppState::new(settings).context("gateway state init failed")?;
    let app = router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(event = "startup_complete", %addr, "listening");

    axum::serve(listener, app)
        .await
        .context("http server terminated")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.iter().any(|o| o == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }
    let parsed = origins
        .iter()
        .map(|o| o.parse())
        .collect::<Result<Vec<_>, _>>()
        .context("invalid CORS origin")?;
    Ok(CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any))
}
