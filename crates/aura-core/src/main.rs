//! Aura Core entrypoint: wire the context, start serving, install the
//! metabolism in the background so health checks come up immediately.

use anyhow::Context as _;
use aura_core::{AppContext, Settings};
use aura_telemetry::{init_telemetry, TelemetryConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Environment first so telemetry and settings both see it.
    if let Ok(path) = dotenvy::dotenv() {
        println!("loaded environment from {}", path.display());
    }

    let _guard = init_telemetry(TelemetryConfig::for_service("aura-core"))
        .await
        .context("telemetry init failed")?;

    let settings = Settings::load().context("configuration invalid")?;
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("invalid server bind address")?;

    info!(
        event = "startup_begin",
        service = "aura-core",
        %addr,
        crypto_enabled = settings.crypto.enabled,
        model = %settings.llm.model,
        "starting"
    );

    let ctx = AppContext::initialize(settings)
        .await
        .context("context initialization failed")?;

    // Deferred initialization: the server accepts health checks (and
    // returns UNAVAILABLE on Negotiate) while the reasoner loads.
    {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            if let Err(e) = ctx.install_metabolism().await {
                error!(event = "metabolism_install_failed", error = %e, "service will stay not-ready");
            }
        });
    }

    aura_core::rpc::serve(ctx, addr)
        .await
        .context("gRPC server terminated")?;
    Ok(())
}
