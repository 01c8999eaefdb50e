/// Wolbridge relay - LAN-side gateway with direct reach to the target
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wolbridge::{config::RelayConfig, context::RelayContext, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wolbridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env()?;
    let bind_host = config.bind_host.clone();
    let port = config.port;

    info!(
        target = %config.target.host,
        mac = %config.target.mac,
        "starting wolbridge relay v{}",
        env!("CARGO_PKG_VERSION")
    );

    let ctx = RelayContext::new(config)?;
    server::serve(server::relay_router(ctx), &bind_host, port).await?;

    Ok(())
}
