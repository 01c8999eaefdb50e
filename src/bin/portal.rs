/// Wolbridge portal - public-facing authorization layer
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wolbridge::{config::PortalConfig, context::PortalContext, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wolbridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PortalConfig::from_env()?;
    let bind_host = config.bind_host.clone();
    let port = config.port;

    info!(
        trusted_domain = %config.trusted_domain,
        relay = %format!("{}:{}", config.relay_host, config.relay_port),
        "starting wolbridge portal v{}",
        env!("CARGO_PKG_VERSION")
    );

    let ctx = PortalContext::new(config).await?;
    server::serve(server::portal_router(ctx), &bind_host, port).await?;

    Ok(())
}
