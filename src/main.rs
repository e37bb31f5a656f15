use acmehook::{Config, Harness, SharedConfig};
use anyhow::{bail, Context, Result};
use is_terminal::IsTerminal;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let config = config_init()?;
    let store = config.record_store().await?;

    let stop = CancellationToken::new();
    let harness = Harness::start(&config, store, &stop).await?;

    signal::ctrl_c().await?;
    tracing::info!("quitting from signal");
    stop.cancel();
    harness.stop().await;

    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acmehook=info".into()),
        )
        .init();
}

fn config_init() -> Result<SharedConfig> {
    let mut args = std::env::args();
    let program_name = args.next().unwrap_or_else(|| "acmehook".to_string());
    let Some(config_path) = args.next() else {
        bail!("usage: {program_name} /path/to/config.json");
    };

    let config = Config::try_from_file(&config_path)
        .with_context(|| format!("could not load config from {config_path}"))?;
    tracing::debug!(
        dns = %config.dns_udp_bind_addr,
        domains = ?config.domains,
        "loaded config from {config_path}"
    );
    Ok(Arc::new(config))
}
