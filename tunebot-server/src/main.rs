use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use tunebot_core::BotConfig;

mod context;
mod server;

fn init_tracing() {
    // Songbird and symphonia log through the `log` facade.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge already installed: {e}");
    }
    let filter = EnvFilter::from_default_env()
        .add_directive("tunebot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = BotConfig::from_env()?;
    info!("TuneBot starting. {config:?}");

    if let Err(e) = server::run_server(config).await {
        error!("Server error: {e}");
        return Err(e.into());
    }
    Ok(())
}
