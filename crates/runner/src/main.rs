use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scripto_runner::cli::Cli;
use scripto_runner::config::RunnerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scripto_runner=info,scripto_core=info,scripto_redis=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- Configuration ---
    let cli = Cli::parse();
    let config = RunnerConfig::from_env()?;
    tracing::info!(
        redis_url = %config.redis_url,
        script_dir = %config.script_dir.display(),
        "Loaded runner configuration",
    );

    let reply = scripto_runner::execute(&cli, &config).await?;
    println!("{reply:?}");
    Ok(())
}
