use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vlc_playout::{
    config::Config,
    persist::TimelinePersistor,
    playout,
    probe::FfprobeMediaProbe,
    schedule::ScheduleBuilder,
};

#[derive(Parser)]
#[command(name = "vlc-playout")]
#[command(version = "0.1.0")]
#[command(about = "Compiles broadcast plans into a playout timeline and drives VLC to air it")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile all plan files into timeline artifacts
    Build,
    /// Drive the media player from previously built artifacts
    Play,
    /// Build, then play
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("vlc_playout={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vlc-playout v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    match cli.command {
        Commands::Build => build(&config).await?,
        Commands::Play => playout::run_playout(&config).await?,
        Commands::Run => {
            build(&config).await?;
            playout::run_playout(&config).await?;
        }
    }

    Ok(())
}

async fn build(config: &Config) -> Result<()> {
    info!("Build schedule");
    let probe = FfprobeMediaProbe::new(config.scheduling.ffprobe.clone());
    let mut builder = ScheduleBuilder::new(probe);
    let loaded = builder
        .load_plan_files(&config.scheduling.path, Utc::now())
        .await?;
    info!("Loaded {} plan files", loaded);

    let timeline = builder.compile()?;

    let persistor = TimelinePersistor::new(
        config.scheduling.out_dir.clone(),
        config.scheduling.out_priority_level,
    );
    persistor.save(&timeline)?;
    Ok(())
}
