use anyhow::{Context, Result};
use clap::Parser;
use resort_cli::{init_tracing, render_summary, OutputFormat};
use resort_core::Config;
use resort_db::{connect, run_migrations, PgEntityStore};
use resort_services::RetentionSweeper;
use resort_storage::create_object_store;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "retention_sweep")]
#[command(about = "Purge driver's-license documents past the retention window")]
struct Args {
    /// Run a single sweep and exit instead of running on a schedule
    #[arg(long)]
    once: bool,

    /// Override RETENTION_WINDOW_DAYS
    #[arg(long, value_name = "DAYS")]
    window_days: Option<i64>,

    /// Sweep as if today were this date (YYYY-MM-DD); only with --once
    #[arg(long, value_name = "DATE", requires = "once")]
    as_of: Option<chrono::NaiveDate>,

    /// Apply pending database migrations before sweeping
    #[arg(long)]
    migrate: bool,

    /// Output format for --once: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let format: OutputFormat = args.format.parse()?;

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(days) = args.window_days {
        config.0.retention.window_days = days;
    }
    config.validate()?;

    let media = create_object_store(&config).context("Failed to create object store client")?;

    let pool = connect(&config).await?;
    if args.migrate {
        run_migrations(&pool).await?;
    }
    let entities = Arc::new(PgEntityStore::new(pool));

    let sweeper = Arc::new(RetentionSweeper::new(
        entities,
        media,
        config.retention().clone(),
    ));

    if args.once {
        let summary = match args.as_of {
            Some(today) => sweeper.sweep_at(today).await?,
            None => sweeper.sweep_now().await?,
        };
        print!("{}", render_summary(&summary, format)?);
        if format == OutputFormat::Json {
            println!();
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let handle = sweeper.start(cancel.clone());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();
    handle.await.context("Retention sweeper task panicked")?;

    Ok(())
}
