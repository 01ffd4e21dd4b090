//! CLI entry point for the charge scheduler.
//!
//! Provides subcommands for running the decision cycle once or on an
//! interval, showing vehicle status and the grid forecast, and uploading the
//! decision log to S3.

use anyhow::Result;
use charge_scheduler::{
    cache::CachedForecast,
    config::Config,
    cycle::{Providers, run_cycle},
    infra::google::{GoogleCalendarClient, GoogleMapsClient},
    infra::gridstatus::GridStatusClient,
    infra::tesla::TeslaClient,
    output::{DecisionRecord, append_record, forecast_summary, print_pretty},
    scheduler::ChargeDecisionEngine,
    services::forecast_api::ForecastApi,
    services::vehicle_api::VehicleApi,
    sync::upload_artifacts,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "charge_scheduler")]
#[command(about = "Schedules EV charging around grid load and upcoming travel", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the decision cycle once, or repeatedly with --interval
    Run {
        /// Minutes between cycles (omit to run once)
        #[arg(short, long, value_name = "MINUTES")]
        interval: Option<u64>,
    },
    /// Show the vehicle's current status
    Status,
    /// Summarize the grid load forecast
    Forecast,
    /// Upload the decision log and forecast cache to S3
    Sync {
        /// S3 bucket name to upload to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: String,

        /// Gzip compress files before uploading
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/charge_scheduler.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("charge_scheduler.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_level = if cli.verbose { "debug" } else { "info" };
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(stderr_level.parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let config = Config::from_env()?;

    match cli.command {
        Commands::Run { interval } => run(&config, interval).await?,
        Commands::Status => {
            let vehicle = vehicle_client(&config)?;
            let snapshot = vehicle.snapshot().await?;
            info!("{}", snapshot.summary(Utc::now()));
        }
        Commands::Forecast => {
            let forecast = forecast_provider(&config)?;
            let now = Utc::now();
            let series = forecast
                .load_forecast(now - config.forecast_lag, now + config.forecast_lead)
                .await?;
            info!("{}", forecast_summary(&series, now, config.timezone));
        }
        Commands::Sync { s3_bucket, gzip } => {
            let aws = aws_config::load_from_env().await;
            let s3 = aws_sdk_s3::Client::new(&aws);
            let paths = [
                config.decision_log_path.as_path(),
                config.forecast_cache_path.as_path(),
            ];
            upload_artifacts(&s3, &s3_bucket, &paths, Utc::now().date_naive(), gzip).await?;
        }
    }

    Ok(())
}

fn forecast_provider(config: &Config) -> Result<CachedForecast<GridStatusClient>> {
    let grid = GridStatusClient::new(
        &config.grid_status_base_url,
        config.grid_status_api_key()?,
        &config.grid_iso,
    )?;
    Ok(CachedForecast::new(
        grid,
        &config.forecast_cache_path,
        config.forecast_cache_max_age,
    ))
}

fn vehicle_client(config: &Config) -> Result<TeslaClient> {
    Ok(TeslaClient::new(
        config.tesla_refresh_token()?,
        &config.tesla_auth_url,
        &config.tesla_base_url,
    ))
}

/// Builds every provider once, then runs cycles until the process is stopped
/// (or once, without an interval).
///
/// Providers authenticate on first use and re-authenticate when their tokens
/// expire, so only missing settings stop the loop from starting.
#[tracing::instrument(skip(config))]
async fn run(config: &Config, interval: Option<u64>) -> Result<()> {
    // Check every setting the optimize branch needs before the first cycle
    config.home_address()?;

    let forecast = forecast_provider(config)?;
    let calendar = GoogleCalendarClient::new(
        &config.google_credentials()?,
        &config.google_calendar_base_url,
        config.timezone,
    );
    let directions =
        GoogleMapsClient::new(&config.google_maps_base_url, config.google_maps_api_key()?);
    let vehicle = vehicle_client(config)?;

    let providers = Providers {
        forecast: &forecast,
        calendar: &calendar,
        directions: &directions,
        vehicle: &vehicle,
    };
    let engine = ChargeDecisionEngine::new(config.timezone);

    if let Some(minutes) = interval {
        info!(minutes, "Running every interval. Press Ctrl+C to stop.");
    }

    loop {
        let now = Utc::now();
        let record = match run_cycle(&providers, config, &engine, now).await {
            Ok(outcome) => {
                if outcome.command_failures > 0 {
                    warn!(failures = outcome.command_failures, "Some vehicle commands failed");
                }
                DecisionRecord::from(&outcome)
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "Cycle failed");
                DecisionRecord::from_error(now, &e)
            }
        };

        print_pretty(&record);
        if let Err(e) = append_record(&config.decision_log_path, &record) {
            error!(error = %e, "Failed to write decision log");
        }

        let Some(minutes) = interval else {
            break;
        };
        info!(minutes, "Waiting before next cycle");
        tokio::time::sleep(tokio::time::Duration::from_secs(minutes * 60)).await;
    }

    Ok(())
}
