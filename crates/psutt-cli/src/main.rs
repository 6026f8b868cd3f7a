//! psutt - PSU class timetable CLI.

/// Application configuration (TOML).
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use psutt_api::timetable::{Period, TimetableClient, Week};
use psutt_cache::{SnapshotStore, Timetable, TimetableError};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_config_path, resolve_snapshot_path};

/// Default `User-Agent` sent to the portal.
const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the timetable, refreshing it first if a new week has started.
    Show(ShowArgs),
    /// Print the current week (next week on Sundays).
    Current,
    /// Fetch the timetable from the portal regardless of freshness.
    Refresh,
    /// Delete the persisted timetable.
    Clear,
    /// Print what is cached, without contacting the portal.
    Status,
}

/// Arguments for the `show` subcommand.
#[derive(clap::Args)]
struct ShowArgs {
    /// Only print the week with this portal number.
    #[arg(long)]
    week: Option<u32>,
}

/// Builds the facade from config and the data directory.
///
/// # Errors
///
/// Returns an error if the config is unreadable or the HTTP client cannot be built.
fn open_timetable(dir: Option<&PathBuf>) -> Result<Timetable<TimetableClient>> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    let config = AppConfig::load(&config_path).context("failed to load config")?;
    let source = &config.source;

    let mut builder = TimetableClient::builder().user_agent(
        source
            .user_agent
            .clone()
            .unwrap_or_else(|| String::from(DEFAULT_USER_AGENT)),
    );
    if let Some(url) = source.base_url()? {
        builder = builder.base_url(url);
    }
    if let Some(cookie) = &source.session_cookie {
        builder = builder.session_cookie(cookie.clone());
    }
    if let Some(interval) = source.min_interval() {
        builder = builder.min_interval(interval);
    }
    let client = builder.build().context("failed to build portal client")?;

    let snapshot_path = resolve_snapshot_path(dir).context("failed to resolve data path")?;
    Ok(Timetable::new(client, SnapshotStore::new(snapshot_path))
        .with_concurrency(source.concurrency()))
}

/// Refreshes if stale; on a failed refresh falls back to the held copy.
async fn ensure_fresh_or_cached(timetable: &Timetable<TimetableClient>) -> Result<()> {
    let err = match timetable.ensure_fresh().await {
        Ok(_) => return Ok(()),
        Err(e) => e,
    };
    if matches!(err, TimetableError::Build(_)) && timetable.last_updated_at().await.is_ok() {
        tracing::warn!(error = %err, "Refresh failed, showing the cached timetable");
        return Ok(());
    }
    Err(err).context("failed to load timetable")
}

/// Runs the `show` subcommand.
///
/// # Errors
///
/// Returns an error if no timetable is available or the requested week is absent.
#[instrument(skip_all)]
async fn run_show(args: &ShowArgs, dir: Option<&PathBuf>) -> Result<()> {
    let timetable = open_timetable(dir)?;
    ensure_fresh_or_cached(&timetable).await?;

    let weeks = timetable.all_weeks().await?;
    let current = timetable.current_week_index().await.ok();

    match args.week {
        Some(number) => {
            let week = weeks
                .iter()
                .find(|w| w.number == number)
                .with_context(|| format!("week {number} is not published"))?;
            log_week(week);
        }
        None => {
            for (i, week) in weeks.iter().enumerate() {
                if current == Some(i) {
                    tracing::info!("== current ==");
                }
                log_week(week);
            }
            tracing::info!("Total: {} weeks", weeks.len());
        }
    }
    Ok(())
}

/// Runs the `current` subcommand.
///
/// # Errors
///
/// Returns an error if no timetable is available.
#[instrument(skip_all)]
async fn run_current(dir: Option<&PathBuf>) -> Result<()> {
    let timetable = open_timetable(dir)?;
    ensure_fresh_or_cached(&timetable).await?;
    let week = timetable.current_week().await?;
    log_week(&week);
    Ok(())
}

/// Runs the `refresh` subcommand.
///
/// # Errors
///
/// Returns an error if fetching, parsing, or saving fails.
#[instrument(skip_all)]
async fn run_refresh(dir: Option<&PathBuf>) -> Result<()> {
    let timetable = open_timetable(dir)?;
    let snapshot = timetable
        .force_refresh()
        .await
        .context("failed to refresh timetable")?;
    tracing::info!(
        "Fetched {} weeks at {}",
        snapshot.weeks.len(),
        snapshot.last_updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

/// Runs the `clear` subcommand.
///
/// # Errors
///
/// Returns an error if the persisted file cannot be removed.
#[instrument(skip_all)]
async fn run_clear(dir: Option<&PathBuf>) -> Result<()> {
    let timetable = open_timetable(dir)?;
    timetable.force_clear().await?;
    Ok(())
}

/// Runs the `status` subcommand.
///
/// # Errors
///
/// Returns an error if nothing has been fetched yet.
#[instrument(skip_all)]
async fn run_status(dir: Option<&PathBuf>) -> Result<()> {
    let timetable = open_timetable(dir)?;
    let last_updated_at = timetable.last_updated_at().await?;
    let weeks = timetable.all_weeks().await?;

    tracing::info!("File:\t\t{}", timetable.store().path().display());
    tracing::info!("Updated:\t{}", last_updated_at.format("%Y-%m-%d %H:%M:%S"));
    tracing::info!("Weeks:\t\t{}", weeks.len());
    if let Ok(week) = timetable.current_week().await {
        tracing::info!("Current:\t{}", week_title(&week));
    }
    Ok(())
}

fn week_title(week: &Week) -> String {
    week.label
        .clone()
        .unwrap_or_else(|| format!("Week {}", week.number))
}

fn log_week(week: &Week) {
    tracing::info!("{}", week_title(week));
    for day in &week.days {
        tracing::info!("  {}", day.name);
        if !day.has_periods {
            tracing::info!("    no classes");
            continue;
        }
        for period in &day.periods {
            log_period(period);
        }
    }
}

fn log_period(period: &Period) {
    if !period.exists {
        tracing::info!("    {}\t{}\t-", period.ordinal, period.start_time);
        return;
    }
    tracing::info!(
        "    {}\t{}\t{}\t{}\t{}",
        period.ordinal,
        period.start_time,
        period.title.as_deref().unwrap_or("-"),
        period.teacher.as_deref().unwrap_or("-"),
        period.room.as_deref().unwrap_or("-"),
    );
}

/// Installs the global tracing subscriber.
///
/// With the `otel` feature, spans are also exported over OTLP/HTTP when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn init_tracing() {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let dir = cli.dir.as_ref();
    match cli.command {
        Commands::Show(args) => run_show(&args, dir).await,
        Commands::Current => run_current(dir).await,
        Commands::Refresh => run_refresh(dir).await,
        Commands::Clear => run_clear(dir).await,
        Commands::Status => run_status(dir).await,
    }
}
