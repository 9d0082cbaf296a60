//! Omnik Service - inverter collector and query CLI.
//!
//! Run with: `cargo run -p omnik-service`

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use time::{Date, Month, OffsetDateTime, UtcOffset};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use omnik_core::{AuthCommand, InverterSession};
use omnik_service::query::{parse_date, parse_month};
use omnik_service::{Collector, Config, Query};
use omnik_store::{KeepAlive, Store};

/// Local UTC offset, captured while the process is still single-threaded.
static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

fn local_clock() -> OffsetDateTime {
    let offset = LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC);
    OffsetDateTime::now_utc().to_offset(offset)
}

/// Omnik Service - inverter collector and query CLI.
#[derive(Parser, Debug)]
#[command(name = "omnik-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the inverter and store samples until interrupted (default).
    Run,

    /// Read one sample and print it.
    Read,

    /// Print the auth command for a serial number.
    Auth {
        /// Serial number (defaults to the configured one).
        serial: Option<u64>,
    },

    /// Print the most recent stored sample.
    Latest,

    /// Print one day's samples, dark hours trimmed.
    Day {
        #[arg(value_parser = parse_date)]
        date: Date,
    },

    /// Print daily energy totals for an inclusive date range.
    Daily {
        #[arg(value_parser = parse_date)]
        start: Date,
        #[arg(value_parser = parse_date)]
        end: Date,
    },

    /// Print the nearest stored date before or after a date.
    Adjacent {
        #[arg(value_parser = parse_date)]
        date: Date,
        /// `before` or `after`.
        direction: String,
    },

    /// Check whether any sample was stored in a month (YYYY-MM).
    HasMonth {
        #[arg(value_parser = parse_month)]
        month: (i32, Month),
    },
}

fn main() -> anyhow::Result<()> {
    // Must run before the runtime starts any threads.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let _ = LOCAL_OFFSET.set(offset);

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("omnik_service=info".parse()?),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(dispatch(args))
}

async fn dispatch(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }

    let query = match args.command {
        Some(Command::Run) | None => return run_collector(config).await,
        Some(Command::Read) => return read_once(config).await,
        Some(Command::Auth { serial }) => {
            let serial = serial.unwrap_or(config.inverter.serial);
            println!("{}", AuthCommand::for_serial(serial));
            return Ok(());
        }
        Some(Command::Latest) => Query::Latest,
        Some(Command::Day { date }) => Query::Day(date),
        Some(Command::Daily { start, end }) => Query::Daily { start, end },
        Some(Command::Adjacent { date, direction }) => Query::Adjacent { date, direction },
        Some(Command::HasMonth {
            month: (year, month),
        }) => Query::HasMonth { year, month },
    };

    let store = Store::open(&config.storage.path)?;
    let value = query.execute(&store)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn read_once(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let session =
        InverterSession::with_options(config.inverter.info(), config.inverter.session_options())?
            .clock(local_clock);
    let sample = session.read().await?;
    println!("{}", serde_json::to_string_pretty(&sample)?);
    Ok(())
}

async fn run_collector(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    // A store that cannot be opened or bootstrapped is fatal.
    let store = Arc::new(Store::open(&config.storage.path)?);
    let keepalive = KeepAlive::spawn(
        Arc::clone(&store),
        Duration::from_secs(config.storage.keepalive_interval),
    );

    let session =
        InverterSession::with_options(config.inverter.info(), config.inverter.session_options())?
            .clock(local_clock);
    info!("Collecting from {}", config.inverter.info());
    let collector = Collector::new(
        Arc::new(session),
        Arc::clone(&store),
        config.polling.poller_options(),
    )?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                signal_cancel.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let stats = collector.run(cancel).await;
    keepalive.stop().await;
    info!(
        "Total samples in store: {}",
        store.count_samples().unwrap_or_default()
    );
    info!("{}", serde_json::to_string(&stats)?);
    Ok(())
}
