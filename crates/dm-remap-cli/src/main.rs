//! Device-mapper segment table CLI
//!
//! Builds a segment table from a YAML description of devices and table
//! lines, then lists it or routes sectors through it.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dm_remap_core::config::LoggingConfig;
use dm_remap_core::metrics::TargetMetrics;
use dm_remap_core::{DeviceId, MapResult, RemapConfig, Table, TableBuilder, TargetRegistry};

/// Device number requests are addressed to before remapping.
const LOGICAL_DEVICE: DeviceId = DeviceId::new(253, 0);

/// Segment table builder and sector mapper.
#[derive(Parser)]
#[command(name = "dm-remap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "remap.yaml", global = true)]
    config: String,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the registered target types.
    Targets,

    /// Build the configured table, print its segments and tear it down.
    Check,

    /// Route reads through the configured table.
    Map {
        /// First logical sector to map.
        #[arg(short, long)]
        sector: u64,

        /// Number of consecutive sectors to map.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,

        /// Print collected metrics after mapping.
        #[arg(long)]
        metrics: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Targets => {
            setup_tracing(&verbosity(args.verbose, &LoggingConfig::default()));
            for name in TargetRegistry::global().names() {
                println!("{name}");
            }
        }
        Command::Check => {
            let config = load_config(&args.config, args.verbose)?;
            let table = build_table(&config, None)?;
            print_segments(&table);
            table.teardown();
        }
        Command::Map {
            sector,
            count,
            metrics,
        } => {
            let config = load_config(&args.config, args.verbose)?;
            let metrics =
                (metrics || config.metrics.enabled).then(|| Arc::new(TargetMetrics::new()));
            let table = build_table(&config, metrics.clone())?;
            map_sectors(&table, sector, count);
            table.teardown();

            if let Some(metrics) = metrics {
                print!("{}", metrics.encode()?);
            }
        }
    }

    Ok(())
}

/// Load configuration and install the subscriber it describes.
fn load_config(path: &str, verbose: u8) -> anyhow::Result<RemapConfig> {
    let config = RemapConfig::from_file(path).with_context(|| format!("loading {path}"))?;

    setup_tracing(&verbosity(verbose, &config.logging));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path,
        devices = config.devices.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Override the configured log level from the verbosity flag.
fn verbosity(verbose: u8, logging: &LoggingConfig) -> LoggingConfig {
    match verbose {
        0 => logging.clone(),
        1 => LoggingConfig {
            level: "debug".to_string(),
            ..logging.clone()
        },
        _ => LoggingConfig {
            level: "trace".to_string(),
            ..logging.clone()
        },
    }
}

fn setup_tracing(config: &LoggingConfig) {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so stdout carries only command output.
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn build_table(
    config: &RemapConfig,
    metrics: Option<Arc<TargetMetrics>>,
) -> anyhow::Result<Table> {
    let devices = Arc::new(config.device_table());
    let table =
        TableBuilder::build_from_lines(TargetRegistry::global(), devices, metrics, &config.table)
            .context("building segment table")?;

    info!(
        segments = table.segment_count(),
        sectors = table.len_sectors(),
        "segment table ready"
    );
    Ok(table)
}

fn print_segments(table: &Table) {
    for segment in table.segments() {
        println!("{} {} {}", segment.start, segment.len, segment.target);
    }
}

fn map_sectors(table: &Table, first: u64, count: u64) {
    let dispatcher = table.dispatcher();
    for offset in 0..count {
        let Some(sector) = first.checked_add(offset) else {
            break;
        };
        let (result, request) = dispatcher.map_sector(LOGICAL_DEVICE, sector);
        match result {
            MapResult::Remapped => {
                println!("{sector} -> {}@{}", request.device(), request.sector());
            }
            MapResult::Failed => println!("{sector} -> I/O error"),
        }
    }
}
