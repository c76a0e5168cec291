//! sim-exporter - Simulated Prometheus Exporter
//!
//! Usage:
//!   sim-exporter serve metrics.yaml --port 9100 --refresh 5s
//!   sim-exporter check metrics.yaml
//!   sim-exporter convert scrape.txt --outfile metrics.yaml --function rand,sin
//!   sim-exporter version

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sim_exporter::ExitStatus;
use sim_exporter_core::config::{parse_functions, parse_interval_range, parse_list};
use sim_exporter_core::duration::parse_duration;
use sim_exporter_core::{
    ConvertConfig, PrometheusRegistry, Scheduler, SchedulerConfig, ServerConfig,
    ValidatorConfig, convert, decode,
};
use tokio::net::TcpListener;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "sim-exporter")]
#[command(about = "Serve simulated prometheus metrics described in a YAML file")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve simulated prometheus metrics defined in <file>
    Serve {
        /// Configuration file (YAML, or JSON with a .json extension)
        file: PathBuf,

        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// TCP port on which the exporter should listen
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// URI (with leading '/') on which the exporter should listen
        #[arg(long, default_value = "/metrics")]
        path: String,

        /// How often the metrics are refreshed (e.g. 15s, 1m)
        #[arg(short, long, default_value = "15s", value_parser = parse_duration)]
        refresh: Duration,
    },

    /// Validate <file> without serving it
    Check {
        file: PathBuf,
    },

    /// Turn a prometheus scrape file into a simulator configuration
    Convert {
        /// Scraped text exposition
        scrape: PathBuf,

        /// Where to write the output (stdout if omitted)
        #[arg(long)]
        outfile: Option<PathBuf>,

        /// How many percent to deviate from the scraped value at most
        #[arg(long, default_value_t = 10)]
        maxdeviation: u32,

        /// Functions to pick from, comma-separated
        #[arg(long, default_value = "rand")]
        function: String,

        /// Range item intervals are drawn from, <duration>-<duration>
        #[arg(long, default_value = "15s-1m")]
        interval: String,

        /// Metric name substrings marking percentages, comma-separated
        #[arg(long, default_value = "percent")]
        honorpct: String,
    },

    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Serve {
            file,
            host,
            port,
            path,
            refresh,
        } => {
            run_serve(
                file,
                ServerConfig { host, port, path },
                SchedulerConfig { refresh },
            )
            .await
        }
        Commands::Check { file } => run_check(file),
        Commands::Convert {
            scrape,
            outfile,
            maxdeviation,
            function,
            interval,
            honorpct,
        } => run_convert(scrape, outfile, maxdeviation, &function, &interval, &honorpct),
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::from(ExitStatus::Success.code()),
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(ExitStatus::of(&err).code())
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_serve(file: PathBuf, server: ServerConfig, scheduler: SchedulerConfig) -> Result<()> {
    server.validate()?;
    scheduler.validate()?;

    let collection = decode::load_and_validate(&file, &ValidatorConfig::default())?;
    let registry = Arc::new(PrometheusRegistry::new()?);
    let scheduler = Scheduler::new(collection, Arc::clone(&registry), scheduler)?;
    let mut refresh = scheduler.spawn();

    let listener = TcpListener::bind(server.bind_addr())
        .await
        .with_context(|| format!("cannot bind {}", server.bind_addr()))?;
    info!(file = %file.display(), path = %server.path, "Serving simulated metrics");

    let app = sim_exporter::router(registry, &server.path);
    tokio::select! {
        served = sim_exporter::serve(listener, app, sim_exporter::ctrl_c()) => {
            refresh.abort();
            served.context("server failed")?;
        }
        stopped = &mut refresh => {
            stopped.context("refresh task panicked")??;
        }
    }
    Ok(())
}

fn run_check(file: PathBuf) -> Result<()> {
    let collection = decode::load_and_validate(&file, &ValidatorConfig::default())?;
    println!(
        "{}: OK ({} metrics, {} items)",
        file.display(),
        collection.metrics.len(),
        collection.item_count()
    );
    Ok(())
}

fn run_convert(
    scrape: PathBuf,
    outfile: Option<PathBuf>,
    max_deviation: u32,
    function: &str,
    interval: &str,
    honorpct: &str,
) -> Result<()> {
    let (interval_min, interval_max) = parse_interval_range(interval)?;
    let config = ConvertConfig {
        max_deviation,
        functions: parse_functions(function)?,
        interval_min,
        interval_max,
        honor_percent: parse_list(honorpct),
    };

    let collection = convert::scrape_file_to_collection(&scrape, &config)
        .with_context(|| format!("cannot convert {}", scrape.display()))?;
    let yaml = serde_yaml::to_string(&collection)?;

    match outfile {
        Some(path) => {
            fs::write(&path, yaml).with_context(|| format!("cannot write {}", path.display()))?;
            info!(file = %path.display(), metrics = collection.metrics.len(), "Configuration written");
        }
        None => print!("{}", yaml),
    }
    Ok(())
}
