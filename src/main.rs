//! Binary entrypoint for the meshrelay CLI.
//!
//! Commands:
//! - `start [--port <path>] [--stdin]` - ingest frames from the node and relay them
//! - `init [--force]` - write a starter `config.toml`
//! - `parse <LINE>` - parse a single frame and print it as the dashboard sees it
//!
//! See the library crate docs for module-level details: `meshrelay::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::Path;
use tokio::io::BufReader;

use meshrelay::api::{self, ApiState};
use meshrelay::config::Config;
use meshrelay::frame::FrameParser;
use meshrelay::meshtastic::{AsyncLineSource, SerialLineSource};
use meshrelay::pipeline::IngestionPipeline;
use meshrelay::store;

#[derive(Parser)]
#[command(name = "meshrelay")]
#[command(about = "Relay disaster-relief messages from a Meshtastic field node")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start ingesting and relaying messages
    Start {
        /// Serial port of the field node (e.g., /dev/ttyUSB0); overrides the config
        #[arg(short, long, conflicts_with = "stdin")]
        port: Option<String>,

        /// Read frames from standard input instead of a serial port
        #[arg(long)]
        stdin: bool,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Parse one frame and print the result
    Parse {
        /// Raw frame, e.g. "SRC=5,CUR=5,ID=0042:Alice-Need water"
        line: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { port, stdin } => {
            let config = Config::load(&cli.config).await.map_err(|e| {
                anyhow!("{} (run `meshrelay init` to create a default config)", e)
            })?;
            init_logging(Some(&config), cli.verbose);
            info!("Starting meshrelay v{}", env!("CARGO_PKG_VERSION"));
            run(config, port, stdin).await?;
        }
        Commands::Init { force } => {
            init_logging(None, cli.verbose);
            if Path::new(&cli.config).exists() && !force {
                warn!(
                    "{} already exists; use --force to overwrite",
                    cli.config
                );
                std::process::exit(1);
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Parse { line } => {
            let config = Config::load(&cli.config).await.ok();
            init_logging(config.as_ref(), cli.verbose);
            let parser = match &config {
                Some(cfg) => FrameParser::with_default_node(cfg.frame.default_node.clone()),
                None => FrameParser::new(),
            };
            match parser.parse(&line) {
                Ok(msg) => {
                    let mut view = serde_json::to_value(msg.view())?;
                    view["embedded_urgency"] = serde_json::to_value(msg.embedded_urgency())?;
                    println!("{}", serde_json::to_string_pretty(&view)?);
                }
                Err(e) => {
                    eprintln!("Parse error: {}", e);
                    std::process::exit(2);
                }
            }
        }
    }

    Ok(())
}

async fn run(config: Config, port: Option<String>, stdin: bool) -> Result<()> {
    let (writer, reader) = store::shared(config.store.capacity);
    let pipeline = IngestionPipeline::from_config(&config, writer)?;
    let metrics = pipeline.metrics();

    let (transport, ingest) = if stdin {
        info!("Reading frames from stdin");
        let source = AsyncLineSource::new(BufReader::new(tokio::io::stdin()));
        ("stdin".to_string(), tokio::spawn(pipeline.run(source)))
    } else {
        let port_path = port.unwrap_or_else(|| config.meshtastic.port.clone());
        // No ingestion without a source: failing to open the port is fatal
        let source = SerialLineSource::open(&port_path, config.meshtastic.baud_rate)
            .await
            .map_err(|e| {
                error!("{}", e);
                e
            })?;
        info!("Connected to field node on {}", port_path);
        (port_path, tokio::spawn(pipeline.run(source)))
    };

    if config.api.enabled {
        let state = ApiState {
            store: reader,
            metrics,
            transport,
        };
        let bind = config.api.bind.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(&bind, state).await {
                error!("API server stopped: {}", e);
            }
        });
    }

    tokio::select! {
        res = ingest => {
            res.map_err(|e| anyhow!("Ingestion task failed: {}", e))??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }
    Ok(())
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
    if let Some(f) = log_file {
        let file = std::sync::Mutex::new(f);
        // Echo to the console only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
