mod ansi;
mod config;
mod connection;
mod errors;
mod history;
mod input;
mod session;
mod trackers;
mod ui;

use clap::Parser;

use config::ClientConfig;
use errors::{ClientError, ClientResult};
use session::ClientSession;

/// Terminal MUD client with GMCP support and overlay panels
#[derive(Parser, Debug)]
#[command(name = "wayfarer", version, about)]
struct Args {
    /// MUD host (domain or IP); falls back to the config file
    host: Option<String>,

    /// MUD port; falls back to the config file
    port: Option<u16>,

    /// Path to the configuration file (created with defaults if missing)
    #[arg(long, default_value = "wayfarer.conf")]
    config: String,

    /// Disable ANSI color rendering (strip escape sequences)
    #[arg(long)]
    no_color: bool,

    /// Write a debug log (protocol traffic, GMCP messages) to wayfarer.log
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ClientResult<()> {
    let args = Args::parse();

    // The log file only exists when asked for; without it the log macros
    // are no-ops
    let _logger = if args.debug {
        let handle = flexi_logger::Logger::try_with_str("debug")
            .map_err(|e| ClientError::Configuration(format!("logger: {e}")))?
            .log_to_file(
                flexi_logger::FileSpec::default()
                    .basename("wayfarer")
                    .suppress_timestamp(),
            )
            .start()
            .map_err(|e| ClientError::Configuration(format!("logger: {e}")))?;
        Some(handle)
    } else {
        None
    };

    // Load configuration
    let config = match ClientConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}. Using defaults.", e);
            ClientConfig::default()
        }
    };

    let host = args
        .host
        .or_else(|| config.connection.host.clone())
        .ok_or_else(|| {
            ClientError::Configuration(
                "no host given on the command line or in the config file".to_string(),
            )
        })?;
    let port = args
        .port
        .or(config.connection.port)
        .ok_or_else(|| {
            ClientError::Configuration(
                "no port given on the command line or in the config file".to_string(),
            )
        })?;

    let color = !args.no_color;
    let mut session = ClientSession::new(config, &host, port, color)?;
    match session.run() {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("wayfarer: {}", e);
            Err(e)
        }
    }
}
