//! Region probe
//!
//! Connects to a region server as a thin client, lists the keys of one
//! region, logs every entry and disconnects.
//!
//! ## Usage
//!
//! Start the fixture server:
//! ```bash
//! cargo run --bin region-server -- --listen-addr 127.0.0.1:10334 --seed seed.json
//! ```
//!
//! Probe a region:
//! ```bash
//! cargo run --bin region-probe -- -l localhost -p 10334 -r orders
//! cargo run --bin region-probe -- -l localhost -p 10334 -r orders --dump-host --json
//! ```

use region_probe::config::{self, Config, Resolution};
use std::io::IsTerminal;
use std::process::ExitCode;

/// Exit code when the async runtime cannot be started (EX_SOFTWARE)
const EXIT_RUNTIME: u8 = 70;

fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.as_filter())),
        )
        .with_target(false)
        .with_ansi(std::io::stdout().is_terminal())
        .init();
}

fn main() -> ExitCode {
    let config = match config::resolve(std::env::args_os()) {
        Ok(Resolution::Run(config)) => config,
        Ok(Resolution::Help(text)) => {
            print!("{}", text);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!();
            eprintln!("{}", config::usage());
            eprintln!("For more information, try '--help'.");
            return ExitCode::from(e.exit_code());
        }
    };

    init_logging(&config);

    // Fetch concurrency is bounded by the session, not by runtime threads.
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    let json_summary = config.json_summary;
    match runtime.block_on(region_probe::probe(config)) {
        Ok(summary) => {
            if json_summary {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => tracing::warn!("Failed to serialize summary: {}", e),
                }
            }
            if !summary.is_clean() {
                tracing::error!(
                    "{} of {} keys in region {} could not be fetched",
                    summary.errors.len(),
                    summary.keys_found,
                    summary.region
                );
            }
            ExitCode::from(summary.exit_code())
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
