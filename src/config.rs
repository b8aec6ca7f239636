//! Command-line resolution
//!
//! `resolve` turns argv into either a runnable [`Config`] or a request for
//! help. Required options are checked here rather than by clap so that every
//! missing option is reported at once and `--help` always wins.

use crate::client::ClientConfig;
use crate::error::ValidationError;
use crate::protocol::Target;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on concurrent value fetches
pub const MAX_FETCH_WORKERS: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "region-probe", version)]
#[command(about = "Connect to a region server, list the keys of a region and log every entry")]
struct Args {
    /// Locator hostname or IP address (required)
    #[arg(short = 'l', long, value_name = "HOST")]
    locator: Option<String>,

    /// Locator port (required)
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<String>,

    /// Region name (required)
    #[arg(short = 'r', long, value_name = "NAME")]
    region: Option<String>,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dump local host information before connecting
    #[arg(long, default_value_t = false)]
    dump_host: bool,

    /// Seconds to wait for the connection and handshake
    #[arg(long, default_value = "10", value_name = "SECS")]
    connect_timeout: u64,

    /// Seconds to wait for each request
    #[arg(long, default_value = "30", value_name = "SECS")]
    request_timeout: u64,

    /// Number of concurrent value fetches (1 to 64)
    #[arg(long, default_value = "1", value_name = "N")]
    fetch_workers: String,

    /// Bearer token presented on handshake
    #[arg(long, value_name = "TOKEN")]
    auth_token: Option<String>,

    /// Print the session summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

/// Log verbosity for the probe and its client stack
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

impl FromStr for LogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ValidationError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// Validated probe configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub region: String,
    pub log_level: LogLevel,
    pub dump_host: bool,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub fetch_workers: usize,
    pub auth_token: Option<String>,
    pub json_summary: bool,
}

impl Config {
    pub fn target(&self) -> Target {
        Target::new(self.host.clone(), self.port)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            log_level: self.log_level,
            auth_token: self.auth_token.clone(),
            ..ClientConfig::default()
        }
    }
}

/// Outcome of argument resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Run(Config),
    /// Help or version text to print before exiting successfully
    Help(String),
}

/// Usage line for error output
pub fn usage() -> String {
    Args::command().render_usage().to_string()
}

fn help_text() -> String {
    Args::command().render_help().to_string()
}

fn help_requested(argv: &[OsString]) -> bool {
    argv.iter()
        .skip(1)
        .take_while(|a| a.as_os_str() != "--")
        .any(|a| a.as_os_str() == "--help" || a.as_os_str() == "-h")
}

/// Resolve a full argv (program name first) into a [`Resolution`]
pub fn resolve<I, T>(argv: I) -> Result<Resolution, ValidationError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();

    if help_requested(&argv) {
        return Ok(Resolution::Help(help_text()));
    }

    let args = match Args::try_parse_from(&argv) {
        Ok(args) => args,
        Err(e) => {
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    Ok(Resolution::Help(e.render().to_string()))
                }
                _ => {
                    let rendered = e.render().to_string();
                    let first = rendered.lines().next().unwrap_or_default();
                    Err(ValidationError::Usage(
                        first.trim_start_matches("error: ").to_string(),
                    ))
                }
            };
        }
    };

    args.validate().map(Resolution::Run)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Args {
    fn validate(self) -> Result<Config, ValidationError> {
        let locator = non_empty(self.locator);
        let port = non_empty(self.port);
        let region = non_empty(self.region);

        let missing: Vec<&'static str> = [
            ("--locator", locator.is_none()),
            ("--port", port.is_none()),
            ("--region", region.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(host), Some(port), Some(region)) = (locator, port, region) else {
            return Err(ValidationError::Missing(missing));
        };

        let port = match port.trim().parse::<u16>() {
            Ok(p) if p != 0 => p,
            _ => return Err(ValidationError::InvalidPort(port)),
        };

        let log_level = self.log_level.parse::<LogLevel>()?;

        let fetch_workers = match self.fetch_workers.trim().parse::<usize>() {
            Ok(n) if (1..=MAX_FETCH_WORKERS).contains(&n) => n,
            _ => return Err(ValidationError::InvalidWorkers(self.fetch_workers)),
        };

        Ok(Config {
            host,
            port,
            region,
            log_level,
            dump_host: self.dump_host,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
            fetch_workers,
            auth_token: self.auth_token,
            json_summary: self.json,
        })
    }
}
