//! Error taxonomy for the probe
//!
//! Local errors (`ValidationError`, `HostInfoError`) are handled where they
//! occur. `ConnectError` and the fatal `SessionError` variants abort the
//! session; `FetchError` is recorded per key and never aborts.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Bad or missing command-line input. No network activity has happened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required option(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid port '{0}': expected an integer between 1 and 65535")]
    InvalidPort(String),

    #[error("invalid log level '{0}': expected one of debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid fetch worker count '{0}': expected an integer between 1 and 64")]
    InvalidWorkers(String),

    #[error("{0}")]
    Usage(String),
}

impl ValidationError {
    pub const fn exit_code(&self) -> u8 {
        1
    }
}

/// Why a connection to the locator could not be established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    Unreachable,
    Refused,
    Timeout,
    Authentication,
}

impl fmt::Display for ConnectErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unreachable => "unreachable",
            Self::Refused => "connection refused",
            Self::Timeout => "timed out",
            Self::Authentication => "authentication failed",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot connect to {target} ({kind}): {message}")]
pub struct ConnectError {
    pub kind: ConnectErrorKind,
    pub target: String,
    pub message: String,
}

impl ConnectError {
    pub fn new(kind: ConnectErrorKind, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Fatal session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("region '{region}' not found on server")]
    RegionNotFound { region: String },

    #[error("failed to open region '{region}': {message}")]
    Region { region: String, message: String },

    #[error("failed to enumerate keys of region '{region}': {message}")]
    Enumerate { region: String, message: String },
}

impl SessionError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Connect(_) => 2,
            Self::RegionNotFound { .. } | Self::Region { .. } => 3,
            Self::Enumerate { .. } => 4,
        }
    }
}

/// Failure to fetch a single key's value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("key is no longer present on the server")]
    Missing,

    #[error("{0}")]
    Remote(String),
}

/// A per-key failure recorded in the session summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFetchError {
    pub key: String,
    pub message: String,
}

impl fmt::Display for KeyFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Local host information could not be gathered
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{context}: {message}")]
pub struct HostInfoError {
    pub context: String,
    pub message: String,
}

impl HostInfoError {
    pub fn new(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// Releasing a session failed. Only ever logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("close failed: {0}")]
pub struct CloseError(pub String);
