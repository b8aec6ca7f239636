//! Inspection session
//!
//! Runs connect → open region → enumerate → report → close against any
//! [`Connector`]. Once a connection is open it is closed exactly once, on
//! every path. Per-key fetch failures are recorded in the [`Summary`] and
//! never abort the report.

use crate::config::Config;
use crate::error::{FetchError, KeyFetchError, SessionError};
use crate::host::HostInfo;
use crate::protocol::{RegionKey, Target};
use crate::transport::{Connector, RegionHandle, RemoteSession};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    RegionOpening,
    Enumerating,
    Reporting,
    Closing,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Connected)
                | (Connected, RegionOpening)
                | (RegionOpening, Enumerating)
                | (Enumerating, Reporting)
                | (Connecting | Connected | RegionOpening | Enumerating | Reporting, Closing)
                | (Closing, Closed)
        )
    }
}

/// Outcome of a completed session
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub region: String,
    /// Entry count the server reported, if it answered
    pub size_on_server: Option<u64>,
    /// Keys in the enumeration snapshot
    pub keys_found: usize,
    /// Entries fetched and logged
    pub reported: usize,
    pub errors: Vec<KeyFetchError>,
}

impl Summary {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Exit code for a session that ran to completion
    pub fn exit_code(&self) -> u8 {
        if self.is_clean() {
            0
        } else {
            5
        }
    }

    fn record(&mut self, key: &RegionKey, result: Result<(), FetchError>) {
        match result {
            Ok(()) => self.reported += 1,
            Err(e) => self.errors.push(KeyFetchError {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

pub struct InspectionSession<C> {
    connector: C,
    config: Config,
    state: SessionState,
}

impl<C: Connector> InspectionSession<C> {
    pub fn new(connector: C, config: Config) -> Self {
        Self {
            connector,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the session to completion
    pub async fn run(mut self) -> Result<Summary, SessionError> {
        if self.config.dump_host {
            dump_host();
        }

        let target: Target = self.config.target();

        self.transition(SessionState::Connecting);
        tracing::info!("Connecting to {}", target);

        let session = match self.connector.connect(&target).await {
            Ok(session) => session,
            Err(e) => {
                // Nothing was opened, so there is nothing to close.
                self.transition(SessionState::Closing);
                self.transition(SessionState::Closed);
                return Err(e.into());
            }
        };
        self.transition(SessionState::Connected);

        let outcome = self.inspect(&session).await;

        self.transition(SessionState::Closing);
        tracing::info!("Closing connection to {}", target);
        if let Err(e) = session.close().await {
            tracing::warn!("Error while closing connection to {}: {}", target, e);
        }
        self.transition(SessionState::Closed);
        tracing::info!("Connection to {} closed", target);

        outcome
    }

    async fn inspect(&mut self, session: &C::Session) -> Result<Summary, SessionError> {
        let name = self.config.region.clone();

        self.transition(SessionState::RegionOpening);
        tracing::info!("Creating client proxy region {}", name);
        let region = session.open_region(&name).await?;

        self.transition(SessionState::Enumerating);
        let size_on_server = match region.size_on_server().await {
            Ok(size) => {
                tracing::info!("Region {} reports {} entries on server", name, size);
                Some(size)
            }
            Err(e) => {
                tracing::warn!("Could not read size of region {}: {}", name, e);
                None
            }
        };

        let keys = region.keys_on_server().await?;
        tracing::info!("Found {} keys in region {}", keys.len(), name);

        let summary = Summary {
            region: name,
            size_on_server,
            keys_found: keys.len(),
            ..Summary::default()
        };

        self.transition(SessionState::Reporting);
        let summary = if self.config.fetch_workers > 1 {
            report_pipelined(region, keys, self.config.fetch_workers, summary).await
        } else {
            report_sequential(&region, &keys, summary).await
        };

        if summary.is_clean() {
            tracing::info!("Reported {} of {} keys", summary.reported, summary.keys_found);
        } else {
            tracing::warn!(
                "Reported {} of {} keys, {} could not be fetched",
                summary.reported,
                summary.keys_found,
                summary.errors.len()
            );
        }

        Ok(summary)
    }
}

fn dump_host() {
    match HostInfo::collect() {
        Ok(info) => info.log(),
        Err(e) => tracing::warn!("Could not collect host information: {}", e),
    }
}

async fn fetch_and_log<R: RegionHandle>(region: &R, key: &RegionKey) -> Result<(), FetchError> {
    match region.get(key).await {
        Ok(value) => {
            tracing::info!("\t{} = {}", key, value);
            Ok(())
        }
        Err(e) => {
            tracing::warn!("\t{} could not be fetched: {}", key, e);
            Err(e)
        }
    }
}

async fn report_sequential<R: RegionHandle>(
    region: &R,
    keys: &[RegionKey],
    mut summary: Summary,
) -> Summary {
    tracing::info!("Region {} contains the following keys:", region.name());
    for key in keys {
        let result = fetch_and_log(region, key).await;
        summary.record(key, result);
    }
    summary
}

/// Fetch with at most `workers` requests in flight. Report order follows
/// completion, not enumeration.
async fn report_pipelined<R: RegionHandle>(
    region: R,
    keys: Vec<RegionKey>,
    workers: usize,
    summary: Summary,
) -> Summary {
    tracing::info!(
        "Region {} contains the following keys ({} concurrent fetches):",
        region.name(),
        workers
    );

    let summary = Arc::new(Mutex::new(summary));
    let permits = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for key in keys {
        let region = region.clone();
        let summary = Arc::clone(&summary);
        let permits = Arc::clone(&permits);

        tasks.spawn(async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            let result = fetch_and_log(&region, &key).await;
            summary.lock().record(&key, result);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Fetch task failed: {}", e);
        }
    }

    let summary = summary.lock().clone();
    summary
}
