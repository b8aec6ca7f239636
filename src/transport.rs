//! Region transport abstraction
//!
//! The probe only depends on the connect / open-region / list / get / close
//! contract below. `GridConnector` in `client` implements it over gRPC;
//! `MemoryConnector` implements it in-process for testing without a server.

use crate::error::{CloseError, ConnectError, ConnectErrorKind, FetchError, SessionError};
use crate::protocol::{RegionKey, RegionValue, Target};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Opens sessions against a locator
#[tonic::async_trait]
pub trait Connector: Send + Sync {
    type Session: RemoteSession;

    async fn connect(&self, target: &Target) -> Result<Self::Session, ConnectError>;
}

/// An open logical connection. `close` consumes the session, so it runs at
/// most once.
#[tonic::async_trait]
pub trait RemoteSession: Send + Sync + Sized {
    type Region: RegionHandle;

    /// Open a proxy view of `name`. Nothing is cached client-side.
    async fn open_region(&self, name: &str) -> Result<Self::Region, SessionError>;

    async fn close(self) -> Result<(), CloseError>;
}

/// Proxy view of a region; every call goes to the server
#[tonic::async_trait]
pub trait RegionHandle: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Entry count as reported by the server
    async fn size_on_server(&self) -> Result<u64, SessionError>;

    /// Snapshot of the keys currently resident on the server
    async fn keys_on_server(&self) -> Result<Vec<RegionKey>, SessionError>;

    async fn get(&self, key: &RegionKey) -> Result<RegionValue, FetchError>;
}

type Store = Arc<RwLock<BTreeMap<Bytes, Bytes>>>;

#[derive(Default)]
struct MemoryState {
    regions: DashMap<String, Store>,
    connect_failure: Mutex<Option<ConnectErrorKind>>,
    failing_keys: Mutex<HashSet<Bytes>>,
    enumerate_fails: AtomicBool,
    close_fails: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    fetches: AtomicUsize,
}

/// In-process connector for tests
///
/// Clones share state, so a test can keep one handle to inject failures and
/// read call counters while the session owns another.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<MemoryState>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a region with the given entries
    pub fn with_region<K, V, I>(self, name: &str, entries: I) -> Self
    where
        K: Into<Bytes>,
        V: Into<Bytes>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.state
            .regions
            .insert(name.to_string(), Arc::new(RwLock::new(map)));
        self
    }

    /// Make every subsequent connect fail with `kind`
    pub fn fail_connect(&self, kind: ConnectErrorKind) {
        *self.state.connect_failure.lock() = Some(kind);
    }

    /// Make fetches of `key` fail with a remote error
    pub fn fail_fetch(&self, key: impl Into<Bytes>) {
        self.state.failing_keys.lock().insert(key.into());
    }

    /// Make key enumeration fail for every region
    pub fn fail_enumerate(&self) {
        self.state.enumerate_fails.store(true, Ordering::SeqCst);
    }

    /// Make closing a session report an error. The close is still counted.
    pub fn fail_close(&self) {
        self.state.close_fails.store(true, Ordering::SeqCst);
    }

    /// Remove an entry, as a concurrent external client would
    pub fn remove(&self, region: &str, key: &[u8]) -> bool {
        self.state
            .regions
            .get(region)
            .map(|store| store.write().remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }
}

#[tonic::async_trait]
impl Connector for MemoryConnector {
    type Session = MemorySession;

    async fn connect(&self, target: &Target) -> Result<MemorySession, ConnectError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        if let Some(kind) = *self.state.connect_failure.lock() {
            return Err(ConnectError::new(kind, target.to_string(), "injected failure"));
        }

        tracing::debug!("Memory transport connected to {}", target);
        Ok(MemorySession {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MemorySession {
    state: Arc<MemoryState>,
}

#[tonic::async_trait]
impl RemoteSession for MemorySession {
    type Region = MemoryRegion;

    async fn open_region(&self, name: &str) -> Result<MemoryRegion, SessionError> {
        let store = self
            .state
            .regions
            .get(name)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| SessionError::RegionNotFound {
                region: name.to_string(),
            })?;

        Ok(MemoryRegion {
            name: name.to_string(),
            store,
            state: Arc::clone(&self.state),
        })
    }

    async fn close(self) -> Result<(), CloseError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.close_fails.load(Ordering::SeqCst) {
            return Err(CloseError("injected failure".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MemoryRegion {
    name: String,
    store: Store,
    state: Arc<MemoryState>,
}

#[tonic::async_trait]
impl RegionHandle for MemoryRegion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn size_on_server(&self) -> Result<u64, SessionError> {
        Ok(self.store.read().len() as u64)
    }

    async fn keys_on_server(&self) -> Result<Vec<RegionKey>, SessionError> {
        if self.state.enumerate_fails.load(Ordering::SeqCst) {
            return Err(SessionError::Enumerate {
                region: self.name.clone(),
                message: "injected failure".to_string(),
            });
        }
        Ok(self
            .store
            .read()
            .keys()
            .map(|k| RegionKey(k.clone()))
            .collect())
    }

    async fn get(&self, key: &RegionKey) -> Result<RegionValue, FetchError> {
        self.state.fetches.fetch_add(1, Ordering::SeqCst);

        if self.state.failing_keys.lock().contains(&key.0) {
            return Err(FetchError::Remote(format!("injected failure for {}", key)));
        }

        self.store
            .read()
            .get(&key.0)
            .map(|v| RegionValue(v.clone()))
            .ok_or(FetchError::Missing)
    }
}
