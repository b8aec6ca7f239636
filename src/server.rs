//! Fixture region server
//!
//! An in-memory implementation of the RegionService used to exercise the
//! probe end to end. Regions are plain sorted maps; there is no clustering,
//! persistence or eviction.

use crate::pb::region_service_server::{RegionService, RegionServiceServer};
use crate::pb::{
    DisconnectRequest, DisconnectResponse, GetRequest, GetResponse, HandshakeRequest,
    HandshakeResponse, KeysResponse, OpenRegionResponse, RegionRequest, SizeResponse,
};
use anyhow::{Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server node ID
    pub node_id: u32,
    /// gRPC listen address
    pub listen_addr: String,
    /// JSON file with initial region contents
    pub seed: Option<PathBuf>,
    /// Bearer token clients must present on every request
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            listen_addr: "[::1]:10334".to_string(),
            seed: None,
            auth_token: None,
        }
    }
}

type Region = Arc<RwLock<BTreeMap<Bytes, Bytes>>>;

/// Client session registered by a handshake
struct ClientSession {
    client_name: String,
    log_level: String,
}

/// In-memory region server. Clones share state.
#[derive(Clone)]
pub struct RegionServer {
    node_id: u32,
    auth_token: Option<String>,
    regions: Arc<DashMap<String, Region>>,
    sessions: Arc<DashMap<u64, ClientSession>>,
    next_session: Arc<AtomicU64>,
}

impl RegionServer {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            node_id: config.node_id,
            auth_token: config.auth_token.clone(),
            regions: Arc::new(DashMap::new()),
            sessions: Arc::new(DashMap::new()),
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create an empty region if it does not exist yet
    pub fn create_region(&self, name: &str) {
        self.regions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(BTreeMap::new())));
    }

    pub fn put(&self, region: &str, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.create_region(region);
        if let Some(r) = self.regions.get(region) {
            r.write().insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, region: &str, key: &[u8]) -> bool {
        self.regions
            .get(region)
            .map(|r| r.write().remove(key).is_some())
            .unwrap_or(false)
    }

    /// Load every region of a seed document
    pub fn seed(&self, seed: HashMap<String, BTreeMap<String, String>>) {
        for (region, entries) in seed {
            self.create_region(&region);
            for (key, value) in entries {
                self.put(&region, key, value);
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Get the gRPC service for this server
    pub fn service(&self) -> RegionServiceServer<RegionServiceImpl> {
        RegionServiceServer::new(RegionServiceImpl {
            inner: self.clone(),
        })
    }

    fn region(&self, name: &str) -> Result<Region, Status> {
        self.regions
            .get(name)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| Status::not_found(format!("Region {} not found", name)))
    }

    fn check_auth<T>(&self, request: &Request<T>) -> Result<(), Status> {
        let Some(expected) = &self.auth_token else {
            return Ok(());
        };
        let presented = request
            .metadata()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match presented {
            Some(token) if token == expected => Ok(()),
            Some(_) => Err(Status::unauthenticated("Invalid token")),
            None => Err(Status::unauthenticated("Missing bearer token")),
        }
    }

    /// Region calls are only served to sessions opened by a handshake
    fn check_session(&self, session_id: u64) -> Result<(), Status> {
        if self.sessions.contains_key(&session_id) {
            Ok(())
        } else {
            Err(Status::failed_precondition(format!("Unknown session {}", session_id)))
        }
    }

    fn authorize<T>(&self, request: Request<T>) -> Result<T, Status>
    where
        T: SessionScoped,
    {
        self.check_auth(&request)?;
        let req = request.into_inner();
        self.check_session(req.session_id())?;
        Ok(req)
    }
}

/// Requests that act on behalf of a registered session
trait SessionScoped {
    fn session_id(&self) -> u64;
}

impl SessionScoped for RegionRequest {
    fn session_id(&self) -> u64 {
        self.session_id
    }
}

impl SessionScoped for GetRequest {
    fn session_id(&self) -> u64 {
        self.session_id
    }
}

/// Read a seed document: `{ "region": { "key": "value", ... }, ... }`
pub fn load_seed(path: &Path) -> Result<HashMap<String, BTreeMap<String, String>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))
}

/// gRPC service implementation wrapper
pub struct RegionServiceImpl {
    inner: RegionServer,
}

#[tonic::async_trait]
impl RegionService for RegionServiceImpl {
    async fn handshake(
        &self,
        request: Request<HandshakeRequest>,
    ) -> Result<Response<HandshakeResponse>, Status> {
        self.inner.check_auth(&request)?;
        let req = request.into_inner();

        let session_id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "Client session opened: id={}, client={}, log_level={}",
            session_id,
            req.client_name,
            req.log_level
        );
        self.inner.sessions.insert(
            session_id,
            ClientSession {
                client_name: req.client_name,
                log_level: req.log_level,
            },
        );

        Ok(Response::new(HandshakeResponse {
            session_id,
            server_id: self.inner.node_id,
            region_count: self.inner.regions.len() as u32,
        }))
    }

    async fn open_region(
        &self,
        request: Request<RegionRequest>,
    ) -> Result<Response<OpenRegionResponse>, Status> {
        let req = self.inner.authorize(request)?;
        tracing::debug!("OPEN request: session={}, region={}", req.session_id, req.region);

        let size = self.inner.region(&req.region)?.read().len() as u64;
        Ok(Response::new(OpenRegionResponse {
            region: req.region,
            size,
        }))
    }

    async fn size_on_server(
        &self,
        request: Request<RegionRequest>,
    ) -> Result<Response<SizeResponse>, Status> {
        let req = self.inner.authorize(request)?;
        let size = self.inner.region(&req.region)?.read().len() as u64;
        Ok(Response::new(SizeResponse { size }))
    }

    async fn keys_on_server(
        &self,
        request: Request<RegionRequest>,
    ) -> Result<Response<KeysResponse>, Status> {
        let req = self.inner.authorize(request)?;
        tracing::debug!("KEYS request: session={}, region={}", req.session_id, req.region);

        let keys = self
            .inner
            .region(&req.region)?
            .read()
            .keys()
            .map(|k| k.to_vec())
            .collect();
        Ok(Response::new(KeysResponse { keys }))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = self.inner.authorize(request)?;
        tracing::debug!("GET request: region={}, key={:?}", req.region, req.key);

        let value = self
            .inner
            .region(&req.region)?
            .read()
            .get(req.key.as_slice())
            .map(|v| v.to_vec());

        Ok(Response::new(match value {
            Some(value) => GetResponse { found: true, value },
            None => GetResponse {
                found: false,
                value: Vec::new(),
            },
        }))
    }

    async fn disconnect(
        &self,
        request: Request<DisconnectRequest>,
    ) -> Result<Response<DisconnectResponse>, Status> {
        self.inner.check_auth(&request)?;
        let req = request.into_inner();
        let known = match self.inner.sessions.remove(&req.session_id) {
            Some((id, session)) => {
                tracing::info!(
                    "Client session closed: id={}, client={}, log_level={}",
                    id,
                    session.client_name,
                    session.log_level
                );
                true
            }
            None => false,
        };
        Ok(Response::new(DisconnectResponse { known }))
    }
}

/// Run the server
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.listen_addr))?;
    let server = RegionServer::new(&config);

    if let Some(path) = &config.seed {
        server.seed(load_seed(path)?);
    }

    tracing::info!(
        "Starting region server on {} with {} regions",
        addr,
        server.regions.len()
    );

    tonic::transport::Server::builder()
        .add_service(server.service())
        .serve(addr)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_remove() {
        let server = RegionServer::new(&ServerConfig::default());
        server.put("orders", "k1", "v1");

        let region = server.region("orders").unwrap();
        assert_eq!(region.read().get(b"k1".as_slice()), Some(&Bytes::from("v1")));

        assert!(server.remove("orders", b"k1"));
        assert!(!server.remove("orders", b"k1"));
        assert!(server.region("missing").is_err());
    }

    #[test]
    fn test_seed_from_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, r#"{"orders": {"k1": "v1", "k2": "v2"}, "empty": {}}"#).unwrap();

        let server = RegionServer::new(&ServerConfig::default());
        server.seed(load_seed(&path).unwrap());

        assert_eq!(server.region("orders").unwrap().read().len(), 2);
        assert!(server.region("empty").unwrap().read().is_empty());
    }

    #[test]
    fn test_bad_seed_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, "not json").unwrap();

        let err = load_seed(&path).unwrap_err();
        assert!(err.to_string().contains("seed.json"));
    }

    #[test]
    fn test_auth_check() {
        let server = RegionServer::new(&ServerConfig {
            auth_token: Some("s3cret".to_string()),
            ..Default::default()
        });

        let mut ok = Request::new(());
        ok.metadata_mut()
            .insert("authorization", "Bearer s3cret".parse().unwrap());
        assert!(server.check_auth(&ok).is_ok());

        let missing = Request::new(());
        assert_eq!(
            server.check_auth(&missing).unwrap_err().code(),
            tonic::Code::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_region_calls_require_open_session() {
        let server = RegionServer::new(&ServerConfig::default());
        server.put("orders", "k1", "v1");
        let service = RegionServiceImpl {
            inner: server.clone(),
        };

        let stale = RegionRequest {
            session_id: 999,
            region: "orders".to_string(),
        };
        let status = service
            .keys_on_server(Request::new(stale))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let session_id = service
            .handshake(Request::new(HandshakeRequest::default()))
            .await
            .unwrap()
            .into_inner()
            .session_id;
        let keys = service
            .keys_on_server(Request::new(RegionRequest {
                session_id,
                region: "orders".to_string(),
            }))
            .await
            .unwrap()
            .into_inner()
            .keys;
        assert_eq!(keys, vec![b"k1".to_vec()]);

        service
            .disconnect(Request::new(DisconnectRequest { session_id }))
            .await
            .unwrap();
        let status = service
            .get(Request::new(GetRequest {
                session_id,
                region: "orders".to_string(),
                key: b"k1".to_vec(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }
}
