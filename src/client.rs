//! gRPC region client
//!
//! `GridConnector` opens a channel to the locator, performs a handshake that
//! registers the session, and hands out proxy region views that forward
//! every call to the server. The optional bearer token rides on every RPC.

use crate::config::LogLevel;
use crate::error::{CloseError, ConnectError, ConnectErrorKind, FetchError, SessionError};
use crate::pb::region_service_client::RegionServiceClient;
use crate::pb::{DisconnectRequest, GetRequest, HandshakeRequest, RegionRequest};
use crate::protocol::{RegionKey, RegionValue, Target};
use crate::transport::{Connector, RegionHandle, RemoteSession};
use std::time::Duration;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

type Client = RegionServiceClient<InterceptedService<Channel, BearerAuth>>;

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Name reported to the server on handshake
    pub client_name: String,
    /// Timeout for establishing the channel and completing the handshake
    pub connect_timeout: Duration,
    /// Timeout applied to every RPC after connecting
    pub request_timeout: Duration,
    pub log_level: LogLevel,
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: concat!("region-probe/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            log_level: LogLevel::Info,
            auth_token: None,
        }
    }
}

/// Attaches `authorization: Bearer <token>` to outgoing requests
#[derive(Clone, Default)]
pub struct BearerAuth {
    header: Option<MetadataValue<Ascii>>,
}

impl BearerAuth {
    pub fn new(token: Option<&str>) -> Result<Self, tonic::metadata::errors::InvalidMetadataValue> {
        let header = token
            .map(|t| format!("Bearer {}", t).parse::<MetadataValue<Ascii>>())
            .transpose()?;
        Ok(Self { header })
    }
}

impl Interceptor for BearerAuth {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(header) = &self.header {
            request.metadata_mut().insert("authorization", header.clone());
        }
        Ok(request)
    }
}

pub struct GridConnector {
    config: ClientConfig,
}

impl GridConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    async fn open_channel(&self, target: &Target) -> Result<Channel, ConnectError> {
        let endpoint = Endpoint::from_shared(target.uri())
            .map_err(|e| ConnectError::new(ConnectErrorKind::Unreachable, target.to_string(), e.to_string()))?
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout);

        endpoint
            .connect()
            .await
            .map_err(|e| ConnectError::new(classify_transport_error(&e), target.to_string(), e.to_string()))
    }

    fn bearer(&self, target: &Target) -> Result<BearerAuth, ConnectError> {
        BearerAuth::new(self.config.auth_token.as_deref()).map_err(|_| {
            ConnectError::new(
                ConnectErrorKind::Authentication,
                target.to_string(),
                "auth token is not a valid header value",
            )
        })
    }

    async fn handshake(&self, target: &Target, client: &mut Client) -> Result<u64, ConnectError> {
        let request = HandshakeRequest {
            client_name: self.config.client_name.clone(),
            log_level: self.config.log_level.to_string(),
        };

        let response = client
            .handshake(request)
            .await
            .map_err(|status| {
                let kind = match status.code() {
                    Code::Unauthenticated | Code::PermissionDenied => ConnectErrorKind::Authentication,
                    Code::DeadlineExceeded => ConnectErrorKind::Timeout,
                    _ => ConnectErrorKind::Unreachable,
                };
                ConnectError::new(kind, target.to_string(), status.message())
            })?
            .into_inner();

        tracing::debug!(
            "Handshake complete: server_id={}, session_id={}, regions={}",
            response.server_id,
            response.session_id,
            response.region_count
        );

        Ok(response.session_id)
    }
}

/// Map a channel error to a connect failure kind by looking for the
/// underlying io error.
fn classify_transport_error(err: &(dyn std::error::Error + 'static)) -> ConnectErrorKind {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return match io.kind() {
                std::io::ErrorKind::ConnectionRefused => ConnectErrorKind::Refused,
                std::io::ErrorKind::TimedOut => ConnectErrorKind::Timeout,
                _ => ConnectErrorKind::Unreachable,
            };
        }
        source = e.source();
    }
    if err.to_string().contains("timed out") {
        ConnectErrorKind::Timeout
    } else {
        ConnectErrorKind::Unreachable
    }
}

#[tonic::async_trait]
impl Connector for GridConnector {
    type Session = GridSession;

    async fn connect(&self, target: &Target) -> Result<GridSession, ConnectError> {
        let attempt = async {
            let auth = self.bearer(target)?;
            let channel = self.open_channel(target).await?;
            let mut client = RegionServiceClient::with_interceptor(channel, auth);
            let session_id = self.handshake(target, &mut client).await?;
            Ok::<_, ConnectError>(GridSession {
                client,
                session_id,
                target: target.clone(),
            })
        };

        tokio::time::timeout(self.config.connect_timeout, attempt)
            .await
            .map_err(|_| {
                ConnectError::new(
                    ConnectErrorKind::Timeout,
                    target.to_string(),
                    format!("no response within {:?}", self.config.connect_timeout),
                )
            })?
    }
}

/// Open session to a region server
pub struct GridSession {
    client: Client,
    session_id: u64,
    target: Target,
}

#[tonic::async_trait]
impl RemoteSession for GridSession {
    type Region = GridRegion;

    async fn open_region(&self, name: &str) -> Result<GridRegion, SessionError> {
        let mut client = self.client.clone();
        let response = client
            .open_region(RegionRequest {
                session_id: self.session_id,
                region: name.to_string(),
            })
            .await
            .map_err(|status| match status.code() {
                Code::NotFound => SessionError::RegionNotFound {
                    region: name.to_string(),
                },
                _ => SessionError::Region {
                    region: name.to_string(),
                    message: status.message().to_string(),
                },
            })?
            .into_inner();

        tracing::debug!("Server opened region {} with {} entries", response.region, response.size);

        Ok(GridRegion {
            client: self.client.clone(),
            session_id: self.session_id,
            name: name.to_string(),
        })
    }

    async fn close(self) -> Result<(), CloseError> {
        let mut client = self.client;
        let response = client
            .disconnect(DisconnectRequest {
                session_id: self.session_id,
            })
            .await
            .map_err(|status| CloseError(status.message().to_string()))?
            .into_inner();

        if !response.known {
            tracing::debug!(
                "Server {} had already dropped session {}",
                self.target,
                self.session_id
            );
        }

        // The channel is released when the last client clone drops here.
        Ok(())
    }
}

/// Proxy view of a remote region
#[derive(Clone)]
pub struct GridRegion {
    client: Client,
    session_id: u64,
    name: String,
}

impl GridRegion {
    fn region_request(&self) -> RegionRequest {
        RegionRequest {
            session_id: self.session_id,
            region: self.name.clone(),
        }
    }

    fn enumerate_error(&self, status: Status) -> SessionError {
        SessionError::Enumerate {
            region: self.name.clone(),
            message: status.message().to_string(),
        }
    }
}

#[tonic::async_trait]
impl RegionHandle for GridRegion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn size_on_server(&self) -> Result<u64, SessionError> {
        let mut client = self.client.clone();
        let response = client
            .size_on_server(self.region_request())
            .await
            .map_err(|s| self.enumerate_error(s))?;
        Ok(response.into_inner().size)
    }

    async fn keys_on_server(&self) -> Result<Vec<RegionKey>, SessionError> {
        let mut client = self.client.clone();
        let response = client
            .keys_on_server(self.region_request())
            .await
            .map_err(|s| self.enumerate_error(s))?;
        Ok(response
            .into_inner()
            .keys
            .into_iter()
            .map(RegionKey::from)
            .collect())
    }

    async fn get(&self, key: &RegionKey) -> Result<RegionValue, FetchError> {
        let mut client = self.client.clone();
        let response = client
            .get(GetRequest {
                session_id: self.session_id,
                region: self.name.clone(),
                key: key.as_bytes().to_vec(),
            })
            .await
            .map_err(|status| FetchError::Remote(format!("{:?}: {}", status.code(), status.message())))?
            .into_inner();

        if !response.found {
            return Err(FetchError::Missing);
        }

        Ok(RegionValue::from(response.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_refused() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(classify_transport_error(&err), ConnectErrorKind::Refused);
    }

    #[test]
    fn test_classify_timeout() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(classify_transport_error(&err), ConnectErrorKind::Timeout);
    }

    #[test]
    fn test_bearer_header() {
        let mut auth = BearerAuth::new(Some("s3cret")).unwrap();
        let request = auth.call(Request::new(())).unwrap();
        assert_eq!(
            request.metadata().get("authorization").unwrap().to_str().unwrap(),
            "Bearer s3cret"
        );

        let mut anonymous = BearerAuth::default();
        let request = anonymous.call(Request::new(())).unwrap();
        assert!(request.metadata().get("authorization").is_none());

        assert!(BearerAuth::new(Some("bad\ntoken")).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.client_name.starts_with("region-probe/"));
        assert!(config.auth_token.is_none());
    }
}
