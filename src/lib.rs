pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod pb;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use client::{ClientConfig, GridConnector};
pub use config::{resolve, Config, LogLevel, Resolution};
pub use error::{ConnectError, ConnectErrorKind, SessionError, ValidationError};
pub use protocol::{RegionKey, RegionValue, Target};
pub use server::RegionServer;
pub use session::{InspectionSession, SessionState, Summary};
pub use transport::{Connector, MemoryConnector, RegionHandle, RemoteSession};

/// Run a probe session against the gRPC region service described by `config`
pub async fn probe(config: Config) -> Result<Summary, SessionError> {
    let connector = GridConnector::new(config.client_config());
    InspectionSession::new(connector, config).run().await
}
