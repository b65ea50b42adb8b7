// svckit/src/database/factory.rs
//
// Connection factory: resolves the seed address, opens the session and
// reads the cluster topology once
//

use serde_json::Value;
use tracing::{debug, info, warn};

use super::connection::{ConnectOptions, DatabaseConnection, RethinkConnection};
use crate::config::ThinkerConfig;
use crate::errors::ThinkerError;

/// Seed address plus every ReQL address discovered from `server_status`
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTopology {
    pub seed: String,
    pub nodes: Vec<String>,
}

/// A live connection owned by one invocation
pub struct Session {
    connection: Box<dyn DatabaseConnection>,
    topology: ClusterTopology,
}

impl Session {
    pub fn connection(&self) -> &dyn DatabaseConnection {
        self.connection.as_ref()
    }

    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    pub async fn close(self) -> Result<(), ThinkerError> {
        self.connection.close().await
    }
}

/// Database connection factory
pub struct DatabaseFactory;

impl DatabaseFactory {
    /// Connect to the configured seed server
    pub async fn open_session(config: &ThinkerConfig) -> Result<Session, ThinkerError> {
        let address = config.address()?;
        let options = ConnectOptions {
            address,
            auth_key: config.auth_key().to_string(),
            database: config.database().map(str::to_string),
        };

        debug!(
            host = %config.host,
            port = config.port,
            db = ?config.database(),
            "Connecting"
        );
        let connection = RethinkConnection::connect(&options).await?;

        Ok(Self::establish(Box::new(connection), config.discover).await)
    }

    /// Wrap an open connection into a session, discovering peers if asked
    pub async fn establish(connection: Box<dyn DatabaseConnection>, discover: bool) -> Session {
        let seed = connection.address().to_string();

        let nodes = if discover {
            discover_nodes(connection.as_ref()).await
        } else {
            Vec::new()
        };

        let nodes = if nodes.is_empty() {
            vec![seed.clone()]
        } else {
            nodes
        };

        info!("Session open via {} ({} known nodes)", seed, nodes.len());

        Session {
            connection,
            topology: ClusterTopology { seed, nodes },
        }
    }
}

async fn discover_nodes(connection: &dyn DatabaseConnection) -> Vec<String> {
    match connection.server_status().await {
        Ok(statuses) => {
            let mut nodes: Vec<String> = statuses.iter().flat_map(server_addresses).collect();
            nodes.sort();
            nodes.dedup();
            debug!("Discovered cluster nodes: {:?}", nodes);
            nodes
        }
        Err(e) => {
            warn!("Host discovery failed, using seed address only: {}", e);
            Vec::new()
        }
    }
}

/// ReQL addresses of one `server_status` row: each canonical host paired with
/// the server's `reql_port`
pub fn server_addresses(status: &Value) -> Vec<String> {
    let network = &status["network"];
    let Some(port) = network["reql_port"].as_u64() else {
        return Vec::new();
    };

    network["canonical_addresses"]
        .as_array()
        .map(|addresses| {
            addresses
                .iter()
                .filter_map(|a| a["host"].as_str())
                .map(|host| format!("{}:{}", host, port))
                .collect()
        })
        .unwrap_or_default()
}
