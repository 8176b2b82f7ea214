//! Connection management for MongoDB
//!
//! The connection target is handed to the driver verbatim; this module only
//! applies the configured timeouts and application name, then verifies the
//! deployment answers a `ping` before any export work starts.

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};

/// MongoDB connection manager
pub struct ConnectionManager {
    /// MongoDB client instance, once connected
    client: Option<Client>,

    /// Connection configuration
    config: ConnectionConfig,

    /// Connection URI
    uri: String,
}

impl ConnectionManager {
    /// Create a new connection manager
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection URI
    /// * `config` - Connection configuration
    pub fn new(uri: String, config: ConnectionConfig) -> Self {
        Self {
            client: None,
            config,
            uri,
        }
    }

    /// Establish and verify the connection
    pub async fn connect(&mut self) -> Result<()> {
        let options = self.client_options().await?;
        let client = Client::with_options(options)
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ConnectionError::PingFailed(e.to_string()))?;

        info!("Connected to MongoDB");
        self.client = Some(client);
        Ok(())
    }

    /// Parse the URI and apply configured settings
    async fn client_options(&self) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        let timeout = self.config.timeout_duration();
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        if options.app_name.is_none() {
            options.app_name = Some(self.config.app_name.clone());
        }
        debug!("Client options prepared (timeout {}s)", self.config.timeout);
        Ok(options)
    }

    /// Get a database handle
    pub fn database(&self, name: &str) -> Result<Database> {
        self.client
            .as_ref()
            .map(|client| client.database(name))
            .ok_or_else(|| ConnectionError::ConnectionFailed("not connected".to_string()).into())
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Close all pooled connections
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            debug!("Disconnected from MongoDB");
        }
    }
}
