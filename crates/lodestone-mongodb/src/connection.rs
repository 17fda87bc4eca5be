//! MongoDB connection management with pool configuration and health checking

use bson::{doc, Document as BsonDocument};
use lodestone_common::{LodestoneError, Result};
use mongodb::{
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Database,
};
use std::time::Duration;
use tracing::{info, instrument};

use crate::collection::ModelCollection;
use crate::model::Model;
use crate::settings::Settings;

/// Driver pool sizing and timeouts; `None` leaves the driver default
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub min_pool_size: Option<u32>,
    /// Defaults to 10
    pub max_pool_size: Option<u32>,
    pub max_idle_time: Option<Duration>,
    /// Defaults to 10s
    pub connect_timeout: Option<Duration>,
    /// Defaults to 30s
    pub server_selection_timeout: Option<Duration>,
    /// Reported to the server in the handshake; defaults to `lodestone`
    pub app_name: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_pool_size: None,
            max_pool_size: Some(10),
            max_idle_time: None,
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            app_name: Some("lodestone".to_string()),
        }
    }
}

impl PoolConfig {
    /// Overlay the set values onto `options`
    pub fn apply(&self, options: &mut ClientOptions) {
        options.min_pool_size = self.min_pool_size.or(options.min_pool_size);
        options.max_pool_size = self.max_pool_size.or(options.max_pool_size);
        options.max_idle_time = self.max_idle_time.or(options.max_idle_time);
        options.connect_timeout = self.connect_timeout.or(options.connect_timeout);
        options.server_selection_timeout = self
            .server_selection_timeout
            .or(options.server_selection_timeout);
        if let Some(app) = &self.app_name {
            options.app_name = Some(app.clone());
        }
    }
}

/// A live MongoDB client bound to one database.
///
/// Cloning is cheap: the driver client is reference counted. Pass the
/// connection to whatever needs it; there is no process-wide instance.
#[derive(Debug, Clone)]
pub struct Connection {
    client: Client,
    database: Database,
    database_name: String,
    validate_queries: bool,
}

impl Connection {
    /// Connect with default pool settings and verify the server answers a ping
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        Self::with_config(uri, db_name, PoolConfig::default()).await
    }

    /// Connect using a [`Settings`] value
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let mut conn =
            Self::with_config(&settings.uri, &settings.database, settings.pool.clone()).await?;
        conn.validate_queries = settings.validate_queries;
        Ok(conn)
    }

    /// Connect with a custom pool configuration.
    ///
    /// Every failure (bad URI, unreachable server, failed ping) is returned
    /// as [`LodestoneError::Connection`]; the caller decides what to do.
    #[instrument(skip(uri, config), fields(database = db_name))]
    pub async fn with_config(uri: &str, db_name: &str, config: PoolConfig) -> Result<Self> {
        if uri.is_empty() || db_name.is_empty() {
            return Err(LodestoneError::Connection(
                "both a URI and a database name are required".to_string(),
            ));
        }

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| LodestoneError::Connection(format!("bad MongoDB URI: {}", e)))?;
        config.apply(&mut options);
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());

        let client = Client::with_options(options)
            .map_err(|e| LodestoneError::Connection(e.to_string()))?;
        let conn = Self::from_client(client, db_name);
        conn.ping().await?;

        info!("Connected to MongoDB");
        Ok(conn)
    }

    /// Wrap a driver client the application already owns. No ping is sent.
    pub fn from_client(client: Client, db_name: &str) -> Self {
        let database = client.database(db_name);
        Self {
            client,
            database,
            database_name: db_name.to_string(),
            validate_queries: false,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// The underlying driver client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Whether filters and pipelines are screened for server-side JavaScript
    pub fn validates_queries(&self) -> bool {
        self.validate_queries
    }

    /// Enable or disable query screening for collections bound afterwards
    pub fn set_validate_queries(&mut self, enabled: bool) {
        self.validate_queries = enabled;
    }

    /// Bind a model type to a collection.
    ///
    /// Fails with [`LodestoneError::Configuration`] when the collection name
    /// is unusable or the model's relation table is malformed. No I/O.
    pub fn collection<M: Model>(&self, name: &str) -> Result<ModelCollection<M>> {
        ModelCollection::bind(self, name)
    }

    /// Round-trip `{ ping: 1 }`; an unreachable server is a connection error
    pub async fn ping(&self) -> Result<bool> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| true)
            .map_err(|e| LodestoneError::Connection(format!("ping failed: {}", e)))
    }

    /// Run a raw command against the bound database
    pub async fn run_command(&self, command: BsonDocument) -> Result<BsonDocument> {
        Ok(self.database.run_command(command).await?)
    }

    /// Drop the bound database and everything in it
    pub async fn drop_database(&self) -> Result<()> {
        self.database.drop().await?;
        Ok(())
    }
}
