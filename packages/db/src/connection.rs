//! Database connection management with lazy initialization.

use std::sync::LazyLock;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Global database instance using lazy initialization.
static DB: LazyLock<OnceCell<Surreal<Any>>> = LazyLock::new(OnceCell::new);

/// Database connection wrapper.
pub type Database = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    /// Connection endpoint: "mem://", "rocksdb://path" or "ws://host:port"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "forecast".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for a remote server.
    pub fn remote(host: &str, port: u16) -> Self {
        Self {
            endpoint: format!("ws://{}:{}", host, port),
            ..Default::default()
        }
    }

    /// Create a config for RocksDB persistence (requires rocksdb feature).
    pub fn rocksdb(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("rocksdb://{}", path.into()),
            ..Default::default()
        }
    }

    /// Build a config from variables resolved through `lookup`.
    ///
    /// - `DB_ENDPOINT` overrides host and port entirely (e.g. `mem://`)
    /// - `DB_HOST` (default: `localhost`), `DB_PORT` (default: `8000`)
    /// - `DB_NAMESPACE` (default: `forecast`), `DB_NAME` (default: `main`)
    /// - `DB_USERNAME` / `DB_PASSWORD` (optional, both required to sign in)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let mut config = match get("DB_ENDPOINT") {
            Some(endpoint) => Self {
                endpoint,
                ..Default::default()
            },
            None => {
                let host = get("DB_HOST").unwrap_or_else(|| "localhost".to_string());
                let port = match get("DB_PORT") {
                    Some(raw) => raw
                        .parse::<u16>()
                        .map_err(|_| DbError::Config(format!("invalid DB_PORT={raw}")))?,
                    None => 8000,
                };
                Self::remote(&host, port)
            }
        };

        if let Some(namespace) = get("DB_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(database) = get("DB_NAME") {
            config.database = database;
        }
        if let (Some(username), Some(password)) = (get("DB_USERNAME"), get("DB_PASSWORD")) {
            config.credentials = Some((username, password));
        }

        Ok(config)
    }

    /// Build a config from the process environment.
    pub fn from_env() -> Result<Self, DbError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not initialized - call init_db first")]
    NotInitialized,
    #[error("Invalid database config: {0}")]
    Config(String),
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Initialize the database connection.
///
/// This should be called once at application startup before any database operations.
/// Later calls return the existing connection.
pub async fn init_db(config: DbConfig) -> Result<&'static Database, DbError> {
    DB.get_or_try_init(|| async {
        tracing::info!("Connecting to database: {}", config.endpoint);

        let db = connect(&config.endpoint).await?;

        // Authenticate if credentials provided
        if let Some((username, password)) = &config.credentials {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(&config.namespace).use_db(&config.database).await?;

        tracing::info!(
            "Connected to database: {}/{}",
            config.namespace,
            config.database
        );

        Ok(db)
    })
    .await
}

/// Get the database connection.
pub fn get_db() -> Result<&'static Database, DbError> {
    DB.get().ok_or(DbError::NotInitialized)
}
