use surrealdb::Surreal;
use surrealdb::opt::auth::Root;
use surrealdb::engine::any::{self, Any};
use std::env;
use std::sync::Arc;
use tracing::info;
use crate::error::Result;

/// Address of the embedded in-memory engine.
pub const MEMORY_ADDRESS: &str = "mem://";

#[derive(Debug, Clone)]
pub struct DbConnection {
    /// Full engine address, e.g. `ws://127.0.0.1:4030` or `mem://`.
    pub address: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String
}

impl Default for DbConnection {
    fn default() -> Self {
        let host: String = env::var("TRIGGERD_DB_HOST").unwrap_or("127.0.0.1".to_string());
        let port: u16 = env::var("TRIGGERD_DB_PORT").ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(4030);
        Self {
            address: env::var("TRIGGERD_DB_ADDRESS").unwrap_or(format!("ws://{}:{}",host,port)),
            username: env::var("TRIGGERD_DB_USERNAME").unwrap_or(String::new()),
            password: env::var("TRIGGERD_DB_PASSWORD").unwrap_or(String::new()),
            namespace: env::var("TRIGGERD_DB_NAMESPACE").unwrap_or("triggerd".to_string()),
            database: env::var("TRIGGERD_DB_NAME").unwrap_or("triggerd".to_string()),
        }
    }
}

impl DbConnection {
    /// Settings for a private embedded database, used for single-host setups and tests.
    pub fn memory() -> Self {
        Self {
            address: MEMORY_ADDRESS.to_string(),
            username: String::new(),
            password: String::new(),
            namespace: "triggerd".to_string(),
            database: "triggerd".to_string(),
        }
    }

    fn is_embedded(&self) -> bool {
        self.address.starts_with("mem:")
    }
}

#[derive(Debug, Clone)]
pub struct Db {
    pub client: Arc<Surreal<Any>>
}

impl Db {
    pub async fn new(config: Option<DbConnection>) -> Result<Self> {
        let config: DbConnection = config.unwrap_or_default();
        let client: Surreal<Any> = any::connect(config.address.as_str()).await?;
        if !config.is_embedded() && !config.username.is_empty() {
            client.signin(Root {
                username: config.username.as_str(),
                password: config.password.as_str(),
            }).await?;
        }
        client.use_ns(config.namespace.as_str()).use_db(config.database.as_str()).await?;
        info!("connected to {}",config.address);
        Ok(Self {
            client: Arc::new(client),
        })
    }
}
