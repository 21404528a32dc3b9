//! SurrealDB implementation of the status store.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{debug, info, instrument};

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{GenericStatusStore, StatusClient};

const TABLE: &str = "status";

// Extra methods on `StatusClient` applied by the surreal implementation.

impl StatusClient {
    /// Connect to the status store described by the configuration.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealStatusStore::new(config).await?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Create a fresh in-memory status store.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealStatusStore::connect("mem://", None, "infini", "test").await?;
        Ok(Self::new(Arc::new(client)))
    }
}

/// A status record in the database.
#[derive(Debug, Serialize, Deserialize)]
struct StatusRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<surrealdb::sql::Thing>,
    value: String,
}

/// SurrealDB status store.
#[derive(Clone)]
pub struct SurrealStatusStore {
    db: Surreal<Any>,
}

impl SurrealStatusStore {
    #[instrument(name = "SurrealStatusStore::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        let credentials = match (&config.status_username, &config.status_password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        };

        Self::connect(&config.status_endpoint, credentials, &config.status_namespace, &config.status_database).await
    }

    async fn connect(endpoint: &str, credentials: Option<(&str, &str)>, namespace: &str, database: &str) -> Res<Self> {
        let db = any::connect(endpoint).await?;

        if let Some((username, password)) = credentials {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(namespace).use_db(database).await?;

        info!("Status store connected to `{}`.", endpoint);

        Ok(Self { db })
    }
}

fn record_id(section: &str, key: &str) -> String {
    format!("{section}.{key}")
}

#[async_trait]
impl GenericStatusStore for SurrealStatusStore {
    #[instrument(skip(self))]
    async fn get(&self, section: &str, key: &str) -> Res<Option<String>> {
        let record: Option<StatusRecord> = self.db.select((TABLE, record_id(section, key))).await?;

        Ok(record.map(|r| r.value))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, section: &str, key: &str, value: &str) -> Void {
        let record = StatusRecord {
            id: None,
            value: value.to_string(),
        };

        let _: Option<StatusRecord> = self.db.upsert((TABLE, record_id(section, key))).content(record).await?;

        debug!("Stored `{}`.", record_id(section, key));

        Ok(())
    }
}

// Tests.
