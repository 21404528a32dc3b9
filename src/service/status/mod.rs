//! Persistent key/value status store.
//!
//! Values are stored as JSON text under a `(section, key)` pair, which keeps the
//! backend ignorant of the shapes callers put in it.

pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::base::types::{Res, Void};

/// Section holding per-bot settings.
pub const BOT_SECTION: &str = "bot";
/// Key holding the list of mounted rule-packages.
pub const PACKAGES_KEY: &str = "packages";

// Traits.

/// Generic status store trait that backends must implement.
#[async_trait]
pub trait GenericStatusStore: Send + Sync + 'static {
    /// Get the raw JSON stored under `section` / `key`, if any.
    async fn get(&self, section: &str, key: &str) -> Res<Option<String>>;

    /// Store raw JSON under `section` / `key`, replacing any previous value.
    async fn set(&self, section: &str, key: &str, value: &str) -> Void;
}

// Structs.

/// Status client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct StatusClient {
    inner: Arc<dyn GenericStatusStore>,
}

impl Deref for StatusClient {
    type Target = dyn GenericStatusStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl StatusClient {
    pub fn new(inner: Arc<dyn GenericStatusStore>) -> Self {
        Self { inner }
    }

    /// Get and deserialize the value under `section` / `key`.
    pub async fn get_value<T: DeserializeOwned>(&self, section: &str, key: &str) -> Res<Option<T>> {
        match self.get(section, key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store `value` under `section` / `key`.
    pub async fn set_value<T: Serialize + ?Sized>(&self, section: &str, key: &str, value: &T) -> Void {
        let raw = serde_json::to_string(value)?;
        self.set(section, key, &raw).await
    }

    /// The mounted rule-packages; an unset list is empty.
    pub async fn packages(&self) -> Res<Vec<String>> {
        Ok(self.get_value(BOT_SECTION, PACKAGES_KEY).await?.unwrap_or_default())
    }

    pub async fn set_packages(&self, packages: &[String]) -> Void {
        self.set_value(BOT_SECTION, PACKAGES_KEY, packages).await
    }
}
