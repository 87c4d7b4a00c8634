//! Storage layer for the security controls collection.
//!
//! Every item lives under a single key derived from its `mainID`; there are
//! no secondary indexes. The trait keeps the request handler independent of
//! the etcd client so tests can run against an in-memory double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RegistryResult;

pub mod etcd;

/// One stored entity instance, keyed by `mainID`. Arbitrary extra fields
/// attached via partial update are carried as-is.
pub type Item = Map<String, Value>;

/// Required fields for creation, in reporting order.
pub const REQUIRED_FIELDS: [&str; 4] = ["mainID", "mainDescription", "domain", "scope"];

/// The creation schema: exactly the four required fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityControl {
    #[serde(rename = "mainID")]
    pub main_id: String,
    pub domain: String,
    #[serde(rename = "mainDescription")]
    pub main_description: String,
    pub scope: String,
}

#[async_trait]
pub trait ControlStore: Send + Sync {
    /// Fetch a single item by exact key.
    async fn get(&self, main_id: &str) -> RegistryResult<Option<Item>>;

    /// Full collection scan, order unspecified.
    async fn scan(&self) -> RegistryResult<Vec<Item>>;

    /// Insert a new item holding the four required fields.
    async fn put(&self, control: &SecurityControl) -> RegistryResult<()>;

    /// Set exactly the given attributes on the item, creating it if absent.
    async fn update(&self, main_id: &str, fields: &Map<String, Value>) -> RegistryResult<()>;

    /// Delete by key. Deleting an absent key is not an error.
    async fn delete(&self, main_id: &str) -> RegistryResult<()>;
}
