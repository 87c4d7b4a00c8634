use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, GetOptions};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{ControlStore, Item, SecurityControl};
use crate::{
    config,
    error::{RegistryError, RegistryResult},
};

/// etcd-backed store. The client is created lazily on first use and reused
/// across requests; a failed call drops it so the next request reconnects.
pub struct EtcdStore {
    config: config::Etcd,
    client: Arc<Mutex<Option<Client>>>,
}

impl EtcdStore {
    pub fn new(config: config::Etcd) -> Self {
        Self {
            config,
            client: Arc::new(Mutex::new(None)),
        }
    }

    fn item_key(&self, main_id: &str) -> String {
        format!("{}/{}", self.config.prefix, main_id)
    }

    /// Create a new etcd client from config
    async fn create_client(&self) -> RegistryResult<Client> {
        let mut options = ConnectOptions::default();
        if let Some(timeout) = self.config.timeout {
            options = options.with_timeout(Duration::from_secs(timeout as u64));
        };
        if let Some(connect_timeout) = self.config.connect_timeout {
            options = options.with_connect_timeout(Duration::from_secs(connect_timeout as u64));
        };
        if let (Some(user), Some(password)) = (&self.config.user, &self.config.password) {
            options = options.with_user(user.clone(), password.clone());
        };

        let client = Client::connect(self.config.host.clone(), Some(options)).await?;
        Ok(client)
    }

    /// Ensure the shared client exists, creating it on cold start
    async fn ensure_client(&self, guard: &mut Option<Client>) -> RegistryResult<()> {
        if guard.is_none() {
            log::info!("Creating new etcd client...");
            *guard = Some(self.create_client().await?);
        }
        Ok(())
    }

    /// Map a client call result, dropping the client on failure so the next
    /// request reconnects
    fn reset_on_err<T>(
        guard: &mut Option<Client>,
        result: Result<T, etcd_client::Error>,
    ) -> RegistryResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                log::error!("etcd call failed: {err}");
                *guard = None;
                Err(err.into())
            }
        }
    }

    fn decode_item(value: &[u8]) -> RegistryResult<Item> {
        let parsed: Value = serde_json::from_slice(value)?;
        match parsed {
            Value::Object(map) => Ok(map),
            other => Err(RegistryError::Store(format!(
                "stored item is not a JSON object: {other}"
            ))),
        }
    }
}

#[async_trait]
impl ControlStore for EtcdStore {
    async fn get(&self, main_id: &str) -> RegistryResult<Option<Item>> {
        let key = self.item_key(main_id);

        let mut guard = self.client.lock().await;
        self.ensure_client(&mut guard).await?;
        let client = guard
            .as_mut()
            .ok_or_else(|| RegistryError::Store("etcd client is not initialized".to_string()))?;

        let result = client.get(key, None).await;
        let response = Self::reset_on_err(&mut guard, result)?;

        match response.kvs().first() {
            Some(kv) => Ok(Some(Self::decode_item(kv.value())?)),
            None => Ok(None),
        }
    }

    async fn scan(&self) -> RegistryResult<Vec<Item>> {
        let prefix = format!("{}/", self.config.prefix);

        let mut guard = self.client.lock().await;
        self.ensure_client(&mut guard).await?;
        let client = guard
            .as_mut()
            .ok_or_else(|| RegistryError::Store("etcd client is not initialized".to_string()))?;

        let result = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await;
        let response = Self::reset_on_err(&mut guard, result)?;

        response
            .kvs()
            .iter()
            .map(|kv| Self::decode_item(kv.value()))
            .collect()
    }

    async fn put(&self, control: &SecurityControl) -> RegistryResult<()> {
        let key = self.item_key(&control.main_id);
        let value = serde_json::to_vec(control)?;

        let mut guard = self.client.lock().await;
        self.ensure_client(&mut guard).await?;
        let client = guard
            .as_mut()
            .ok_or_else(|| RegistryError::Store("etcd client is not initialized".to_string()))?;

        let result = client.put(key, value, None).await;
        Self::reset_on_err(&mut guard, result)?;
        Ok(())
    }

    async fn update(&self, main_id: &str, fields: &Map<String, Value>) -> RegistryResult<()> {
        // etcd has no per-field update, so merge into the stored item under
        // its single key. An absent item is created, matching the upsert
        // semantics of the store contract.
        let mut item = self.get(main_id).await?.unwrap_or_else(|| {
            let mut fresh = Map::new();
            fresh.insert("mainID".to_string(), Value::String(main_id.to_string()));
            fresh
        });
        for (key, value) in fields {
            item.insert(key.clone(), value.clone());
        }

        let key = self.item_key(main_id);
        let value = serde_json::to_vec(&Value::Object(item))?;

        let mut guard = self.client.lock().await;
        self.ensure_client(&mut guard).await?;
        let client = guard
            .as_mut()
            .ok_or_else(|| RegistryError::Store("etcd client is not initialized".to_string()))?;

        let result = client.put(key, value, None).await;
        Self::reset_on_err(&mut guard, result)?;
        Ok(())
    }

    async fn delete(&self, main_id: &str) -> RegistryResult<()> {
        let key = self.item_key(main_id);

        let mut guard = self.client.lock().await;
        self.ensure_client(&mut guard).await?;
        let client = guard
            .as_mut()
            .ok_or_else(|| RegistryError::Store("etcd client is not initialized".to_string()))?;

        let result = client.delete(key, None).await;
        Self::reset_on_err(&mut guard, result)?;
        Ok(())
    }
}
