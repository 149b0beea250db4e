#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use evo_sync::db::{InstanceStore, SqliteStore};
use evo_sync::evolution::{GatewayError, GatewayService, InstanceListing};
use evo_sync::model::{GatewayInstance, Group, InstanceRecord};

/// Gateway fake whose instance list can be swapped between runs.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    listing: Arc<Mutex<InstanceListing>>,
    failure: Arc<Mutex<Option<u64>>>,
    groups: Arc<Mutex<Vec<Group>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    pub fn with_instances(instances: Vec<GatewayInstance>) -> Self {
        let gw = Self::default();
        *gw.listing.try_lock().unwrap() = InstanceListing {
            instances,
            malformed: false,
        };
        gw
    }

    pub async fn set_instances(&self, instances: Vec<GatewayInstance>) {
        *self.listing.lock().await = InstanceListing {
            instances,
            malformed: false,
        };
    }

    pub async fn set_malformed(&self) {
        *self.listing.lock().await = InstanceListing {
            instances: Vec::new(),
            malformed: true,
        };
    }

    /// Make every fetch time out.
    pub async fn fail_with_timeout(&self, secs: u64) {
        *self.failure.lock().await = Some(secs);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayService for ScriptedGateway {
    async fn fetch_instances(&self) -> Result<InstanceListing, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(secs) = *self.failure.lock().await {
            return Err(GatewayError::Timeout { secs });
        }
        Ok(self.listing.lock().await.clone())
    }

    async fn fetch_groups(
        &self,
        _instance: &str,
        _get_participants: bool,
    ) -> Result<Vec<Group>, GatewayError> {
        Ok(self.groups.lock().await.clone())
    }
}

/// SQLite-backed store that fails saves/deletes for chosen instance names.
#[derive(Clone)]
pub struct FlakyStore {
    inner: SqliteStore,
    fail_save: Arc<Mutex<HashSet<String>>>,
    fail_delete: Arc<Mutex<HashSet<String>>>,
    fail_listing: Arc<Mutex<bool>>,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_save: Arc::default(),
            fail_delete: Arc::default(),
            fail_listing: Arc::default(),
        }
    }

    pub async fn fail_save_of(&self, name: &str) {
        self.fail_save.lock().await.insert(name.to_string());
    }

    pub async fn fail_delete_of(&self, name: &str) {
        self.fail_delete.lock().await.insert(name.to_string());
    }

    pub async fn go_down(&self) {
        *self.fail_listing.lock().await = true;
    }
}

#[async_trait]
impl InstanceStore for FlakyStore {
    async fn list_instances(&self, user_id: &str) -> Result<Vec<InstanceRecord>> {
        self.inner.list_instances(user_id).await
    }

    async fn list_instance_names(&self, user_id: &str) -> Result<Vec<String>> {
        if *self.fail_listing.lock().await {
            return Err(anyhow!("database unavailable"));
        }
        self.inner.list_instance_names(user_id).await
    }

    async fn find_instance(
        &self,
        user_id: &str,
        instance_name: &str,
    ) -> Result<Option<InstanceRecord>> {
        self.inner.find_instance(user_id, instance_name).await
    }

    async fn save_instance(&self, record: &InstanceRecord) -> Result<()> {
        if self.fail_save.lock().await.contains(&record.instance_name) {
            return Err(anyhow!("constraint violation"));
        }
        self.inner.save_instance(record).await
    }

    async fn delete_instance(&self, user_id: &str, instance_name: &str) -> Result<()> {
        if self.fail_delete.lock().await.contains(instance_name) {
            return Err(anyhow!("permission denied"));
        }
        self.inner.delete_instance(user_id, instance_name).await
    }
}

/// In-memory store that logs which user each run was scoped to. Saves can be
/// slowed down to observe in-flight ticks.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<HashMap<(String, String), InstanceRecord>>>,
    runs: Arc<Mutex<Vec<String>>>,
    save_delay: Arc<Mutex<Option<Duration>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub async fn slow_saves(&self, delay: Duration) {
        *self.save_delay.lock().await = Some(delay);
    }

    pub async fn runs_for(&self, user_id: &str) -> usize {
        self.runs.lock().await.iter().filter(|u| *u == user_id).count()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn list_instances(&self, user_id: &str) -> Result<Vec<InstanceRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_instance_names(&self, user_id: &str) -> Result<Vec<String>> {
        self.runs.lock().await.push(user_id.to_string());
        let rows = self.rows.lock().await;
        Ok(rows
            .keys()
            .filter(|(u, _)| u == user_id)
            .map(|(_, n)| n.clone())
            .collect())
    }

    async fn find_instance(
        &self,
        user_id: &str,
        instance_name: &str,
    ) -> Result<Option<InstanceRecord>> {
        let key = (user_id.to_string(), instance_name.to_string());
        Ok(self.rows.lock().await.get(&key).cloned())
    }

    async fn save_instance(&self, record: &InstanceRecord) -> Result<()> {
        let delay = *self.save_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let key = (record.user_id.clone(), record.instance_name.clone());
        self.rows.lock().await.insert(key, record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_instance(&self, user_id: &str, instance_name: &str) -> Result<()> {
        let key = (user_id.to_string(), instance_name.to_string());
        self.rows.lock().await.remove(&key);
        Ok(())
    }
}
