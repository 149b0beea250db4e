//! Storage seam used by the reconciler. `SqliteStore` is the production
//! implementation; tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use super::repo::{self, Pool};
use crate::model::InstanceRecord;

#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn list_instances(&self, user_id: &str) -> Result<Vec<InstanceRecord>>;

    async fn list_instance_names(&self, user_id: &str) -> Result<Vec<String>>;

    async fn find_instance(&self, user_id: &str, instance_name: &str)
        -> Result<Option<InstanceRecord>>;

    async fn save_instance(&self, record: &InstanceRecord) -> Result<()>;

    async fn delete_instance(&self, user_id: &str, instance_name: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceStore for SqliteStore {
    async fn list_instances(&self, user_id: &str) -> Result<Vec<InstanceRecord>> {
        repo::list_instances(&self.pool, user_id).await
    }

    async fn list_instance_names(&self, user_id: &str) -> Result<Vec<String>> {
        repo::list_instance_names(&self.pool, user_id).await
    }

    async fn find_instance(
        &self,
        user_id: &str,
        instance_name: &str,
    ) -> Result<Option<InstanceRecord>> {
        repo::find_instance(&self.pool, user_id, instance_name).await
    }

    async fn save_instance(&self, record: &InstanceRecord) -> Result<()> {
        repo::upsert_instance(&self.pool, record).await
    }

    async fn delete_instance(&self, user_id: &str, instance_name: &str) -> Result<()> {
        repo::delete_instance(&self.pool, user_id, instance_name).await?;
        Ok(())
    }
}
