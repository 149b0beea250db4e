//! Instance reconciliation: make the persisted table for a user match the
//! gateway's instance list.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::db::InstanceStore;
use crate::evolution::GatewayService;
use crate::model::{GatewayInstance, InstanceRecord, InstanceStatus, SyncResult};

/// Build the row to persist for `incoming`, given what is stored now.
///
/// `connected_at` moves only on a transition into `open` (or an insert that
/// is already open); `disconnected_at` only on `open -> close`.
pub fn plan_upsert(
    user_id: &str,
    existing: Option<&InstanceRecord>,
    incoming: &GatewayInstance,
    integration: &str,
    now: DateTime<Utc>,
) -> InstanceRecord {
    let (created_at, mut connected_at, mut disconnected_at) = match existing {
        Some(prev) => (prev.created_at, prev.connected_at, prev.disconnected_at),
        None => (now, None, None),
    };

    match existing.map(|prev| prev.status) {
        None => {
            if incoming.status == InstanceStatus::Open {
                connected_at = Some(now);
            }
        }
        Some(prev) if prev != incoming.status => match (prev, incoming.status) {
            (_, InstanceStatus::Open) => connected_at = Some(now),
            (InstanceStatus::Open, InstanceStatus::Close) => disconnected_at = Some(now),
            _ => {}
        },
        Some(_) => {}
    }

    InstanceRecord {
        user_id: user_id.to_string(),
        instance_name: incoming.instance_name.clone(),
        instance_id: incoming.instance_id.clone(),
        status: incoming.status,
        owner: incoming.owner.clone(),
        profile_name: incoming.profile_name.clone(),
        profile_picture_url: incoming.profile_picture_url.clone(),
        integration: integration.to_string(),
        created_at,
        updated_at: now,
        connected_at,
        disconnected_at,
    }
}

pub struct Reconciler {
    gateway: Arc<dyn GatewayService>,
    store: Arc<dyn InstanceStore>,
    integration: String,
}

impl Reconciler {
    pub fn new(
        gateway: Arc<dyn GatewayService>,
        store: Arc<dyn InstanceStore>,
        integration: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            integration: integration.into(),
        }
    }

    /// Current persisted instances for `user_id`, newest first.
    pub async fn get_instances(&self, user_id: &str) -> Result<Vec<InstanceRecord>> {
        let instances = self.store.list_instances(user_id).await?;
        debug!(user_id, count = instances.len(), "loaded persisted instances");
        Ok(instances)
    }

    /// Upsert one gateway instance for `user_id` at time `now`.
    pub async fn save_instance(
        &self,
        user_id: &str,
        incoming: &GatewayInstance,
        now: DateTime<Utc>,
    ) -> Result<InstanceRecord> {
        let existing = self
            .store
            .find_instance(user_id, &incoming.instance_name)
            .await?;
        let record = plan_upsert(user_id, existing.as_ref(), incoming, &self.integration, now);
        self.store.save_instance(&record).await?;
        match existing {
            Some(_) => debug!(user_id, instance = %record.instance_name, "updated instance"),
            None => info!(user_id, instance = %record.instance_name, "created instance"),
        }
        Ok(record)
    }

    pub async fn sync_instances_from_api(&self, user_id: &str) -> Result<SyncResult> {
        self.sync_at(user_id, Utc::now()).await
    }

    /// One reconciliation run with `now` as the transition timestamp.
    ///
    /// Gateway failures yield an unsuccessful `SyncResult`; per-instance
    /// failures are collected. Only a failure to read the persisted set
    /// is returned as `Err`.
    #[instrument(skip(self, now))]
    pub async fn sync_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<SyncResult> {
        info!("starting sync from gateway");

        let listing = match self.gateway.fetch_instances().await {
            Ok(listing) => listing,
            Err(err) => {
                error!(?err, "failed to fetch instances from gateway");
                return Ok(SyncResult::failed(err.to_string(), Utc::now()));
            }
        };

        let persisted: HashSet<String> = self
            .store
            .list_instance_names(user_id)
            .await?
            .into_iter()
            .collect();

        let mut synced = 0;
        let mut errors = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        for incoming in &listing.instances {
            if !seen.insert(incoming.instance_name.as_str()) {
                debug!(instance = %incoming.instance_name, "duplicate instance in listing; skipped");
                continue;
            }
            match self.save_instance(user_id, incoming, now).await {
                Ok(_) => synced += 1,
                Err(err) => {
                    let msg = format!("Failed to sync {}: {:#}", incoming.instance_name, err);
                    error!(instance = %incoming.instance_name, ?err, "failed to sync instance");
                    errors.push(msg);
                }
            }
        }

        if listing.malformed {
            warn!(
                persisted = persisted.len(),
                "gateway listing malformed; keeping persisted instances"
            );
        } else {
            let live: HashSet<&str> = listing
                .instances
                .iter()
                .map(|i| i.instance_name.as_str())
                .collect();
            let mut stale: Vec<&String> = persisted
                .iter()
                .filter(|name| !live.contains(name.as_str()))
                .collect();
            stale.sort();

            for name in stale {
                info!(instance = %name, "removing instance deleted upstream");
                if let Err(err) = self.store.delete_instance(user_id, name).await {
                    let msg = format!("Failed to remove {}: {:#}", name, err);
                    error!(instance = %name, ?err, "failed to remove instance");
                    errors.push(msg);
                }
            }
        }

        let result = SyncResult {
            success: errors.is_empty(),
            synced,
            errors,
            timestamp: Utc::now(),
        };
        info!(
            synced = result.synced,
            errors = result.errors.len(),
            "sync completed"
        );
        Ok(result)
    }
}
