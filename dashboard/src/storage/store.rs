//! Deployment store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::DashboardError;
use crate::filesys::file::File;
use crate::models::deployment::{Deployment, DeploymentPatch, NewDeployment};
use crate::utils::generate_uuid;

/// Deployment persistence, keyed by deployment id
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Insert a new deployment with a generated id
    async fn create(&self, new: NewDeployment) -> Result<Deployment, DashboardError>;

    /// Insert `create` if its id is unknown, otherwise apply `update` to the
    /// stored record
    async fn upsert(
        &self,
        create: Deployment,
        update: DeploymentPatch,
    ) -> Result<Deployment, DashboardError>;

    /// Point read
    async fn get(&self, id: &str) -> Result<Option<Deployment>, DashboardError>;

    /// Most recently created deployments first
    async fn list_recent(&self, limit: usize) -> Result<Vec<Deployment>, DashboardError>;

    /// Apply a partial update if `check` accepts the stored record.
    ///
    /// The check and the write are atomic with respect to other writes.
    /// `NotFound` if the id is unknown.
    async fn patch_checked(
        &self,
        id: &str,
        patch: DeploymentPatch,
        check: RecordCheck<'_>,
    ) -> Result<Deployment, DashboardError>;

    /// Apply a partial update, `NotFound` if the id is unknown
    async fn patch(&self, id: &str, patch: DeploymentPatch) -> Result<Deployment, DashboardError> {
        self.patch_checked(id, patch, &|_: &Deployment| Ok(())).await
    }
}

/// Type of the record check passed to [`DeploymentStore::patch_checked`]
pub type RecordCheck<'a> = &'a (dyn Fn(&Deployment) -> Result<(), DashboardError> + Send + Sync);

/// In-memory deployment map, optionally mirrored to a JSON file.
///
/// The file is rewritten while the write lock is held, so readers observe
/// either the previous state or the fully applied write.
pub struct JsonStore {
    records: RwLock<HashMap<String, Deployment>>,
    file: Option<Arc<File>>,
}

impl JsonStore {
    /// Store without persistence
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            file: None,
        }
    }

    /// Open a store backed by `file`, loading existing records
    pub async fn open(file: Arc<File>) -> Result<Self, DashboardError> {
        let records = if file.exists().await {
            let list: Vec<Deployment> = file.read_json().await.map_err(|e| {
                DashboardError::StorageError(format!(
                    "Failed to read {}: {}",
                    file.path().display(),
                    e
                ))
            })?;
            list.into_iter().map(|d| (d.id.clone(), d)).collect()
        } else {
            HashMap::new()
        };

        info!(
            "Loaded {} deployments from {}",
            records.len(),
            file.path().display()
        );

        Ok(Self {
            records: RwLock::new(records),
            file: Some(file),
        })
    }

    async fn persist(&self, records: &HashMap<String, Deployment>) -> Result<(), DashboardError> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let mut list: Vec<&Deployment> = records.values().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        file.write_json(&list)
            .await
            .map_err(|e| DashboardError::StorageError(format!("Failed to persist: {}", e)))
    }
}

#[async_trait]
impl DeploymentStore for JsonStore {
    async fn create(&self, new: NewDeployment) -> Result<Deployment, DashboardError> {
        let deployment = Deployment::from_new(generate_uuid(), new, Utc::now());

        let mut records = self.records.write().await;
        records.insert(deployment.id.clone(), deployment.clone());
        if let Err(e) = self.persist(&records).await {
            records.remove(&deployment.id);
            return Err(e);
        }

        debug!("Created deployment {}", deployment.id);
        Ok(deployment)
    }

    async fn upsert(
        &self,
        create: Deployment,
        update: DeploymentPatch,
    ) -> Result<Deployment, DashboardError> {
        let mut records = self.records.write().await;
        let previous = records.get(&create.id).cloned();

        let next = match &previous {
            Some(existing) => {
                let mut next = existing.clone();
                next.apply_patch(update, Utc::now());
                next
            }
            None => create,
        };

        records.insert(next.id.clone(), next.clone());
        if let Err(e) = self.persist(&records).await {
            match previous {
                Some(existing) => records.insert(existing.id.clone(), existing),
                None => records.remove(&next.id),
            };
            return Err(e);
        }

        Ok(next)
    }

    async fn get(&self, id: &str) -> Result<Option<Deployment>, DashboardError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Deployment>, DashboardError> {
        let records = self.records.read().await;
        let mut list: Vec<Deployment> = records.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        list.truncate(limit);
        Ok(list)
    }

    async fn patch_checked(
        &self,
        id: &str,
        patch: DeploymentPatch,
        check: RecordCheck<'_>,
    ) -> Result<Deployment, DashboardError> {
        let mut records = self.records.write().await;
        let Some(existing) = records.get(id).cloned() else {
            return Err(DashboardError::NotFound("Deployment".to_string()));
        };
        check(&existing)?;

        let mut next = existing.clone();
        next.apply_patch(patch, Utc::now());
        records.insert(id.to_string(), next.clone());

        if let Err(e) = self.persist(&records).await {
            records.insert(id.to_string(), existing);
            return Err(e);
        }

        Ok(next)
    }
}
