use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use mandi_core::{
    DatabaseError, DigitalParchi, HealthReport, HealthStatus, LedgerResult, Page, ParchiFilter,
    ParchiStore, ParchiUpdate,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ConnectionState;

const STORE_TYPE: &str = "memory";

/// Key-value store holding each parchi as its JSON document, keyed by id.
/// Documents outlive `close`; reopening with `initialize` sees them again.
#[derive(Default)]
pub struct MemoryParchiStore {
    state: RwLock<ConnectionState<()>>,
    documents: RwLock<HashMap<Uuid, String>>,
}

impl MemoryParchiStore {
    async fn ensure_open(&self) -> Result<(), DatabaseError> {
        self.state.read().await.handle().map(|_| ())
    }

    async fn decoded(&self) -> Result<Vec<DigitalParchi>, DatabaseError> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .map(|(id, document)| decode(*id, document))
            .collect()
    }
}

#[async_trait]
impl ParchiStore for MemoryParchiStore {
    fn store_type(&self) -> &'static str {
        STORE_TYPE
    }

    async fn initialize(&self) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        if !matches!(*state, ConnectionState::Open(())) {
            *state = ConnectionState::Open(());
            info!("memory parchi store initialized");
        }
        Ok(())
    }

    async fn save_parchi(&self, parchi: &DigitalParchi) -> LedgerResult<Uuid> {
        parchi.validate()?;
        self.ensure_open().await?;

        let document = encode(parchi)?;
        self.documents.write().await.insert(parchi.id, document);

        debug!(parchi_id = %parchi.id, "parchi saved");
        Ok(parchi.id)
    }

    async fn get_parchi(&self, id: Uuid) -> LedgerResult<Option<DigitalParchi>> {
        self.ensure_open().await?;

        let documents = self.documents.read().await;
        match documents.get(&id) {
            Some(document) => Ok(Some(decode(id, document)?)),
            None => Ok(None),
        }
    }

    async fn list_parchis(
        &self,
        page: Page,
        filter: &ParchiFilter,
    ) -> LedgerResult<Vec<DigitalParchi>> {
        filter.validate()?;
        self.ensure_open().await?;

        let mut parchis: Vec<DigitalParchi> = self
            .decoded()
            .await?
            .into_iter()
            .filter(|parchi| filter.matches(parchi))
            .collect();
        parchis.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(parchis
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn update_parchi(&self, id: Uuid, update: ParchiUpdate) -> LedgerResult<bool> {
        self.ensure_open().await?;

        let mut documents = self.documents.write().await;
        let Some(document) = documents.get(&id) else {
            warn!(parchi_id = %id, "update for unknown parchi");
            return Ok(false);
        };

        let mut parchi = decode(id, document)?;
        parchi.apply_update(update)?;
        documents.insert(id, encode(&parchi)?);

        debug!(parchi_id = %id, updated_at = %parchi.updated_at, "parchi updated");
        Ok(true)
    }

    async fn delete_parchi(&self, id: Uuid) -> LedgerResult<bool> {
        self.ensure_open().await?;

        let deleted = self.documents.write().await.remove(&id).is_some();
        if deleted {
            debug!(parchi_id = %id, "parchi deleted");
        } else {
            warn!(parchi_id = %id, "delete for unknown parchi");
        }
        Ok(deleted)
    }

    async fn count_parchis(&self, filter: &ParchiFilter) -> LedgerResult<i64> {
        filter.validate()?;
        self.ensure_open().await?;

        if *filter == ParchiFilter::default() {
            return Ok(self.documents.read().await.len() as i64);
        }

        let count = self
            .decoded()
            .await?
            .iter()
            .filter(|parchi| filter.matches(parchi))
            .count();
        Ok(count as i64)
    }

    async fn health_check(&self) -> LedgerResult<HealthReport> {
        if let Err(err) = self.ensure_open().await {
            return Ok(HealthReport::unhealthy(STORE_TYPE, None, err));
        }

        let documents = self.documents.read().await;
        let storage_size_bytes = documents.values().map(|document| document.len() as u64).sum();

        Ok(HealthReport {
            status: HealthStatus::Healthy,
            store_type: STORE_TYPE.to_string(),
            location: None,
            storage_size_bytes,
            connection_active: true,
            total_parchis: documents.len() as i64,
            checked_at: Utc::now(),
            error: None,
        })
    }

    async fn close(&self) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        if matches!(*state, ConnectionState::Open(())) {
            info!("memory parchi store closed");
        }
        *state = ConnectionState::Closed;
        Ok(())
    }
}

fn encode(parchi: &DigitalParchi) -> Result<String, DatabaseError> {
    parchi
        .to_json()
        .map_err(DatabaseError::backend("failed to encode parchi document"))
}

fn decode(id: Uuid, document: &str) -> Result<DigitalParchi, DatabaseError> {
    DigitalParchi::from_json(document).map_err(|err| DatabaseError::Corrupt {
        id: id.to_string(),
        reason: err.to_string(),
    })
}
