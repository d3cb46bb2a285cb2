use std::sync::Arc;

use anyhow::{Context, Result};
use mandi_core::ParchiStore;
use mandi_ledger::{StoreBackend, open_store};
use tracing::info;

pub async fn connect_store(backend: &StoreBackend) -> Result<Arc<dyn ParchiStore>> {
    let store = open_store(backend)
        .await
        .with_context(|| format!("failed to open {} parchi store", backend.name()))?;

    if let StoreBackend::Sqlite { db_path } = backend {
        info!(db_path = %db_path.display(), "using sqlite ledger");
    }

    Ok(Arc::from(store))
}
