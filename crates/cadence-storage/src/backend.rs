// Storage backend selection
// Decision: Use enum dispatch for simplicity over trait objects
//
// StorageBackend works with either PostgreSQL (production) or the in-memory
// store (dev mode) behind the same EventStore seam.

use async_trait::async_trait;
use cadence_core::{EventStore, EventTransaction, InMemoryEventStore, StoreResult};
use sqlx::PgPool;
use tracing::info;

use crate::postgres::PgEventStore;

/// Storage backend that can be either PostgreSQL or in-memory
#[derive(Clone)]
pub enum StorageBackend {
    /// PostgreSQL database (production)
    Postgres(PgEventStore),
    /// In-memory store (dev mode)
    InMemory(InMemoryEventStore),
}

impl StorageBackend {
    /// Connect to PostgreSQL and apply migrations
    pub async fn postgres(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let store = PgEventStore::connect(database_url, max_connections).await?;
        store.migrate().await?;
        info!("Connected to PostgreSQL, migrations applied");
        Ok(Self::Postgres(store))
    }

    /// Create an in-memory storage backend
    pub fn in_memory() -> Self {
        Self::InMemory(InMemoryEventStore::new())
    }

    /// Connect to `database_url` when given, otherwise fall back to dev mode
    pub async fn from_url(
        database_url: Option<&str>,
        max_connections: u32,
    ) -> anyhow::Result<Self> {
        match database_url {
            Some(url) => Self::postgres(url, max_connections).await,
            None => {
                info!("DATABASE_URL not set, using in-memory storage (dev mode)");
                Ok(Self::in_memory())
            }
        }
    }

    /// Check if this is dev mode (in-memory)
    pub fn is_dev_mode(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    /// Get the PostgreSQL pool if using PostgreSQL backend
    pub fn pool(&self) -> Option<&PgPool> {
        match self {
            Self::Postgres(store) => Some(store.pool()),
            Self::InMemory(_) => None,
        }
    }
}

#[async_trait]
impl EventStore for StorageBackend {
    async fn begin(&self) -> StoreResult<Box<dyn EventTransaction>> {
        match self {
            Self::Postgres(store) => store.begin().await,
            Self::InMemory(store) => store.begin().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_url_selects_dev_mode() {
        let backend = StorageBackend::from_url(None, 5).await.unwrap();
        assert!(backend.is_dev_mode());
        assert!(backend.pool().is_none());

        let mut tx = backend.begin().await.unwrap();
        assert!(tx.list(&Default::default()).await.unwrap().is_empty());
        tx.commit().await.unwrap();
    }
}
