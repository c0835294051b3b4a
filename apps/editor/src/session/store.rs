//! Persistence seam. The editor only needs "load document" and "save document"; the
//! in-memory store backs the service until a real backend is plugged in.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::document::ResumeDocument;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("document could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    pub id: Uuid,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<ResumeDocument, StoreError>;
    async fn save(&self, id: Uuid, document: &ResumeDocument) -> Result<SavedDocument, StoreError>;
}

struct StoredRecord {
    body: serde_json::Value,
    meta: SavedDocument,
}

/// Keeps documents as JSON so a save/load cycle goes through the same encoding a
/// remote store would.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Uuid, StoredRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn load(&self, id: Uuid) -> Result<ResumeDocument, StoreError> {
        let records = self.records.read().await;
        let record = records.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(serde_json::from_value(record.body.clone())?)
    }

    async fn save(&self, id: Uuid, document: &ResumeDocument) -> Result<SavedDocument, StoreError> {
        let body = serde_json::to_value(document)?;
        let mut records = self.records.write().await;
        let version = records.get(&id).map(|r| r.meta.version + 1).unwrap_or(1);
        let meta = SavedDocument {
            id,
            version,
            saved_at: Utc::now(),
        };
        records.insert(
            id,
            StoredRecord {
                body,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }
}
