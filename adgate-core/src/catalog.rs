use std::collections::HashMap;

use adgate_contracts::prelude::{AdCatalog, CatalogError};
use adgate_model::{AdRecord, ContentId, ContentSelection};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Serialized form of an [`InMemoryAdCatalog`].
///
/// ```json
/// {
///   "global": [{ "id": "promo", "url": "https://promo.example" }],
///   "content": { "ep-7": [{ "id": "a", "url": "https://a.example", "occurrences": 2 }] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDocument {
    /// Served for any content without its own entry
    pub global: Vec<AdRecord>,
    pub content: HashMap<ContentId, Vec<AdRecord>>,
}

/// Content-ad association store held in memory.
///
/// Content with its own ad list gets exactly that list (possibly empty);
/// everything else falls back to the global list.
#[derive(Debug, Default)]
pub struct InMemoryAdCatalog {
    document: RwLock<CatalogDocument>,
}

impl InMemoryAdCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: CatalogDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document))
    }

    pub fn with_global_ads(self, records: Vec<AdRecord>) -> Self {
        self.document.write().global = records;
        self
    }

    pub fn with_ads(self, content: ContentId, records: Vec<AdRecord>) -> Self {
        self.set_ads(content, records);
        self
    }

    /// Replaces the ad list of one content item. Selections already applied
    /// keep the queue they were built with.
    pub fn set_ads(&self, content: ContentId, records: Vec<AdRecord>) {
        self.document.write().content.insert(content, records);
    }

    pub fn snapshot(&self) -> CatalogDocument {
        self.document.read().clone()
    }
}

#[async_trait]
impl AdCatalog for InMemoryAdCatalog {
    async fn ads_for(
        &self,
        content: &ContentSelection,
    ) -> std::result::Result<Vec<AdRecord>, CatalogError> {
        let document = self.document.read();
        let records = document
            .content
            .get(&content.id)
            .unwrap_or(&document.global)
            .clone();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn content_entry_wins_over_global_list() {
        let catalog = InMemoryAdCatalog::new()
            .with_global_ads(vec![AdRecord::new("promo", "https://promo.example")])
            .with_ads(ContentId::new("ep-1"), vec![AdRecord::new("a", "https://a.example")])
            .with_ads(ContentId::new("ep-free"), Vec::new());

        let ep1 = catalog.ads_for(&ContentSelection::episode("ep-1")).await.unwrap();
        let free = catalog.ads_for(&ContentSelection::episode("ep-free")).await.unwrap();
        let other = catalog.ads_for(&ContentSelection::movie("m-9")).await.unwrap();

        assert_eq!(ep1[0].id, "a");
        assert!(free.is_empty());
        assert_eq!(other[0].id, "promo");
    }

    #[tokio::test]
    async fn loads_json_documents_with_missing_fields() {
        let catalog = InMemoryAdCatalog::from_json_str(
            r#"{ "content": { "ep-7": [
                { "id": "a", "url": "https://a.example", "occurrences": 2 },
                { "id": "b", "url": "https://b.example" }
            ] } }"#,
        )
        .unwrap();

        let records = catalog.ads_for(&ContentSelection::episode("ep-7")).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].occurrences, Some(2));
        assert_eq!(records[1].occurrences, None);
        assert!(catalog.snapshot().global.is_empty());
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = InMemoryAdCatalog::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, crate::error::GateError::Serialization(_)));
    }
}
