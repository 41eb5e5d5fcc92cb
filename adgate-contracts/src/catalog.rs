use adgate_model::{AdRecord, ContentSelection};
use async_trait::async_trait;

/// Ad store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("ad store unavailable: {0}")]
    Unavailable(String),
}

/// Read port over the content-ad association store.
///
/// Returns raw records in store order; validation happens in the gate.
#[async_trait]
pub trait AdCatalog: Send + Sync {
    async fn ads_for(
        &self,
        content: &ContentSelection,
    ) -> Result<Vec<AdRecord>, CatalogError>;
}
