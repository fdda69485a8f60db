//! Uniform backend capability surface.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Marking;

/// One storage backend the sync chain can try.
///
/// The orchestrator selects adapters strictly by chain order and knows
/// nothing else about them.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Short stable name used in logs and notifications.
    fn name(&self) -> &'static str;

    /// Fetch the backend's full marking collection.
    async fn load(&self) -> Result<Vec<Marking>>;

    /// Push a merged collection back to the backend.
    async fn save(&self, markings: &[Marking]) -> Result<()>;

    /// Remove one marking by id.
    async fn delete(&self, id: &str) -> Result<()>;
}
