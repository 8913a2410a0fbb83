use async_trait::async_trait;

use crate::document::Document;
use crate::error::StoreError;

/// Storage backend holding one serialized `Document`.
///
/// Implementations must make `save_document` atomic with respect to readers:
/// a concurrent or later `load_document` observes either the previous
/// committed document or the new one, never a partial write.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Returns the backend identifier (e.g., "local").
    fn backend_name(&self) -> &'static str;

    /// Load the current document.
    ///
    /// A backend with nothing stored yet returns `Document::default()`.
    /// Any other failure is `StoreError::ReadFailed`.
    async fn load_document(&self) -> Result<Document, StoreError>;

    /// Durably replace the stored document.
    ///
    /// On failure the previously committed document is left untouched and
    /// `StoreError::WriteFailed` is returned.
    async fn save_document(&self, document: &Document) -> Result<(), StoreError>;
}
