//! Labeling backend access.
//!
//! [`LabelingBackend`] is the seam between the workspace controller and the
//! REST API; [`ApiClient`] is the HTTP implementation.

mod client;
mod error;
pub mod types;

pub use client::{ApiClient, CATEGORY_PARAM, DOWNLOAD_LABELS_API, INFO_GAIN_API, UPLOAD_LABELS_API};
pub use error::ApiError;

use async_trait::async_trait;

use crate::models::{DocumentRef, Label};
use types::{DocumentResponse, ElementPayload, UploadSummary};

/// Operations the front-end needs from the labeling service.
#[async_trait]
pub trait LabelingBackend: Send + Sync {
    /// List the documents of the workspace in display order.
    async fn list_documents(&self) -> Result<Vec<DocumentRef>, ApiError>;

    /// Fetch a document's elements with labels for `category`.
    async fn fetch_document(
        &self,
        document_id: &str,
        category: &str,
    ) -> Result<DocumentResponse, ApiError>;

    /// All elements labeled positive for `category`, across documents.
    async fn positive_elements(&self, category: &str) -> Result<Vec<ElementPayload>, ApiError>;

    /// Assign a label; returns the backend's authoritative element state.
    async fn set_element_label(
        &self,
        element_id: &str,
        category: &str,
        label: Label,
        update_counter: u64,
    ) -> Result<ElementPayload, ApiError>;

    /// Full label set as CSV, byte for byte as served.
    async fn download_labels(&self) -> Result<Vec<u8>, ApiError>;

    /// Import a label file.
    async fn upload_labels(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<UploadSummary, ApiError>;

    /// Information gain data for `category`.
    async fn labeled_info_gain(&self, category: &str) -> Result<serde_json::Value, ApiError>;
}
