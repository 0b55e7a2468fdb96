//! Wire formats of the labeling backend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{DocumentRef, Label};

/// Element as returned by the backend, labels keyed by category id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementPayload {
    pub id: String,
    pub docid: String,
    #[serde(default)]
    pub begin: u64,
    #[serde(default)]
    pub end: u64,
    pub text: String,
    #[serde(default)]
    pub user_labels: HashMap<String, String>,
    #[serde(default)]
    pub model_predictions: HashMap<String, RawPrediction>,
}

/// Prediction entry: either a bare `"true"`/`"false"` flag or a scored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrediction {
    Flag(String),
    Scored { label: bool, score: f64 },
}

#[derive(Debug, Deserialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentRef>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentResponse {
    pub document_id: String,
    #[serde(default)]
    pub elements: Vec<ElementPayload>,
}

#[derive(Debug, Deserialize)]
pub struct PositiveElementsResponse {
    #[serde(default)]
    pub positive_elements: Vec<ElementPayload>,
}

/// Body of `PUT /workspace/{ws}/element/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct SetLabelRequest<'a> {
    pub category_id: &'a str,
    pub value: Label,
    pub update_counter: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetLabelResponse {
    pub element: ElementPayload,
}

/// Summary returned after importing a label file.
///
/// Only `total` is interpreted; every other field the backend reports is kept
/// verbatim for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}
