//! Application state of the labeling front-end.
//!
//! [`AppState`] is the single store every view renders from. It is only
//! changed through the update functions below; each one either applies a
//! server-confirmed result or flips a request flag, never both halves of an
//! optimistic guess.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::api::types::UploadSummary;
use crate::models::{
    Document, DocumentRef, Element, Label, LabelCount, LabelDelta, ValidationError,
};
use crate::pagination::{PageView, Paginator};
use crate::sync::{apply_confirmed_label, LabelCounters, PositiveLabels, UpdateCounters};

/// Everything the views need, owned by the top-level process.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub workspace_id: String,
    pub category: Option<String>,
    pub documents: Vec<DocumentRef>,
    pub cur_doc_index: usize,
    pub document: Option<Document>,
    pub label_count: LabelCount,
    /// Workspace-wide counters; not reset by a document switch.
    pub label_count_global: LabelCount,
    /// Last confirmed label of every element seen this session.
    pub confirmed_labels: HashMap<String, Label>,
    pub positive_labels: PositiveLabels,
    pub paginator: Paginator,
    pub update_counters: UpdateCounters,
    pub downloading_labels: bool,
    pub uploading_labels: bool,
    pub uploaded_labels: Option<UploadSummary>,
    pub info_gain: Option<serde_json::Value>,
    pub error_message: Option<String>,
    /// Advanced when the view is closed; results dispatched under an older
    /// epoch are dropped.
    pub view_epoch: u64,
}

impl AppState {
    pub fn new(
        workspace_id: &str,
        category: Option<String>,
        page_size: usize,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            workspace_id: workspace_id.to_string(),
            category,
            paginator: Paginator::new(page_size)?,
            ..Default::default()
        })
    }

    pub fn category(&self) -> Result<&str, ValidationError> {
        self.category.as_deref().ok_or(ValidationError::MissingCategory)
    }

    /// Name of the current document, if one is loaded.
    pub fn current_doc_name(&self) -> Option<&str> {
        self.document.as_ref().map(Document::name)
    }

    pub fn elements(&self) -> &[Element] {
        self.document
            .as_ref()
            .map(|d| d.elements.as_slice())
            .unwrap_or(&[])
    }

    /// The visible page of the current document.
    pub fn current_page(&self) -> PageView<'_, Element> {
        self.paginator.view(self.elements())
    }

    pub fn set_documents(&mut self, documents: Vec<DocumentRef>) {
        self.documents = documents;
        if self.cur_doc_index >= self.documents.len() {
            self.cur_doc_index = 0;
        }
    }

    /// Install a freshly fetched document as current.
    ///
    /// This is a document switch: elements are replaced wholesale, label
    /// counters are recounted from the payload and paging restarts.
    pub fn replace_document(&mut self, index: usize, document: Document) {
        self.label_count = LabelCount::from_elements(&document.elements);
        debug!(
            "Switched to document {} ({} elements, {} pos, {} neg)",
            document.id,
            document.elements.len(),
            self.label_count.pos,
            self.label_count.neg
        );
        self.cur_doc_index = index;
        self.document = Some(document);
        self.paginator.reset();
    }

    /// Replace the positive-labels projection from a server listing.
    ///
    /// The listing is the authoritative workspace positive total; the
    /// negative total only covers labels confirmed this session.
    pub fn set_positive_elements(&mut self, elements: Vec<Element>) {
        self.positive_labels.replace(elements);
        self.label_count_global.pos = self.positive_labels.len() as u64;
    }

    pub fn set_label_count_global(&mut self, count: LabelCount) {
        self.label_count_global = count;
    }

    /// Apply a server-confirmed element state.
    ///
    /// Returns the delta applied to the current document's counters; the
    /// workspace counters move even when the element is in another document.
    pub fn apply_label_update(&mut self, confirmed: &Element) -> LabelDelta {
        apply_confirmed_label(
            self.document.as_mut(),
            &mut self.positive_labels,
            &mut self.confirmed_labels,
            LabelCounters {
                document: &mut self.label_count,
                global: &mut self.label_count_global,
            },
            confirmed,
        )
    }

    /// Apply a signed delta to the current document counters.
    pub fn update_label_count_by_diff(&mut self, delta: LabelDelta) {
        self.label_count.apply(delta);
    }

    pub fn go_to_page(&mut self, requested: i64) -> usize {
        let len = self.elements().len();
        self.paginator.go_to(requested, len)
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), ValidationError> {
        self.paginator.set_page_size(page_size)
    }

    /// Jump to the page showing `element_id`; `None` if it is not in the
    /// current document.
    pub fn reveal_element(&mut self, element_id: &str) -> Option<usize> {
        let index = self.document.as_ref()?.position_of(element_id)?;
        let len = self.elements().len();
        Some(self.paginator.reveal(index, len))
    }

    pub fn begin_download(&mut self) {
        self.downloading_labels = true;
    }

    pub fn finish_download(&mut self) {
        self.downloading_labels = false;
    }

    pub fn begin_upload(&mut self) {
        self.uploading_labels = true;
    }

    pub fn finish_upload(&mut self, summary: UploadSummary) {
        self.uploaded_labels = Some(summary);
        self.uploading_labels = false;
    }

    /// Upload failed: clear the flag but keep the previous summary.
    pub fn fail_upload(&mut self, message: String) {
        self.uploading_labels = false;
        self.record_error(message);
    }

    pub fn clean_uploaded_labels(&mut self) {
        self.uploaded_labels = None;
    }

    pub fn set_info_gain(&mut self, info_gain: serde_json::Value) {
        self.info_gain = Some(info_gain);
    }

    pub fn record_error(&mut self, message: String) {
        warn!("{}", message);
        self.error_message = Some(message);
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// Close the current view; in-flight results will not be applied.
    pub fn close_view(&mut self) {
        self.view_epoch += 1;
        self.downloading_labels = false;
        self.uploading_labels = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, label: Label) -> Element {
        Element {
            id: id.to_string(),
            doc_id: "doc".to_string(),
            begin: 0,
            end: 0,
            text: String::new(),
            user_label: label,
            prediction: None,
        }
    }

    fn document(n: usize) -> Document {
        Document {
            id: "doc".to_string(),
            elements: (1..=n)
                .map(|i| {
                    let label = if i % 3 == 0 { Label::Pos } else { Label::None };
                    element(&format!("e{i}"), label)
                })
                .collect(),
        }
    }

    #[test]
    fn test_new_rejects_zero_page_size() {
        assert_eq!(
            AppState::new("ws", None, 0).unwrap_err(),
            ValidationError::InvalidPageSize(0)
        );
    }

    #[test]
    fn test_replace_document_recounts_and_resets_page() {
        let mut state = AppState::new("ws", Some("cat".to_string()), 10).unwrap();
        state.replace_document(0, document(30));
        state.go_to_page(3);
        state.label_count.neg = 99;

        state.replace_document(1, document(12));
        assert_eq!(state.cur_doc_index, 1);
        assert_eq!(state.paginator.current_page(), 1);
        assert_eq!(state.label_count.pos, 4);
        assert_eq!(state.label_count.neg, 0);
    }

    #[test]
    fn test_current_page_without_document() {
        let state = AppState::new("ws", None, 10).unwrap();
        let page = state.current_page();
        assert!(page.visible.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_reveal_element() {
        let mut state = AppState::new("ws", None, 200).unwrap();
        state.replace_document(0, document(250));
        assert_eq!(state.reveal_element("e230"), Some(2));
        assert_eq!(state.current_page().visible[0].id, "e201");
        assert_eq!(state.reveal_element("missing"), None);
    }

    #[test]
    fn test_upload_failure_keeps_summary() {
        let mut state = AppState::default();
        let summary = UploadSummary {
            total: Some(3),
            ..Default::default()
        };
        state.begin_upload();
        state.finish_upload(summary.clone());

        state.begin_upload();
        state.fail_upload("boom".to_string());
        assert!(!state.uploading_labels);
        assert_eq!(state.error_message.as_deref(), Some("boom"));
        assert_eq!(state.uploaded_labels, Some(summary));

        state.clean_uploaded_labels();
        assert!(state.uploaded_labels.is_none());
    }

    #[test]
    fn test_label_count_by_diff() {
        let mut state = AppState::new("ws", Some("cat".to_string()), 10).unwrap();
        state.replace_document(0, document(6));
        assert_eq!(state.label_count.pos, 2);

        state.update_label_count_by_diff(LabelDelta::between(Label::Pos, Label::Neg));
        assert_eq!(state.label_count.pos, 1);
        assert_eq!(state.label_count.neg, 1);

        state.update_label_count_by_diff(LabelDelta::ZERO);
        assert_eq!(state.label_count.neg, 1);
    }

    #[test]
    fn test_apply_label_update_through_state() {
        let mut state = AppState::new("ws", Some("cat".to_string()), 10).unwrap();
        state.replace_document(0, document(3));
        let delta = state.apply_label_update(&element("e3", Label::Neg));
        assert_eq!(delta, LabelDelta { pos: -1, neg: 1 });
        assert!(!state.positive_labels.contains("e3"));
    }

    #[test]
    fn test_global_count_survives_document_switch() {
        let mut state = AppState::new("ws", Some("cat".to_string()), 10).unwrap();
        state.set_positive_elements(vec![element("e3", Label::Pos)]);
        assert_eq!(state.label_count_global.pos, 1);

        state.replace_document(0, document(3));
        state.apply_label_update(&element("e1", Label::Neg));
        assert_eq!(state.label_count_global, LabelCount { pos: 1, neg: 1 });

        let mut other = document(2);
        other.id = "doc-2".to_string();
        state.replace_document(1, other);
        assert_eq!(state.label_count, LabelCount::default());
        assert_eq!(state.label_count_global, LabelCount { pos: 1, neg: 1 });

        // e3 now lives outside the current document
        let delta = state.apply_label_update(&element("e3", Label::Neg));
        assert!(delta.is_zero());
        assert_eq!(state.label_count, LabelCount::default());
        assert_eq!(state.label_count_global, LabelCount { pos: 0, neg: 2 });
    }

    #[test]
    fn test_set_label_count_global() {
        let mut state = AppState::default();
        state.set_label_count_global(LabelCount { pos: 7, neg: 2 });
        state.replace_document(0, document(3));
        assert_eq!(state.label_count_global, LabelCount { pos: 7, neg: 2 });
    }

    #[test]
    fn test_missing_category() {
        let state = AppState::default();
        assert_eq!(state.category(), Err(ValidationError::MissingCategory));
    }
}
