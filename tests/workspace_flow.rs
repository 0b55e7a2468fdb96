//! Workspace controller tests against an in-process backend.
//!
//! The fake backend can hold individual requests open, which lets the tests
//! decide in which order responses arrive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use labelsleuth::api::types::{DocumentResponse, ElementPayload, UploadSummary};
use labelsleuth::models::{DocumentRef, LabelCount};
use labelsleuth::navigation::{Direction, NavigationOutcome};
use labelsleuth::workspace::LabelOutcome;
use labelsleuth::{ApiError, AppState, Label, LabelingBackend, Workspace};

const CATEGORY: &str = "cat";

// ============================================================================
// Fake backend
// ============================================================================

#[derive(Default)]
struct FakeBackend {
    documents: Vec<String>,
    elements: HashMap<String, Vec<ElementPayload>>,
    positives: Vec<ElementPayload>,
    fetches: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_label: AtomicBool,
    fetch_gate: Mutex<Option<oneshot::Receiver<()>>>,
    fetch_started: Mutex<Option<mpsc::UnboundedSender<String>>>,
    label_gates: Mutex<HashMap<u64, oneshot::Receiver<()>>>,
    label_started: Mutex<Option<mpsc::UnboundedSender<u64>>>,
}

fn payload(id: &str, doc: &str, label: Label) -> ElementPayload {
    let mut user_labels = HashMap::new();
    match label {
        Label::Pos => {
            user_labels.insert(CATEGORY.to_string(), "true".to_string());
        }
        Label::Neg => {
            user_labels.insert(CATEGORY.to_string(), "false".to_string());
        }
        Label::None => {}
    }
    ElementPayload {
        id: id.to_string(),
        docid: doc.to_string(),
        begin: 0,
        end: 10,
        text: format!("text of {id}"),
        user_labels,
        model_predictions: HashMap::new(),
    }
}

impl FakeBackend {
    /// Three documents: `doc-0` with e1..e3 (e3 positive), `doc-1` with e7 and
    /// e9 (e9 positive), `doc-2` empty.
    fn new() -> Self {
        let mut elements = HashMap::new();
        elements.insert(
            "doc-0".to_string(),
            vec![
                payload("e1", "doc-0", Label::None),
                payload("e2", "doc-0", Label::Neg),
                payload("e3", "doc-0", Label::Pos),
            ],
        );
        elements.insert(
            "doc-1".to_string(),
            vec![
                payload("e7", "doc-1", Label::None),
                payload("e9", "doc-1", Label::Pos),
            ],
        );
        elements.insert("doc-2".to_string(), Vec::new());

        Self {
            documents: vec!["doc-0".into(), "doc-1".into(), "doc-2".into()],
            positives: vec![
                payload("e3", "doc-0", Label::Pos),
                payload("e9", "doc-1", Label::Pos),
            ],
            elements,
            ..Default::default()
        }
    }

    /// Hold the next document fetch until the returned sender fires.
    fn gate_fetch(&self) -> (oneshot::Sender<()>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = oneshot::channel();
        *self.fetch_gate.lock().unwrap() = Some(rx);
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        *self.fetch_started.lock().unwrap() = Some(started_tx);
        (tx, started_rx)
    }

    /// Hold the label requests issued with `counters`.
    fn gate_labels(
        &self,
        counters: &[u64],
    ) -> (Vec<oneshot::Sender<()>>, mpsc::UnboundedReceiver<u64>) {
        let mut gates = self.label_gates.lock().unwrap();
        let senders = counters
            .iter()
            .map(|counter| {
                let (tx, rx) = oneshot::channel();
                gates.insert(*counter, rx);
                tx
            })
            .collect();
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        *self.label_started.lock().unwrap() = Some(started_tx);
        (senders, started_rx)
    }
}

#[async_trait]
impl LabelingBackend for FakeBackend {
    async fn list_documents(&self) -> Result<Vec<DocumentRef>, ApiError> {
        Ok(self
            .documents
            .iter()
            .map(|id| DocumentRef {
                document_id: id.clone(),
            })
            .collect())
    }

    async fn fetch_document(
        &self,
        document_id: &str,
        _category: &str,
    ) -> Result<DocumentResponse, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(started) = self.fetch_started.lock().unwrap().as_ref() {
            let _ = started.send(document_id.to_string());
        }
        let gate = self.fetch_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ApiError::Connection("connection refused".to_string()));
        }
        Ok(DocumentResponse {
            document_id: document_id.to_string(),
            elements: self.elements.get(document_id).cloned().unwrap_or_default(),
        })
    }

    async fn positive_elements(&self, _category: &str) -> Result<Vec<ElementPayload>, ApiError> {
        Ok(self.positives.clone())
    }

    async fn set_element_label(
        &self,
        element_id: &str,
        _category: &str,
        label: Label,
        update_counter: u64,
    ) -> Result<ElementPayload, ApiError> {
        if let Some(started) = self.label_started.lock().unwrap().as_ref() {
            let _ = started.send(update_counter);
        }
        let gate = self.label_gates.lock().unwrap().remove(&update_counter);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_label.load(Ordering::SeqCst) {
            return Err(ApiError::Connection("connection reset".to_string()));
        }
        let doc = self
            .elements
            .iter()
            .find(|(_, elements)| elements.iter().any(|e| e.id == element_id))
            .map(|(doc, _)| doc.clone())
            .unwrap_or_else(|| "doc-9".to_string());
        Ok(payload(element_id, &doc, label))
    }

    async fn download_labels(&self) -> Result<Vec<u8>, ApiError> {
        Ok(b"workspace_id,category_name,document_id,element_text,label\n".to_vec())
    }

    async fn upload_labels(
        &self,
        _file_name: &str,
        contents: Vec<u8>,
    ) -> Result<UploadSummary, ApiError> {
        let lines = String::from_utf8_lossy(&contents).lines().count() as u64;
        Ok(UploadSummary {
            total: Some(lines.saturating_sub(1)),
            ..Default::default()
        })
    }

    async fn labeled_info_gain(&self, _category: &str) -> Result<serde_json::Value, ApiError> {
        Ok(serde_json::json!([{"text": "refund", "weight": 0.42}]))
    }
}

async fn open_workspace(backend: FakeBackend, doc: usize) -> Workspace<FakeBackend> {
    let state = AppState::new("ws", Some(CATEGORY.to_string()), 2).unwrap();
    let workspace = Workspace::new(backend, state, "Label_Sleuth");
    workspace.load_documents().await.unwrap();
    workspace.refresh_positive_elements().await.unwrap();
    assert_eq!(
        workspace.open_document(doc).await.unwrap(),
        NavigationOutcome::Moved(doc)
    );
    workspace
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_next_loads_document_and_recounts() {
    let workspace = open_workspace(FakeBackend::new(), 0).await;
    {
        let state = workspace.state().await;
        assert_eq!(state.label_count.pos, 1);
        assert_eq!(state.label_count.neg, 1);
    }

    workspace.state().await.go_to_page(2);
    let outcome = workspace
        .fetch_adjacent_document(Direction::Next)
        .await
        .unwrap();
    assert_eq!(outcome, NavigationOutcome::Moved(1));

    let state = workspace.snapshot().await;
    assert_eq!(state.cur_doc_index, 1);
    assert_eq!(state.current_doc_name(), Some("doc-1"));
    assert_eq!(state.paginator.current_page(), 1);
    assert_eq!(state.label_count.pos, 1);
    assert_eq!(state.label_count.neg, 0);
}

#[tokio::test]
async fn test_prev_at_first_document_is_noop() {
    let backend = FakeBackend::new();
    let workspace = open_workspace(backend, 0).await;

    let outcome = workspace
        .fetch_adjacent_document(Direction::Prev)
        .await
        .unwrap();
    assert_eq!(outcome, NavigationOutcome::NoOp);
    assert_eq!(workspace.state().await.cur_doc_index, 0);
}

#[tokio::test]
async fn test_next_at_last_document_is_noop() {
    let workspace = open_workspace(FakeBackend::new(), 2).await;
    let outcome = workspace
        .fetch_adjacent_document(Direction::Next)
        .await
        .unwrap();
    assert_eq!(outcome, NavigationOutcome::NoOp);
    assert_eq!(workspace.state().await.cur_doc_index, 2);
}

#[tokio::test]
async fn test_open_document_out_of_range() {
    let workspace = open_workspace(FakeBackend::new(), 0).await;
    let err = workspace.open_document(3).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn test_navigation_while_pending_is_busy() {
    let workspace = open_workspace(FakeBackend::new(), 0).await;
    let (release, mut started) = workspace_backend(&workspace).gate_fetch();

    let pending = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.fetch_adjacent_document(Direction::Next).await })
    };
    assert_eq!(started.recv().await.as_deref(), Some("doc-1"));
    assert!(workspace.is_navigating());

    let second = workspace
        .fetch_adjacent_document(Direction::Next)
        .await
        .unwrap();
    assert_eq!(second, NavigationOutcome::Busy);

    release.send(()).unwrap();
    let first = pending.await.unwrap().unwrap();
    assert_eq!(first, NavigationOutcome::Moved(1));
    assert!(!workspace.is_navigating());

    // initial open + the one admitted request
    assert_eq!(workspace_backend(&workspace).fetches.load(Ordering::SeqCst), 2);
    assert_eq!(workspace.state().await.cur_doc_index, 1);
}

#[tokio::test]
async fn test_failed_fetch_leaves_state_unchanged() {
    let workspace = open_workspace(FakeBackend::new(), 0).await;
    workspace_backend(&workspace)
        .fail_fetch
        .store(true, Ordering::SeqCst);
    let before = workspace.snapshot().await;

    let err = workspace
        .fetch_adjacent_document(Direction::Next)
        .await
        .unwrap_err();
    assert!(err.is_transport());

    let after = workspace.snapshot().await;
    assert_eq!(after.cur_doc_index, before.cur_doc_index);
    assert_eq!(after.document, before.document);
    assert_eq!(after.label_count, before.label_count);
    assert!(after.error_message.is_some());
}

#[tokio::test]
async fn test_document_arriving_after_close_is_dropped() {
    let workspace = open_workspace(FakeBackend::new(), 0).await;
    let (release, mut started) = workspace_backend(&workspace).gate_fetch();

    let pending = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.fetch_adjacent_document(Direction::Next).await })
    };
    started.recv().await.unwrap();
    workspace.close_view().await;
    release.send(()).unwrap();

    assert_eq!(pending.await.unwrap().unwrap(), NavigationOutcome::Detached);
    let state = workspace.snapshot().await;
    assert_eq!(state.cur_doc_index, 0);
    assert_eq!(state.current_doc_name(), Some("doc-0"));
}

// ============================================================================
// Labeling
// ============================================================================

#[tokio::test]
async fn test_label_unset_to_pos() {
    let workspace = open_workspace(FakeBackend::new(), 1).await;

    let outcome = workspace.set_element_label("e7", Label::Pos).await.unwrap();
    assert!(matches!(outcome, LabelOutcome::Applied(d) if d.pos == 1 && d.neg == 0));

    let state = workspace.snapshot().await;
    assert_eq!(state.label_count.pos, 2);
    assert!(state.positive_labels.contains("e7"));
    assert_eq!(state.elements()[0].user_label, Label::Pos);
}

#[tokio::test]
async fn test_label_pos_to_neg_leaves_projection() {
    let workspace = open_workspace(FakeBackend::new(), 1).await;
    assert!(workspace.state().await.positive_labels.contains("e9"));

    workspace.set_element_label("e9", Label::Neg).await.unwrap();

    let state = workspace.snapshot().await;
    assert!(!state.positive_labels.contains("e9"));
    assert_eq!(state.label_count.pos, 0);
    assert_eq!(state.label_count.neg, 1);
}

#[tokio::test]
async fn test_label_in_other_document_only_updates_projection() {
    let workspace = open_workspace(FakeBackend::new(), 1).await;
    let before = workspace.state().await.label_count;

    let outcome = workspace.set_element_label("e1", Label::Pos).await.unwrap();
    assert_eq!(outcome, LabelOutcome::Applied(Default::default()));

    let state = workspace.snapshot().await;
    assert_eq!(state.label_count, before);
    assert!(state.positive_labels.contains("e1"));
}

#[tokio::test]
async fn test_label_in_other_document_updates_workspace_count() {
    let workspace = open_workspace(FakeBackend::new(), 1).await;
    assert_eq!(
        workspace.state().await.label_count_global,
        LabelCount { pos: 2, neg: 0 }
    );

    // e3 lives in doc-0 and is known positive from the listing
    let outcome = workspace.set_element_label("e3", Label::Neg).await.unwrap();
    assert_eq!(outcome, LabelOutcome::Applied(Default::default()));

    let state = workspace.snapshot().await;
    assert_eq!(state.label_count, LabelCount { pos: 1, neg: 0 });
    assert_eq!(state.label_count_global, LabelCount { pos: 1, neg: 1 });
    assert!(!state.positive_labels.contains("e3"));
}

#[tokio::test]
async fn test_workspace_count_survives_document_switch() {
    let workspace = open_workspace(FakeBackend::new(), 0).await;
    workspace.set_element_label("e1", Label::Pos).await.unwrap();
    assert_eq!(
        workspace.state().await.label_count_global,
        LabelCount { pos: 3, neg: 0 }
    );

    let outcome = workspace
        .fetch_adjacent_document(Direction::Next)
        .await
        .unwrap();
    assert_eq!(outcome, NavigationOutcome::Moved(1));

    let state = workspace.snapshot().await;
    assert_eq!(state.label_count, LabelCount { pos: 1, neg: 0 });
    assert_eq!(state.label_count_global, LabelCount { pos: 3, neg: 0 });

    // now in doc-1, relabel the doc-0 element confirmed earlier
    workspace.set_element_label("e1", Label::Neg).await.unwrap();
    let state = workspace.snapshot().await;
    assert_eq!(state.label_count, LabelCount { pos: 1, neg: 0 });
    assert_eq!(state.label_count_global, LabelCount { pos: 2, neg: 1 });
}

#[tokio::test]
async fn test_update_counters_pruned_after_response() {
    let workspace = open_workspace(FakeBackend::new(), 1).await;

    workspace.set_element_label("e7", Label::Pos).await.unwrap();
    assert_eq!(workspace.state().await.update_counters.pending(), 0);

    workspace_backend(&workspace)
        .fail_label
        .store(true, Ordering::SeqCst);
    let err = workspace
        .set_element_label("e9", Label::Neg)
        .await
        .unwrap_err();
    assert!(err.is_transport());

    let state = workspace.snapshot().await;
    assert_eq!(state.update_counters.pending(), 0);
    assert_eq!(state.update_counters.latest("e9"), None);
    assert!(state.error_message.is_some());
}

#[tokio::test]
async fn test_stale_label_response_is_discarded() {
    let workspace = open_workspace(FakeBackend::new(), 1).await;
    let (mut releases, mut started) = workspace_backend(&workspace).gate_labels(&[1, 2]);
    let release_second = releases.pop().unwrap();
    let release_first = releases.pop().unwrap();

    let first = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.set_element_label("e7", Label::Pos).await })
    };
    assert_eq!(started.recv().await, Some(1));

    let second = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.set_element_label("e7", Label::Neg).await })
    };
    assert_eq!(started.recv().await, Some(2));

    // newer response first, older one last
    release_second.send(()).unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(matches!(second, LabelOutcome::Applied(_)));

    release_first.send(()).unwrap();
    assert_eq!(first.await.unwrap().unwrap(), LabelOutcome::Stale);

    let state = workspace.snapshot().await;
    assert_eq!(state.elements()[0].user_label, Label::Neg);
    assert!(!state.positive_labels.contains("e7"));
    assert_eq!(state.label_count.pos, 1);
    assert_eq!(state.label_count.neg, 1);
    assert_eq!(state.update_counters.pending(), 0);
}

#[tokio::test]
async fn test_label_after_close_is_detached() {
    let workspace = open_workspace(FakeBackend::new(), 1).await;
    let (mut releases, mut started) = workspace_backend(&workspace).gate_labels(&[1]);

    let pending = {
        let workspace = workspace.clone();
        tokio::spawn(async move { workspace.set_element_label("e7", Label::Pos).await })
    };
    started.recv().await.unwrap();
    workspace.close_view().await;
    releases.pop().unwrap().send(()).unwrap();

    assert_eq!(pending.await.unwrap().unwrap(), LabelOutcome::Detached);
    assert!(!workspace.state().await.positive_labels.contains("e7"));
}

#[tokio::test]
async fn test_label_requires_category() {
    let state = AppState::new("ws", None, 10).unwrap();
    let workspace = Workspace::new(FakeBackend::new(), state, "Label_Sleuth");
    let err = workspace
        .set_element_label("e1", Label::Pos)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

// ============================================================================
// Export / import / info gain
// ============================================================================

#[tokio::test]
async fn test_download_writes_payload() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = open_workspace(FakeBackend::new(), 0).await;

    let path = workspace
        .download_labels(dir.path())
        .await
        .unwrap()
        .expect("view still open");

    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("labeleddata_from_Label_Sleuth_"));
    assert!(name.ends_with(".csv"));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "workspace_id,category_name,document_id,element_text,label\n"
    );
    assert!(!workspace.state().await.downloading_labels);
}

#[tokio::test]
async fn test_upload_stores_summary() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("labels.csv");
    std::fs::write(&file, "header\na\nb\n").unwrap();
    let workspace = open_workspace(FakeBackend::new(), 0).await;

    let summary = workspace.upload_labels(&file).await.unwrap().unwrap();
    assert_eq!(summary.total, Some(2));

    let mut state = workspace.state().await;
    assert!(!state.uploading_labels);
    assert_eq!(state.uploaded_labels.as_ref().unwrap().total, Some(2));
    state.clean_uploaded_labels();
    assert!(state.uploaded_labels.is_none());
}

#[tokio::test]
async fn test_upload_missing_file_records_error() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = open_workspace(FakeBackend::new(), 0).await;

    let err = workspace
        .upload_labels(&dir.path().join("missing.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Io(_)));

    let state = workspace.snapshot().await;
    assert!(!state.uploading_labels);
    assert!(state.error_message.is_some());
}

#[tokio::test]
async fn test_info_gain_stored() {
    let workspace = open_workspace(FakeBackend::new(), 0).await;
    let value = workspace.label_info_gain().await.unwrap().unwrap();
    assert_eq!(value[0]["text"], "refund");
    assert_eq!(workspace.state().await.info_gain, Some(value));
}

fn workspace_backend(workspace: &Workspace<FakeBackend>) -> &FakeBackend {
    workspace.backend()
}
