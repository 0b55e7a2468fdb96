//! Workspace controller: dispatches backend requests and applies their
//! confirmed results to the shared [`AppState`].
//!
//! The state lock is never held across a request. Each operation captures
//! what it needs (category, update counter, view epoch), releases the lock,
//! awaits the backend and then re-acquires the lock to apply the response, so
//! results land in the order responses arrive.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::api::types::UploadSummary;
use crate::api::{ApiClient, ApiError, LabelingBackend};
use crate::config::Settings;
use crate::models::{parse_elements, Document, Element, Label, LabelDelta, ValidationError};
use crate::navigation::{adjacent_index, Direction, NavigationGate, NavigationOutcome};
use crate::state::AppState;

/// Result of a label assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    /// The confirmed label was applied; counters moved by this delta.
    Applied(LabelDelta),
    /// A newer request for the same element was issued meanwhile.
    Stale,
    /// The view was closed before the response arrived.
    Detached,
}

/// File name the label export is offered under, e.g.
/// `labeleddata_from_Label_Sleuth_19/10/2026.csv`.
pub fn export_file_name(product: &str, date: NaiveDate) -> String {
    format!("labeleddata_from_{}_{}.csv", product, date.format("%d/%m/%Y"))
}

/// [`export_file_name`] made safe as a single path component.
pub fn export_disk_name(product: &str, date: NaiveDate) -> String {
    export_file_name(product, date).replace(['/', '\\'], "-")
}

/// Handle to one labeling workspace. Clones share the same state.
pub struct Workspace<B> {
    backend: Arc<B>,
    state: Arc<Mutex<AppState>>,
    navigation: NavigationGate,
    product_name: String,
}

impl<B> Clone for Workspace<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            state: self.state.clone(),
            navigation: self.navigation.clone(),
            product_name: self.product_name.clone(),
        }
    }
}

impl Workspace<ApiClient> {
    /// Connect to the backend described by `settings`.
    pub fn connect(settings: &Settings) -> Result<Self, ApiError> {
        let client = ApiClient::new(settings)?;
        let state = AppState::new(
            &settings.workspace_id,
            settings.category.clone(),
            settings.elements_per_page,
        )?;
        Ok(Self::new(client, state, &settings.product_name))
    }
}

impl<B: LabelingBackend> Workspace<B> {
    pub fn new(backend: B, state: AppState, product_name: &str) -> Self {
        Self {
            backend: Arc::new(backend),
            state: Arc::new(Mutex::new(state)),
            navigation: NavigationGate::new(),
            product_name: product_name.to_string(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Lock the state for reading or for a synchronous update.
    pub async fn state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().await
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> AppState {
        self.state.lock().await.clone()
    }

    pub fn is_navigating(&self) -> bool {
        self.navigation.is_busy()
    }

    /// Close the view; results of requests still in flight are dropped.
    pub async fn close_view(&self) {
        self.state.lock().await.close_view();
    }

    /// Record `err` unless the view was closed since `epoch`, then return it.
    async fn fail<T>(&self, epoch: u64, err: ApiError) -> Result<T, ApiError> {
        let mut state = self.state.lock().await;
        if state.view_epoch == epoch {
            state.record_error(err.user_message());
        }
        Err(err)
    }

    async fn category_and_epoch(&self) -> Result<(String, u64), ApiError> {
        let state = self.state.lock().await;
        let category = state.category()?.to_string();
        Ok((category, state.view_epoch))
    }

    /// Fetch the workspace's document list.
    pub async fn load_documents(&self) -> Result<usize, ApiError> {
        let epoch = self.state.lock().await.view_epoch;
        let documents = match self.backend.list_documents().await {
            Ok(documents) => documents,
            Err(err) => return self.fail(epoch, err).await,
        };

        let mut state = self.state.lock().await;
        if state.view_epoch != epoch {
            return Ok(0);
        }
        let count = documents.len();
        state.set_documents(documents);
        info!("Workspace {} has {} documents", state.workspace_id, count);
        Ok(count)
    }

    /// Load the document at `index` directly.
    pub async fn open_document(&self, index: usize) -> Result<NavigationOutcome, ApiError> {
        let Some(_permit) = self.navigation.try_enter() else {
            debug!("Navigation already in progress, dropping open of {}", index);
            return Ok(NavigationOutcome::Busy);
        };
        self.load_document_at(index).await
    }

    /// Step to the previous or next document.
    ///
    /// Only one navigation request runs at a time; a request issued while
    /// another is pending returns [`NavigationOutcome::Busy`] without fetching.
    pub async fn fetch_adjacent_document(
        &self,
        direction: Direction,
    ) -> Result<NavigationOutcome, ApiError> {
        let Some(_permit) = self.navigation.try_enter() else {
            debug!("Navigation already in progress, dropping {:?}", direction);
            return Ok(NavigationOutcome::Busy);
        };

        let target = {
            let state = self.state.lock().await;
            adjacent_index(direction, state.cur_doc_index, state.documents.len())
        };
        match target {
            Some(index) => self.load_document_at(index).await,
            None => Ok(NavigationOutcome::NoOp),
        }
    }

    /// Fetch and install a document. Caller holds the navigation permit.
    async fn load_document_at(&self, index: usize) -> Result<NavigationOutcome, ApiError> {
        let (document_id, category, epoch) = {
            let state = self.state.lock().await;
            let category = state.category()?.to_string();
            let document_id = match state.documents.get(index) {
                Some(doc) => doc.document_id.clone(),
                None => {
                    let count = state.documents.len();
                    return Err(ValidationError::NoSuchDocument { index, count }.into());
                }
            };
            (document_id, category, state.view_epoch)
        };

        debug!("Fetching document {} ({})", index, document_id);
        let response = match self.backend.fetch_document(&document_id, &category).await {
            Ok(response) => response,
            Err(err) => return self.fail(epoch, err).await,
        };
        let elements = match parse_elements(response.elements, &category) {
            Ok(elements) => elements,
            Err(err) => return self.fail(epoch, err.into()).await,
        };

        let mut state = self.state.lock().await;
        if state.view_epoch != epoch {
            return Ok(NavigationOutcome::Detached);
        }
        state.replace_document(
            index,
            Document {
                id: response.document_id,
                elements,
            },
        );
        Ok(NavigationOutcome::Moved(index))
    }

    /// Reload the positive-labels projection from the backend.
    pub async fn refresh_positive_elements(&self) -> Result<usize, ApiError> {
        let (category, epoch) = self.category_and_epoch().await?;
        let payloads = match self.backend.positive_elements(&category).await {
            Ok(payloads) => payloads,
            Err(err) => return self.fail(epoch, err).await,
        };
        let elements = match parse_elements(payloads, &category) {
            Ok(elements) => elements,
            Err(err) => return self.fail(epoch, err.into()).await,
        };

        let mut state = self.state.lock().await;
        if state.view_epoch != epoch {
            return Ok(0);
        }
        state.set_positive_elements(elements);
        Ok(state.positive_labels.len())
    }

    /// Assign `label` to an element and apply the confirmed result.
    pub async fn set_element_label(
        &self,
        element_id: &str,
        label: Label,
    ) -> Result<LabelOutcome, ApiError> {
        let (category, counter, epoch) = {
            let mut state = self.state.lock().await;
            let category = state.category()?.to_string();
            let counter = state.update_counters.issue(element_id);
            (category, counter, state.view_epoch)
        };

        debug!(
            "Setting {} to {} (update_counter {})",
            element_id, label, counter
        );
        let result = self
            .backend
            .set_element_label(element_id, &category, label, counter)
            .await;

        let mut state = self.state.lock().await;
        if state.view_epoch != epoch {
            state.update_counters.settle(element_id, counter);
            return Ok(LabelOutcome::Detached);
        }
        if !state.update_counters.settle(element_id, counter) {
            debug!(
                "Discarding stale response for {} (update_counter {}, latest {:?})",
                element_id,
                counter,
                state.update_counters.latest(element_id)
            );
            return Ok(LabelOutcome::Stale);
        }

        let element = match result
            .and_then(|payload| Element::from_payload(payload, &category).map_err(Into::into))
        {
            Ok(element) => element,
            Err(err) => {
                state.record_error(err.user_message());
                return Err(err);
            }
        };

        let delta = state.apply_label_update(&element);
        info!("Labeled {} as {}", element.id, element.user_label);
        Ok(LabelOutcome::Applied(delta))
    }

    /// Download all labels as CSV into `dir`.
    ///
    /// Returns the written path, or `None` if the view was closed before the
    /// payload arrived.
    pub async fn download_labels(&self, dir: &Path) -> Result<Option<PathBuf>, ApiError> {
        let epoch = {
            let mut state = self.state.lock().await;
            state.begin_download();
            state.view_epoch
        };

        let result = self.backend.download_labels().await;
        {
            let mut state = self.state.lock().await;
            if state.view_epoch != epoch {
                return Ok(None);
            }
            state.finish_download();
        }
        let csv = match result {
            Ok(csv) => csv,
            Err(err) => return self.fail(epoch, err).await,
        };

        let today = chrono::Local::now().date_naive();
        let path = dir.join(export_disk_name(&self.product_name, today));
        if let Err(err) = tokio::fs::write(&path, &csv).await {
            return self.fail(epoch, err.into()).await;
        }
        info!("Saved labels to {}", path.display());
        Ok(Some(path))
    }

    /// Upload a label file.
    ///
    /// On failure the previous upload summary is kept.
    pub async fn upload_labels(&self, path: &Path) -> Result<Option<UploadSummary>, ApiError> {
        let epoch = self.state.lock().await.view_epoch;
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(err) => return self.fail(epoch, err.into()).await,
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("labels.csv")
            .to_string();

        self.state.lock().await.begin_upload();
        let result = self.backend.upload_labels(&file_name, contents).await;

        let mut state = self.state.lock().await;
        if state.view_epoch != epoch {
            return Ok(None);
        }
        match result {
            Ok(summary) => {
                info!("Uploaded {} ({:?} labels)", file_name, summary.total);
                state.finish_upload(summary.clone());
                Ok(Some(summary))
            }
            Err(err) => {
                state.fail_upload(err.user_message());
                Err(err)
            }
        }
    }

    /// Fetch information gain data for the current category.
    pub async fn label_info_gain(&self) -> Result<Option<serde_json::Value>, ApiError> {
        let (category, epoch) = self.category_and_epoch().await?;
        let info_gain = match self.backend.labeled_info_gain(&category).await {
            Ok(value) => value,
            Err(err) => return self.fail(epoch, err).await,
        };

        let mut state = self.state.lock().await;
        if state.view_epoch != epoch {
            return Ok(None);
        }
        state.set_info_gain(info_gain.clone());
        Ok(Some(info_gain))
    }
}
