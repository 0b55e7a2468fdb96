//! HTTP client for the labeling backend REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::error::ApiError;
use super::types::{
    DocumentResponse, DocumentsResponse, ElementPayload, PositiveElementsResponse,
    SetLabelRequest, SetLabelResponse, UploadSummary,
};
use super::LabelingBackend;
use crate::config::Settings;
use crate::models::{DocumentRef, Label};

pub const DOWNLOAD_LABELS_API: &str = "download_labels";
pub const UPLOAD_LABELS_API: &str = "upload_labels";
pub const INFO_GAIN_API: &str = "labeled_info_gain";

/// Query parameter carrying the current category.
pub const CATEGORY_PARAM: &str = "category";

/// Multipart field name the backend reads the uploaded file from.
pub const UPLOAD_FIELD: &str = "file";

/// REST client bound to one workspace.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    workspace_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client from settings.
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(Duration::from_secs(settings.request_timeout))
            .gzip(true)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Self::with_client(client, settings)
    }

    /// Create a client around an existing reqwest client.
    pub fn with_client(client: Client, settings: &Settings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|e| ApiError::Config(format!("base_url {:?}: {}", settings.base_url, e)))?;
        if settings.workspace_id.is_empty() {
            return Err(ApiError::Config("no workspace selected".to_string()));
        }

        let workspace_url = format!(
            "{}/workspace/{}",
            base.as_str().trim_end_matches('/'),
            urlencoding::encode(&settings.workspace_id)
        );

        Ok(Self {
            client,
            workspace_url,
            token: settings.token.clone(),
        })
    }

    /// URL of the workspace root, e.g. `http://host/workspace/my-ws`.
    pub fn workspace_url(&self) -> &str {
        &self.workspace_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.workspace_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and turn non-success statuses into errors.
    async fn send(&self, method: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = self.authorized(request).build()?;
        let url = request.url().clone();

        let start = Instant::now();
        let resp = self.client.execute(request).await?;
        debug!(
            "{} {} -> {} in {}ms",
            method,
            url.path(),
            resp.status(),
            start.elapsed().as_millis()
        );

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LabelingBackend for ApiClient {
    async fn list_documents(&self) -> Result<Vec<DocumentRef>, ApiError> {
        let resp = self
            .send("GET", self.client.get(self.url("documents")))
            .await?;
        let body: DocumentsResponse = Self::json(resp).await?;
        Ok(body.documents)
    }

    async fn fetch_document(
        &self,
        document_id: &str,
        category: &str,
    ) -> Result<DocumentResponse, ApiError> {
        let url = self.url(&format!("document/{}", urlencoding::encode(document_id)));
        let resp = self
            .send("GET", self.client.get(url).query(&[(CATEGORY_PARAM, category)]))
            .await?;
        Self::json(resp).await
    }

    async fn positive_elements(&self, category: &str) -> Result<Vec<ElementPayload>, ApiError> {
        let request = self
            .client
            .get(self.url("positive_elements"))
            .query(&[(CATEGORY_PARAM, category)]);
        let resp = self.send("GET", request).await?;
        let body: PositiveElementsResponse = Self::json(resp).await?;
        Ok(body.positive_elements)
    }

    async fn set_element_label(
        &self,
        element_id: &str,
        category: &str,
        label: Label,
        update_counter: u64,
    ) -> Result<ElementPayload, ApiError> {
        let url = self.url(&format!("element/{}", urlencoding::encode(element_id)));
        let body = SetLabelRequest {
            category_id: category,
            value: label,
            update_counter,
        };
        let request = self
            .client
            .put(url)
            .query(&[(CATEGORY_PARAM, category)])
            .json(&body);
        let resp = self.send("PUT", request).await?;
        let body: SetLabelResponse = Self::json(resp).await?;
        Ok(body.element)
    }

    async fn download_labels(&self) -> Result<Vec<u8>, ApiError> {
        let request = self
            .client
            .get(self.url(DOWNLOAD_LABELS_API))
            .header(reqwest::header::CONTENT_TYPE, "text/csv;charset=UTF-8");
        let resp = self.send("GET", request).await?;
        // Raw bytes: the export is saved exactly as served, whatever its charset.
        let body = resp.bytes().await?;
        info!("Downloaded {} bytes of labels", body.len());
        Ok(body.to_vec())
    }

    async fn upload_labels(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<UploadSummary, ApiError> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let resp = self
            .send("POST", self.client.post(self.url(UPLOAD_LABELS_API)).multipart(form))
            .await?;
        Self::json(resp).await
    }

    async fn labeled_info_gain(&self, category: &str) -> Result<serde_json::Value, ApiError> {
        let request = self
            .client
            .get(self.url(INFO_GAIN_API))
            .query(&[(CATEGORY_PARAM, category)]);
        let resp = self.send("GET", request).await?;
        Self::json(resp).await
    }
}
