use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::{error::AppError, utils::config::AppConfig};

use super::{
    FileSearchService, GroundedAnswer, GroundingFragment, GroundingSupport, OperationStatus,
    UploadOperation, UploadRequest,
};

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// [`FileSearchService`] backed by the Gemini File Search REST API.
#[derive(Clone)]
pub struct GeminiFileSearch {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiFileSearch {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config
                .gemini_api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
        })
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("gemini_api_key is not configured".into()))
    }

    fn api_url(&self, resource: &str) -> String {
        format!("{}/{API_VERSION}/{resource}", self.base_url)
    }
}

#[async_trait]
impl FileSearchService for GeminiFileSearch {
    async fn create_store(&self, display_name: &str) -> Result<String, AppError> {
        let response = self
            .http
            .post(self.api_url("fileSearchStores"))
            .header(API_KEY_HEADER, self.api_key()?)
            .json(&json!({ "displayName": display_name }))
            .send()
            .await?;
        let store: StoreResource = read_json(response, "create store").await?;
        store
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::FileSearch("create store returned no store name".into()))
    }

    async fn upload_document(&self, request: UploadRequest) -> Result<UploadOperation, AppError> {
        let api_key = self.api_key()?;
        let size = request.bytes.len();
        let metadata = UploadMetadata {
            display_name: &request.display_name,
            mime_type: &request.content_type,
            custom_metadata: request
                .metadata
                .iter()
                .map(|(key, value)| CustomMetadata {
                    key,
                    string_value: value,
                })
                .collect(),
        };

        let start = self
            .http
            .post(format!(
                "{}/upload/{API_VERSION}/{}:uploadToFileSearchStore",
                self.base_url, request.store_handle
            ))
            .header(API_KEY_HEADER, api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", &request.content_type)
            .json(&metadata)
            .send()
            .await?;
        let start = ensure_success(start, "start upload").await?;
        let upload_url = upload_url(start.headers())?;

        debug!(
            display_name = %request.display_name,
            bytes = size,
            "uploading document bytes to file search"
        );
        let finalize = self
            .http
            .post(upload_url)
            .header(API_KEY_HEADER, api_key)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .body(request.bytes)
            .send()
            .await?;
        let operation: OperationResource = read_json(finalize, "finalize upload").await?;
        let name = operation
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::FileSearch("upload returned no operation name".into()))?;
        Ok(UploadOperation { name })
    }

    async fn poll_operation(
        &self,
        operation: &UploadOperation,
    ) -> Result<OperationStatus, AppError> {
        let response = self
            .http
            .get(self.api_url(&operation.name))
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await?;
        let resource: OperationResource = read_json(response, "poll operation").await?;
        OperationStatus::try_from(resource)
    }

    async fn delete_document(&self, document_handle: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(self.api_url(document_handle))
            .header(API_KEY_HEADER, self.api_key()?)
            .query(&[("force", "true")])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!(document_handle, "indexed document already absent");
            return Ok(());
        }
        ensure_success(response, "delete document").await?;
        Ok(())
    }

    async fn generate_answer(
        &self,
        query: &str,
        store_handle: &str,
    ) -> Result<GroundedAnswer, AppError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": query }] }],
            "tools": [{ "fileSearch": { "fileSearchStoreNames": [store_handle] } }],
        });
        let response = self
            .http
            .post(self.api_url(&format!("models/{}:generateContent", self.model)))
            .header(API_KEY_HEADER, self.api_key()?)
            .json(&body)
            .send()
            .await?;
        let parsed: GenerateContentResponse = read_json(response, "generate answer").await?;
        GroundedAnswer::try_from(parsed)
    }
}

async fn ensure_success(response: Response, operation: &str) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or(body);
    Err(AppError::FileSearch(format!(
        "{operation} failed with status {status}: {message}"
    )))
}

async fn read_json<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T, AppError> {
    let response = ensure_success(response, operation).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|err| {
        AppError::FileSearch(format!("{operation} returned an unexpected body: {err}"))
    })
}

fn upload_url(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(UPLOAD_URL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| AppError::FileSearch("start upload returned no upload url".into()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    display_name: &'a str,
    mime_type: &'a str,
    custom_metadata: Vec<CustomMetadata<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomMetadata<'a> {
    key: &'a str,
    string_value: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoreResource {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationResource {
    name: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<ErrorBody>,
    response: Option<OperationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    document_name: Option<String>,
    name: Option<String>,
}

impl TryFrom<OperationResource> for OperationStatus {
    type Error = AppError;

    fn try_from(resource: OperationResource) -> Result<Self, Self::Error> {
        if let Some(error) = resource.error {
            return Ok(OperationStatus::Failed {
                message: error
                    .message
                    .unwrap_or_else(|| "indexing failed without a message".to_string()),
            });
        }
        if !resource.done {
            return Ok(OperationStatus::Pending);
        }
        resource
            .response
            .and_then(|result| result.document_name.or(result.name))
            .filter(|handle| !handle.is_empty())
            .map(|document_handle| OperationStatus::Succeeded { document_handle })
            .ok_or_else(|| {
                AppError::FileSearch(format!(
                    "operation {} finished without a document handle",
                    resource.name.as_deref().unwrap_or("<unnamed>")
                ))
            })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    grounding_supports: Vec<SupportResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingChunk {
    retrieved_context: Option<RetrievedContext>,
}

#[derive(Debug, Deserialize)]
struct RetrievedContext {
    uri: Option<String>,
    title: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SupportResource {
    segment: Option<Segment>,
    #[serde(default)]
    grounding_chunk_indices: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Segment {
    end_index: Option<usize>,
}

impl TryFrom<GenerateContentResponse> for GroundedAnswer {
    type Error = AppError;

    fn try_from(response: GenerateContentResponse) -> Result<Self, Self::Error> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::FileSearch("answer contained no candidates".into()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        let metadata = candidate.grounding_metadata.unwrap_or_default();

        let fragments = metadata
            .grounding_chunks
            .into_iter()
            .enumerate()
            .map(|(position, chunk)| {
                let context = chunk.retrieved_context.ok_or_else(|| {
                    AppError::FileSearch(format!(
                        "grounding chunk {position} has no retrieved context"
                    ))
                })?;
                let title = context.title.filter(|t| !t.trim().is_empty());
                let reference = context
                    .uri
                    .filter(|uri| !uri.trim().is_empty())
                    .or_else(|| title.clone())
                    .ok_or_else(|| {
                        AppError::FileSearch(format!(
                            "grounding chunk {position} has neither uri nor title"
                        ))
                    })?;
                Ok(GroundingFragment {
                    reference,
                    title,
                    text: context.text,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let fragment_count = fragments.len();
        let supports = metadata
            .grounding_supports
            .into_iter()
            .filter_map(|support| {
                let end_index = support.segment.and_then(|segment| segment.end_index)?;
                let fragment_indices: Vec<usize> = support
                    .grounding_chunk_indices
                    .into_iter()
                    .filter(|index| *index < fragment_count)
                    .collect();
                (!fragment_indices.is_empty()).then_some(GroundingSupport {
                    end_index,
                    fragment_indices,
                })
            })
            .collect();

        Ok(GroundedAnswer {
            text,
            fragments,
            supports,
        })
    }
}
