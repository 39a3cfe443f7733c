//! Typed client for the chain-reaction backend

use crate::{
    ClientError, Result,
    client::{HttpClientConfig, create_client, with_retry},
    listing::{
        EvalJobListing, EvalMetricListing, FileListing, Listing, QaBatchListing, QaPairListing,
    },
    wire::{self, paths},
};
use chainwatch_core::models::{EvalJob, EvalMetric, OverallMetrics, QaBatch, QaPair, RepoFile};
use chainwatch_core::{ChatMessage, PageRequest, PagedResult};
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Backend connection configuration
#[derive(Debug, Clone)]
pub struct ChainClientConfig {
    /// Base URL of the backend (default: http://localhost:8000)
    pub base_url: String,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl ChainClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_config: HttpClientConfig::default(),
        }
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

impl Default for ChainClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8000")
    }
}

/// Whether a response must carry `success: "ok"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Envelope {
    Checked,
    Raw,
}

/// Whether a call may be re-sent after a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Side-effect free lookups
    Transient,
    /// Creates, submits, list pages and status polls go out exactly once;
    /// periodic callers retry on their next tick
    Never,
}

impl Retry {
    fn attempts(self, max_retries: u32) -> u32 {
        match self {
            Retry::Transient => max_retries,
            Retry::Never => 0,
        }
    }
}

/// Client for the chain-reaction backend
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ChainClient {
    config: Arc<ChainClientConfig>,
    client: Client,
}

impl ChainClient {
    pub fn new(config: ChainClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".to_string()));
        }
        let client = create_client(&config.client_config)?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B, R>(&self, path: &str, body: &B, envelope: Envelope, retry: Retry) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let max_retries = retry.attempts(self.config.client_config.max_retries);
        let value = with_retry(max_retries, || {
            let url = url.clone();
            async move {
                debug!("POST {}", url);
                let response = self.client.post(&url).json(body).send().await?;
                decode_response(response, envelope).await
            }
        })
        .await?;

        serde_json::from_value(value)
            .map_err(|e| ClientError::Parse(format!("{}: {}", path, e)))
    }

    async fn get<R>(&self, path: &str, envelope: Envelope, retry: Retry) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let max_retries = retry.attempts(self.config.client_config.max_retries);
        let value = with_retry(max_retries, || {
            let url = url.clone();
            async move {
                debug!("GET {}", url);
                let response = self.client.get(&url).send().await?;
                decode_response(response, envelope).await
            }
        })
        .await?;

        serde_json::from_value(value)
            .map_err(|e| ClientError::Parse(format!("{}: {}", path, e)))
    }

    /// Ingest a GitHub repository, returning its repo id
    #[instrument(skip(self))]
    pub async fn ingest_repo(&self, repo_url: &str) -> Result<String> {
        let repo_url = repo_url.trim();
        if repo_url.is_empty() {
            return Err(ClientError::InvalidRequest("repository URL is empty".to_string()));
        }
        let response: wire::IngestResponse = self
            .post(paths::INGEST, &wire::IngestRequest { repo_url }, Envelope::Checked, Retry::Never)
            .await?;
        Ok(response.repo_id)
    }

    /// Fetch one page of any listing
    ///
    /// Performs exactly one call and leaves page bounds to the caller.
    #[instrument(skip(self), fields(listing = L::NAME))]
    pub async fn list_page<L: Listing>(
        &self,
        resource_id: &str,
        page: PageRequest,
    ) -> Result<PagedResult<L::Item>> {
        let mut body = serde_json::Map::new();
        body.insert(L::ID_FIELD.to_string(), Value::from(resource_id));
        body.insert("page".to_string(), Value::from(page.page));
        body.insert("page_size".to_string(), Value::from(page.page_size));

        let mut value: Value = self.post(L::PATH, &body, Envelope::Checked, Retry::Never).await?;

        let total_count = value
            .get(L::TOTAL_FIELD)
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                ClientError::Parse(format!("{}: missing `{}`", L::PATH, L::TOTAL_FIELD))
            })?;
        let items = match value.get_mut(L::ITEMS_FIELD).map(Value::take) {
            Some(Value::Null) => Vec::new(),
            Some(items) => serde_json::from_value::<Vec<L::Item>>(items)
                .map_err(|e| ClientError::Parse(format!("{}: {}", L::PATH, e)))?,
            None => {
                return Err(ClientError::Parse(format!(
                    "{}: missing `{}`",
                    L::PATH,
                    L::ITEMS_FIELD
                )));
            }
        };

        if items.len() > page.page_size as usize {
            warn!(
                listing = L::NAME,
                items = items.len(),
                page_size = page.page_size,
                "Backend returned more items than requested"
            );
        }

        Ok(PagedResult::new(items, total_count, page))
    }

    pub async fn list_files(&self, repo_id: &str, page: PageRequest) -> Result<PagedResult<RepoFile>> {
        self.list_page::<FileListing>(repo_id, page).await
    }

    /// Fetch a single file with its summary and raw content
    #[instrument(skip(self))]
    pub async fn get_file(&self, file_id: &str) -> Result<RepoFile> {
        if file_id.trim().is_empty() {
            return Err(ClientError::InvalidRequest("file id is empty".to_string()));
        }
        let path = format!("{}/{}", paths::FILES, file_id);
        let response: wire::FileDetailResponse = self.get(&path, Envelope::Checked, Retry::Transient).await?;
        Ok(response.file)
    }

    pub async fn list_qa_batches(&self, repo_id: &str, page: PageRequest) -> Result<PagedResult<QaBatch>> {
        self.list_page::<QaBatchListing>(repo_id, page).await
    }

    /// Start a new Q&A generation batch, returning its id when the backend reports one
    #[instrument(skip(self))]
    pub async fn create_qa_batch(&self, repo_id: &str) -> Result<Option<String>> {
        let response: wire::CreateBatchResponse = self
            .post(paths::QA_BATCH_CREATE, &wire::RepoRequest { repo_id }, Envelope::Checked, Retry::Never)
            .await?;
        Ok(response.batch_id)
    }

    pub async fn list_qa_pairs(&self, batch_id: &str, page: PageRequest) -> Result<PagedResult<QaPair>> {
        self.list_page::<QaPairListing>(batch_id, page).await
    }

    #[instrument(skip(self))]
    pub async fn archive_qa_pair(&self, qa_id: &str) -> Result<()> {
        let _: serde::de::IgnoredAny = self
            .post(paths::QA_PAIR_ARCHIVE, &wire::ArchiveRequest { qa_id }, Envelope::Checked, Retry::Never)
            .await?;
        Ok(())
    }

    pub async fn list_eval_jobs(&self, repo_id: &str, page: PageRequest) -> Result<PagedResult<EvalJob>> {
        self.list_page::<EvalJobListing>(repo_id, page).await
    }

    /// Start an evaluation of a Q&A batch
    #[instrument(skip(self))]
    pub async fn create_eval_job(&self, qa_batch_id: &str, repo_id: &str) -> Result<Option<String>> {
        if qa_batch_id.trim().is_empty() {
            return Err(ClientError::InvalidRequest("Please select a Q&A batch".to_string()));
        }
        let response: wire::CreateEvalResponse = self
            .post(
                paths::EVAL_CREATE,
                &wire::CreateEvalRequest { qa_batch_id, repo_id },
                Envelope::Checked,
                Retry::Never,
            )
            .await?;
        Ok(response.eval_job_id)
    }

    pub async fn list_eval_metrics(
        &self,
        eval_job_id: &str,
        page: PageRequest,
    ) -> Result<PagedResult<EvalMetric>> {
        self.list_page::<EvalMetricListing>(eval_job_id, page).await
    }

    #[instrument(skip(self))]
    pub async fn overall_metrics(&self, eval_job_id: &str) -> Result<OverallMetrics> {
        let response: wire::OverallMetricsResponse = self
            .post(paths::EVAL_OVERALL, &wire::EvalJobRequest { eval_job_id }, Envelope::Checked, Retry::Transient)
            .await?;
        Ok(response.overall_metrics)
    }

    /// Submit a RAG question; the answer is fetched later with [`Self::rag_status`]
    #[instrument(skip(self, messages), fields(turns = messages.len()))]
    pub async fn submit_rag(&self, repo_id: &str, messages: &[ChatMessage]) -> Result<String> {
        let response: wire::RagSubmitResponse = self
            .post(paths::RAG_SUBMIT, &wire::RagSubmitRequest { repo_id, messages }, Envelope::Checked, Retry::Never)
            .await?;
        Ok(response.request_id)
    }

    #[instrument(skip(self))]
    pub async fn rag_status(&self, request_id: &str) -> Result<wire::RagStatusResponse> {
        self.post(paths::RAG_STATUS, &wire::RagStatusRequest { request_id }, Envelope::Checked, Retry::Never)
            .await
    }

    /// Translate text into a single language
    #[instrument(skip(self, text))]
    pub async fn translate(&self, text: &str, language: &str) -> Result<String> {
        let languages = vec![language.to_string()];
        let response: wire::TranslateResponse = self
            .post(paths::TRANSLATE, &wire::TranslateRequest { text, languages: &languages }, Envelope::Raw, Retry::Transient)
            .await?;

        response
            .results
            .get(language)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(response.text)
            .ok_or_else(|| ClientError::Parse(format!("no translation for {}", language)))
    }

    /// Translate text through a chain of languages, one step per language
    ///
    /// Steps come back in the order the languages were given.
    #[instrument(skip(self, text))]
    pub async fn translate_chain(&self, text: &str, languages: &[String]) -> Result<Vec<(String, String)>> {
        if languages.is_empty() {
            return Err(ClientError::InvalidRequest("at least one language is required".to_string()));
        }
        let response: wire::TranslateResponse = self
            .post(paths::TRANSLATE_CHAIN, &wire::TranslateRequest { text, languages }, Envelope::Raw, Retry::Transient)
            .await?;

        let mut steps: Vec<(String, String)> = languages
            .iter()
            .filter_map(|language| {
                response
                    .results
                    .get(language)
                    .map(|value| (language.clone(), value_text(value)))
            })
            .collect();
        for (language, value) in &response.results {
            if !languages.contains(language) {
                steps.push((language.clone(), value_text(value)));
            }
        }
        Ok(steps)
    }
}

fn value_text(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

/// Map an HTTP response to its JSON body, or the error it represents
async fn decode_response(response: reqwest::Response, envelope: Envelope) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| extract_detail(&value))
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.clone()
                }
            });
        return Err(ClientError::Api {
            status_code: status.as_u16(),
            detail,
        });
    }

    let value: Value = serde_json::from_str(&body)
        .map_err(|e| ClientError::Parse(format!("invalid JSON body: {}", e)))?;

    if envelope == Envelope::Checked
        && value.get("success").and_then(Value::as_str) != Some(wire::SUCCESS_OK)
    {
        let detail = extract_detail(&value)
            .unwrap_or_else(|| "backend did not report success".to_string());
        return Err(ClientError::Rejected(detail));
    }

    Ok(value)
}

/// FastAPI-style `detail`: a string, or a list of validation errors
fn extract_detail(value: &Value) -> Option<String> {
    match value.get("detail").or_else(|| value.get("message"))? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(errors) => {
            let messages: Vec<String> = errors
                .iter()
                .map(|error| {
                    error
                        .get("msg")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string())
                })
                .collect();
            Some(messages.join("; "))
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
