//! Paginated listings
//!
//! Every list view of the dashboards is the same call with a different
//! endpoint, id field and payload shape. A [`Listing`] describes one of them;
//! [`PageFetcher`] performs the fetch for a given resource and page.

use crate::{ChainClient, Result, wire::paths};
use chainwatch_core::models::{EvalJob, EvalMetric, QaBatch, QaPair, RepoFile};
use chainwatch_core::{PageRequest, PagedResult};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Shape of one paginated endpoint
pub trait Listing: Send + Sync + 'static {
    type Item: DeserializeOwned + Send + Sync + 'static;

    /// Short name used in logs
    const NAME: &'static str;
    const PATH: &'static str;
    /// Request field carrying the parent resource id
    const ID_FIELD: &'static str;
    /// Response field carrying the page of items
    const ITEMS_FIELD: &'static str;
    /// Response field carrying the total item count
    const TOTAL_FIELD: &'static str;
    const DEFAULT_PAGE_SIZE: u32;
}

/// Files of a repository
pub struct FileListing;

impl Listing for FileListing {
    type Item = RepoFile;
    const NAME: &'static str = "files";
    const PATH: &'static str = paths::FILES;
    const ID_FIELD: &'static str = "repo_id";
    const ITEMS_FIELD: &'static str = "files";
    const TOTAL_FIELD: &'static str = "total_num_files";
    const DEFAULT_PAGE_SIZE: u32 = 100;
}

/// Q&A generation batches of a repository
pub struct QaBatchListing;

impl Listing for QaBatchListing {
    type Item = QaBatch;
    const NAME: &'static str = "qa_batches";
    const PATH: &'static str = paths::QA_BATCHES;
    const ID_FIELD: &'static str = "repo_id";
    const ITEMS_FIELD: &'static str = "batches";
    const TOTAL_FIELD: &'static str = "total_batches";
    const DEFAULT_PAGE_SIZE: u32 = 20;
}

/// Q&A pairs of a batch
pub struct QaPairListing;

impl Listing for QaPairListing {
    type Item = QaPair;
    const NAME: &'static str = "qa_pairs";
    const PATH: &'static str = paths::QA_PAIRS;
    const ID_FIELD: &'static str = "batch_id";
    const ITEMS_FIELD: &'static str = "qa_pairs";
    const TOTAL_FIELD: &'static str = "total_pairs";
    const DEFAULT_PAGE_SIZE: u32 = 50;
}

/// Evaluation jobs of a repository
pub struct EvalJobListing;

impl Listing for EvalJobListing {
    type Item = EvalJob;
    const NAME: &'static str = "eval_jobs";
    const PATH: &'static str = paths::EVAL_JOBS;
    const ID_FIELD: &'static str = "repo_id";
    const ITEMS_FIELD: &'static str = "eval_jobs";
    const TOTAL_FIELD: &'static str = "total_jobs";
    const DEFAULT_PAGE_SIZE: u32 = 20;
}

/// Per-question metrics of an evaluation job
pub struct EvalMetricListing;

impl Listing for EvalMetricListing {
    type Item = EvalMetric;
    const NAME: &'static str = "eval_metrics";
    const PATH: &'static str = paths::EVAL_METRICS;
    const ID_FIELD: &'static str = "eval_job_id";
    const ITEMS_FIELD: &'static str = "metrics";
    const TOTAL_FIELD: &'static str = "total_metrics";
    const DEFAULT_PAGE_SIZE: u32 = 50;
}

/// Fetches pages of one listing
pub struct PageFetcher<L: Listing> {
    client: ChainClient,
    _listing: PhantomData<fn() -> L>,
}

impl<L: Listing> PageFetcher<L> {
    pub fn new(client: ChainClient) -> Self {
        Self {
            client,
            _listing: PhantomData,
        }
    }

    pub fn client(&self) -> &ChainClient {
        &self.client
    }

    /// Fetch one page for `resource_id`
    ///
    /// A missing or blank resource id means there is nothing to show yet:
    /// no call is made and `Ok(None)` is returned. Page bounds are never
    /// adjusted here.
    pub async fn fetch(
        &self,
        resource_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Option<PagedResult<L::Item>>> {
        let Some(resource_id) = resource_id.filter(|id| !id.trim().is_empty()) else {
            debug!(listing = L::NAME, "No resource id, skipping fetch");
            return Ok(None);
        };
        self.client.list_page::<L>(resource_id, page).await.map(Some)
    }

    /// Fetch a page, falling back to the last page when `page` lies past it
    ///
    /// Makes a second call only when the first answer shows the requested
    /// page is out of range.
    pub async fn fetch_in_range(
        &self,
        resource_id: Option<&str>,
        page: PageRequest,
    ) -> Result<Option<PagedResult<L::Item>>> {
        let Some(result) = self.fetch(resource_id, page).await? else {
            return Ok(None);
        };
        match result.clamped_request() {
            Some(last) => {
                debug!(listing = L::NAME, requested = page.page, last = last.page, "Page out of range, loading last page");
                self.fetch(resource_id, last).await
            }
            None => Ok(Some(result)),
        }
    }
}

impl<L: Listing> Clone for PageFetcher<L> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<L: Listing> fmt::Debug for PageFetcher<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFetcher")
            .field("listing", &L::NAME)
            .field("base_url", &self.client.base_url())
            .finish()
    }
}
