//! Data sources a refresher can keep current

use async_trait::async_trait;
use chainwatch_client::listing::{Listing, PageFetcher};
use chainwatch_client::{ChainClient, ClientError};
use chainwatch_core::models::{OverallMetrics, RepoFile};
use chainwatch_core::{PageRequest, PagedResult};
use std::fmt;

/// Something fetched by key, over and over
///
/// `Ok(None)` means the key does not name anything fetchable yet, for
/// example a view with no resource selected. It leaves the shown data alone.
#[async_trait]
pub trait Refreshable: Send + Sync + 'static {
    type Key: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;
    type Output: Send + Sync + 'static;

    async fn load(&self, key: &Self::Key) -> Result<Option<Self::Output>, ClientError>;
}

/// Resource id and page of a list view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub resource_id: Option<String>,
    pub page: PageRequest,
}

impl ListKey {
    pub fn new(resource_id: Option<String>, page: PageRequest) -> Self {
        Self { resource_id, page }
    }

    /// First page of `resource_id` with the listing's default page size
    pub fn first<L: Listing>(resource_id: Option<String>) -> Self {
        Self::new(resource_id, PageRequest::first(L::DEFAULT_PAGE_SIZE))
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self::new(self.resource_id.clone(), self.page.with_page(page))
    }
}

#[async_trait]
impl<L: Listing> Refreshable for PageFetcher<L> {
    type Key = ListKey;
    type Output = PagedResult<L::Item>;

    async fn load(&self, key: &ListKey) -> Result<Option<Self::Output>, ClientError> {
        self.fetch(key.resource_id.as_deref(), key.page).await
    }
}

/// Details of a single file, keyed by file id
#[derive(Debug, Clone)]
pub struct FileDetailSource {
    client: ChainClient,
}

impl FileDetailSource {
    pub fn new(client: ChainClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Refreshable for FileDetailSource {
    type Key = String;
    type Output = RepoFile;

    async fn load(&self, file_id: &String) -> Result<Option<RepoFile>, ClientError> {
        if file_id.trim().is_empty() {
            return Ok(None);
        }
        self.client.get_file(file_id).await.map(Some)
    }
}

/// Aggregated scores of an evaluation job, keyed by job id
#[derive(Debug, Clone)]
pub struct OverallMetricsSource {
    client: ChainClient,
}

impl OverallMetricsSource {
    pub fn new(client: ChainClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Refreshable for OverallMetricsSource {
    type Key = String;
    type Output = OverallMetrics;

    async fn load(&self, eval_job_id: &String) -> Result<Option<OverallMetrics>, ClientError> {
        if eval_job_id.trim().is_empty() {
            return Ok(None);
        }
        self.client.overall_metrics(eval_job_id).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainwatch_client::listing::QaPairListing;

    #[test]
    fn test_list_key_first_uses_listing_page_size() {
        let key = ListKey::first::<QaPairListing>(Some("b-1".to_string()));
        assert_eq!(key.page, PageRequest::new(1, 50));
        assert_eq!(key.resource_id.as_deref(), Some("b-1"));
    }

    #[test]
    fn test_list_key_with_page_keeps_resource() {
        let key = ListKey::new(Some("r-1".to_string()), PageRequest::new(1, 20));
        let next = key.with_page(3);
        assert_eq!(next.page, PageRequest::new(3, 20));
        assert_eq!(next.resource_id, key.resource_id);
        assert_ne!(next, key);
    }

    #[tokio::test]
    async fn test_blank_ids_make_no_call() {
        // Nothing listens on this port; any request would fail
        let client = ChainClient::new(chainwatch_client::ChainClientConfig::new("http://127.0.0.1:9")).unwrap();

        let files = FileDetailSource::new(client.clone());
        assert!(files.load(&"  ".to_string()).await.unwrap().is_none());

        let overall = OverallMetricsSource::new(client.clone());
        assert!(overall.load(&String::new()).await.unwrap().is_none());

        let pages = PageFetcher::<QaPairListing>::new(client);
        let key = ListKey::first::<QaPairListing>(None);
        assert!(pages.load(&key).await.unwrap().is_none());
    }
}
