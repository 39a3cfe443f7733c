//! Pagination math
//!
//! Pages are 1-based. The backend reports a total count next to every page of
//! items; everything else (page count, clamping, navigation) is derived here.

use serde::{Deserialize, Serialize};

/// Which page to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn first(page_size: u32) -> Self {
        Self { page: 1, page_size }
    }

    /// Same page size, different page
    pub fn with_page(self, page: u32) -> Self {
        Self { page, ..self }
    }
}

/// Number of pages needed for `total_count` items (`ceil(total / size)`)
///
/// A zero page size yields zero pages.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_count.div_ceil(page_size as u64);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// One page of items plus the request that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        Self {
            items,
            total_count,
            page: request.page,
            page_size: request.page_size,
        }
    }

    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clamp a requested page into `[1, total_pages]`
    ///
    /// An empty result still has page 1.
    pub fn clamp_page(&self, page: u32) -> u32 {
        page.clamp(1, self.total_pages().max(1))
    }

    /// Request for the last page when this page lies past it
    ///
    /// `None` while the page is in range or there are no results at all.
    pub fn clamped_request(&self) -> Option<PageRequest> {
        let pages = self.total_pages();
        (pages >= 1 && self.page > pages).then(|| self.request().with_page(pages))
    }

    /// "Previous" is disabled exactly on page 1
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// "Next" is disabled on the last page, or when there is at most one page
    pub fn has_next(&self) -> bool {
        let pages = self.total_pages();
        pages > 1 && self.page < pages
    }

    /// Request for the next page, if there is one
    pub fn next_page(&self) -> Option<PageRequest> {
        self.has_next()
            .then(|| self.request().with_page(self.page + 1))
    }

    /// Request for the previous page, if there is one
    pub fn previous_page(&self) -> Option<PageRequest> {
        self.has_previous()
            .then(|| self.request().with_page(self.clamp_page(self.page - 1)))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
