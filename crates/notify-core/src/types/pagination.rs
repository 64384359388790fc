//! Pagination types for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size.
const DEFAULT_PAGE_SIZE: u64 = 10;
/// Maximum page size.
const MAX_PAGE_SIZE: u64 = 100;

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-based).
    pub page: u64,
    /// Number of items per page.
    pub page_size: u64,
}

impl PageRequest {
    /// Create a new page request, clamping out-of-range values.
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Calculate the SQL `OFFSET` value.
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1)) * self.page_size
    }

    /// Return the SQL `LIMIT` value.
    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// Total number of items across all pages.
    pub count: u64,
    /// Total number of pages.
    pub num_pages: u64,
    /// Current page number (1-based).
    pub current_page: u64,
    /// Next page number, if any.
    pub next: Option<u64>,
    /// Previous page number, if any.
    pub previous: Option<u64>,
    /// The items on this page.
    pub results: Vec<T>,
}

impl<T> PageResponse<T> {
    /// Create a new paginated response.
    pub fn new(results: Vec<T>, request: PageRequest, count: u64) -> Self {
        let num_pages = count.div_ceil(request.page_size).max(1);
        Self {
            count,
            num_pages,
            current_page: request.page,
            next: (request.page < num_pages).then_some(request.page + 1),
            previous: (request.page > 1).then_some(request.page - 1),
            results,
        }
    }

    /// Transform every item while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResponse<U> {
        PageResponse {
            count: self.count,
            num_pages: self.num_pages,
            current_page: self.current_page,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_clamps() {
        let request = PageRequest::new(0, 1000);
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_response_navigation() {
        let page = PageResponse::new(vec![1, 2], PageRequest::new(2, 2), 5);
        assert_eq!(page.num_pages, 3);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));
    }

    #[test]
    fn test_empty_response_has_one_page() {
        let page: PageResponse<u8> = PageResponse::new(Vec::new(), PageRequest::default(), 0);
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.next, None);
    }
}
