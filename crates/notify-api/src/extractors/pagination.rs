//! `?page=&page_size=` query parameters of the tray listing.

use serde::Deserialize;

use notify_core::types::PageRequest;

/// Page selection; missing values fall back to page 1 of 10 and
/// out-of-range values are clamped by [`PageRequest::new`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PaginationParams {
    /// Resolve defaults and bounds.
    pub fn into_page_request(self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.page_size.unwrap_or(defaults.page_size),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let page = PaginationParams::default().into_page_request();
        assert_eq!((page.page, page.page_size), (1, 10));

        let page = PaginationParams {
            page: Some(0),
            page_size: Some(1_000),
        }
        .into_page_request();
        assert_eq!((page.page, page.page_size), (1, 100));
    }
}
