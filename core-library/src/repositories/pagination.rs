//! Pagination helper types for catalog queries
//!
//! Pages are 1-based, matching what the presentation layer sends.

use serde::{Deserialize, Serialize};

/// Largest page size accepted from callers.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Pagination request parameters
///
/// Deserialized values go through [`PageRequest::new`], so the same clamps
/// apply to requests arriving over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPageRequest")]
pub struct PageRequest {
    /// Current page number (1-based; 0 is treated as 1)
    pub page: u32,
    /// Number of items per page
    pub page_size: u32,
}

impl PageRequest {
    /// Create a new page request
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::repositories::PageRequest;
    ///
    /// let request = PageRequest::new(2, 20);
    /// assert_eq!(request.offset(), 20);
    /// assert_eq!(request.limit(), 20);
    /// ```
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.min(MAX_PAGE_SIZE),
        }
    }

    /// Calculate the SQL OFFSET value
    ///
    /// Computed in `u64`: a far page times the page size can exceed `u32::MAX`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size)
    }

    /// Get the LIMIT value (same as page_size)
    pub fn limit(&self) -> u32 {
        self.page_size
    }
}

#[derive(Deserialize)]
struct RawPageRequest {
    page: u32,
    page_size: u32,
}

impl From<RawPageRequest> for PageRequest {
    fn from(raw: RawPageRequest) -> Self {
        Self::new(raw.page, raw.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

/// Paginated response containing items and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of matching items across all pages
    pub total: u64,
    /// Current page number (1-based)
    pub page: u32,
    /// Total number of pages
    pub total_pages: u32,
    /// Number of items per page
    pub page_size: u32,
    /// True if items exist beyond this page
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Create a new paginated response
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::repositories::{Page, PageRequest};
    ///
    /// let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(1, 10));
    ///
    /// assert_eq!(page.total_pages, 3);
    /// assert!(page.has_more);
    /// ```
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total.div_ceil(request.page_size as u64) as u32
        };
        let has_more = request.offset().saturating_add(items.len() as u64) < total;

        Self {
            items,
            total,
            page: request.page,
            total_pages,
            page_size: request.page_size,
            has_more,
        }
    }

    /// Check if there are pages before the current one
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Map the items to a different type
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
            page_size: self.page_size,
            has_more: self.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_default() {
        let request = PageRequest::default();
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 50);
    }

    #[test]
    fn test_page_request_offset() {
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
        // Page zero is clamped to the first page
        assert_eq!(PageRequest::new(0, 20).offset(), 0);
    }

    #[test]
    fn test_far_page_offset_does_not_overflow() {
        let request = PageRequest::new(u32::MAX, MAX_PAGE_SIZE);
        assert_eq!(
            request.offset(),
            u64::from(u32::MAX - 1) * u64::from(MAX_PAGE_SIZE)
        );

        let page = Page::new(Vec::<u8>::new(), 25, request);
        assert!(!page.has_more);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_deserialized_request_is_clamped() {
        let request: PageRequest =
            serde_json::from_str(r#"{"page":0,"page_size":100000}"#).unwrap();
        assert_eq!(request, PageRequest::new(1, MAX_PAGE_SIZE));
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_page_size_is_capped() {
        assert_eq!(PageRequest::new(1, 10_000).limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_has_more() {
        let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(1, 10));
        assert!(page.has_more);

        let page = Page::new(vec![1, 2, 3, 4, 5], 25, PageRequest::new(3, 10));
        assert!(!page.has_more);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_page_has_previous() {
        assert!(!Page::new(vec![1], 25, PageRequest::new(1, 10)).has_previous());
        assert!(Page::new(vec![1], 25, PageRequest::new(2, 10)).has_previous());
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(vec![1, 2, 3], 25, PageRequest::new(1, 10));
        let mapped = page.map(|x| x * 2);

        assert_eq!(mapped.items, vec![2, 4, 6]);
        assert_eq!(mapped.total, 25);
        assert!(mapped.has_more);
    }

    #[test]
    fn test_page_zero_page_size() {
        let page = Page::new(Vec::<u8>::new(), 25, PageRequest::new(1, 0));
        assert_eq!(page.total_pages, 0);
    }
}
