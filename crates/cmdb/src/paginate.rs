//! Offset pagination for list operations.

use crate::config::CmdbConfig;

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    /// Clamps caller input: pages start at 1, and a size outside
    /// `1..max_page_size` falls back to the configured default.
    pub fn new(page: usize, size: usize, config: &CmdbConfig) -> Self {
        let page = page.max(1);
        let size = if size > 0 && size < config.max_page_size {
            size
        } else {
            config.default_page_size
        };
        Self { page, size }
    }

    pub fn limit(&self) -> usize {
        self.size
    }

    /// Rows to skip. Saturates for huge page numbers, which then read past
    /// the end and come back empty.
    pub fn offset(&self) -> usize {
        self.size.saturating_mul(self.page - 1)
    }
}

/// One page of results plus paging information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    /// Total number of matching rows.
    pub count: usize,
    /// Total number of pages.
    pub pages: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, count: usize) -> Self {
        Self {
            items,
            page: request.page,
            size: request.size,
            count,
            pages: count.div_ceil(request.size),
        }
    }
}
