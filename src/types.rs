/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page selection taken from `?page&pageSize` query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default = "Pagination::first_page")]
    pub page: u32,
    #[serde(default = "Pagination::default_size")]
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    fn first_page() -> u32 {
        1
    }

    fn default_size() -> u32 {
        DEFAULT_PAGE_SIZE
    }

    /// Clamp into `page >= 1` and `1 <= page_size <= MAX_PAGE_SIZE`
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

/// One page of results plus paging metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            data,
            meta: PageMeta {
                page: pagination.page,
                page_size: pagination.page_size,
                total,
            },
        }
    }

    /// Slice an in-memory, already ordered result set
    pub fn from_vec(items: Vec<T>, pagination: Pagination) -> Self {
        let total = items.len() as i64;
        let data = items
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .collect();
        Self::new(data, pagination, total)
    }
}
