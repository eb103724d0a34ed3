//! Pagination request parameters
//!
//! Missing or out-of-range values are not errors: the store falls back to
//! page 1 and a page size of 100.

use serde::{Deserialize, Serialize};

use crate::store::{paginate, QueryOption, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PaginationParams {
    /// Page number (1-indexed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Rows per page, at most 1000
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, size: Option<u32>) -> Self {
        Self { page, size }
    }

    pub fn option(&self) -> QueryOption {
        paginate(
            self.page.unwrap_or(DEFAULT_PAGE),
            self.size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}
