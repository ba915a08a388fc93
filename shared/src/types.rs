//! Common types used across the platform

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest page size a list endpoint will serve
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Default page size for the spreadsheet-like matrix endpoints
pub const MATRIX_PAGE_SIZE: i64 = 25;

/// Raised when a stored or submitted code does not name a known variant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Normalized pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
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
    /// Build from raw query values, clamping to `page >= 1` and
    /// `1 <= page_size <= MAX_PAGE_SIZE`.
    pub fn new(page: Option<i64>, page_size: Option<i64>, default_size: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(default_size)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Number of pages needed for `total` rows
    pub fn pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.page_size - 1) / self.page_size
        }
    }
}

/// Paginated list envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64) -> Self {
        Self { data, total }
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
        }
    }
}

/// Standard `{ "message": ... }` body returned by mutations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<uuid::Uuid>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            id: None,
        }
    }

    pub fn with_id(message: impl Into<String>, id: uuid::Uuid) -> Self {
        Self {
            message: message.into(),
            id: Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let p = Pagination::new(None, None, DEFAULT_PAGE_SIZE);
        assert_eq!(p, Pagination::default());
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_clamps_negative_page() {
        let p = Pagination::new(Some(-3), Some(10), DEFAULT_PAGE_SIZE);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_clamps_page_size() {
        assert_eq!(Pagination::new(Some(1), Some(10_000), 20).page_size, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(Some(1), Some(0), 20).page_size, 1);
    }

    #[test]
    fn test_pagination_offset_and_pages() {
        let p = Pagination::new(Some(3), Some(25), MATRIX_PAGE_SIZE);
        assert_eq!(p.offset(), 50);
        assert_eq!(p.pages(51), 3);
        assert_eq!(p.pages(0), 0);
    }
}
