//! Limit/offset pagination for revision and live banner listings.

use thiserror::Error;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Page size used when the caller does not supply one.
pub const DEFAULT_PAGE_LIMIT: i64 = 5;

/// Validated pagination window.
///
/// ## Invariants
/// - `limit` lies in `0..=MAX_PAGE_LIMIT`.
/// - `offset` is non-negative.
///
/// # Examples
/// ```
/// use banners::domain::PageRequest;
///
/// let page = PageRequest::new(10, 20).expect("valid page");
/// assert_eq!(page.limit(), 10);
/// assert!(PageRequest::new(101, 0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: i64,
    offset: i64,
}

/// Validation errors raised by [`PageRequest::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageRequestError {
    /// Limit is negative or above [`MAX_PAGE_LIMIT`].
    #[error("limit {limit} is out of range 0..={MAX_PAGE_LIMIT}")]
    LimitOutOfRange { limit: i64 },
    /// Offset is negative.
    #[error("offset {offset} must not be negative")]
    NegativeOffset { offset: i64 },
}

impl PageRequest {
    /// Validate and build a pagination window.
    pub fn new(limit: i64, offset: i64) -> Result<Self, PageRequestError> {
        if !(0..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(PageRequestError::LimitOutOfRange { limit });
        }
        if offset < 0 {
            return Err(PageRequestError::NegativeOffset { offset });
        }
        Ok(Self { limit, offset })
    }

    /// Maximum number of items to return.
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Number of items to skip.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Whether the window can never contain an item.
    pub fn is_empty(&self) -> bool {
        self.limit == 0
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}
