//! Offset pagination for search results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default page size when `_count` is absent.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound applied to `_count`.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Offset pagination for a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of results to return.
    pub count: usize,
    /// Number of results to skip.
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            count: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Creates pagination with the given count and offset.
    pub fn new(count: usize, offset: usize) -> Self {
        Self { count, offset }
    }

    /// Reads `_count` and `_offset` from a parameter bag.
    ///
    /// `_count` is clamped to `1..=max_count`; unparseable values fall back
    /// to the defaults. The last occurrence of a repeated key wins.
    pub fn from_params<'a, I>(params: I, default_count: usize, max_count: usize) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut count = default_count;
        let mut offset = 0;
        for (name, value) in params {
            match name {
                "_count" => {
                    if let Ok(n) = value.trim().parse::<usize>() {
                        count = n;
                    }
                }
                "_offset" => {
                    if let Ok(n) = value.trim().parse::<usize>() {
                        offset = n;
                    }
                }
                _ => {}
            }
        }
        Self {
            count: count.clamp(1, max_count.max(1)),
            offset,
        }
    }

    /// Returns true when a page after this one exists.
    pub fn has_next(&self, total: u64) -> bool {
        (self.offset as u64).saturating_add(self.count as u64) < total
    }

    /// Returns true when a page before this one exists.
    pub fn has_previous(&self) -> bool {
        self.offset > 0
    }

    /// Offset of the next page.
    pub fn next_offset(&self) -> usize {
        self.offset.saturating_add(self.count)
    }

    /// Offset of the previous page, clamped at zero.
    pub fn previous_offset(&self) -> usize {
        self.offset.saturating_sub(self.count)
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Total number of matches across all pages.
    pub total: u64,
    /// The documents on this page, in result order.
    pub resources: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_params_defaults() {
        let p = Pagination::from_params([("status", "active")], 20, 100);
        assert_eq!(p, Pagination::new(20, 0));
    }

    #[test]
    fn test_from_params_clamps() {
        let p = Pagination::from_params([("_count", "5000"), ("_offset", "40")], 20, 100);
        assert_eq!(p, Pagination::new(100, 40));

        let p = Pagination::from_params([("_count", "0")], 20, 100);
        assert_eq!(p.count, 1);

        let p = Pagination::from_params([("_count", "abc"), ("_offset", "-3")], 20, 100);
        assert_eq!(p, Pagination::new(20, 0));
    }

    #[test]
    fn test_page_navigation() {
        let p = Pagination::new(10, 10);
        assert!(p.has_next(25));
        assert!(p.has_previous());
        assert_eq!(p.next_offset(), 20);
        assert_eq!(p.previous_offset(), 0);

        let last = Pagination::new(10, 20);
        assert!(!last.has_next(25));
        assert!(last.has_previous());

        let first = Pagination::new(10, 0);
        assert!(!first.has_previous());
        assert_eq!(Pagination::new(10, 5).previous_offset(), 0);
    }
}
