//! Page arithmetic for product listings.

use serde::Serialize;

/// Default number of products shown per page.
pub const ITEMS_PER_PAGE: u32 = 2;

/// Pagination state for one rendered page.
///
/// ```
/// use bazaar_core::Pagination;
///
/// let page = Pagination::new(Some("2"), 5, 2);
/// assert_eq!(page.current_page, 2);
/// assert!(page.has_next_page);
/// assert!(page.has_previous_page);
/// assert_eq!(page.last_page, 3);
/// assert_eq!(page.offset(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub next_page: u32,
    pub previous_page: u32,
    pub last_page: u32,
}

impl Pagination {
    /// Build pagination from a raw `?page=` value.
    ///
    /// Missing, unparsable or non-positive pages fall back to page 1. A zero
    /// `per_page` is treated as [`ITEMS_PER_PAGE`].
    #[must_use]
    pub fn new(requested_page: Option<&str>, total_items: u64, per_page: u32) -> Self {
        let per_page = if per_page == 0 { ITEMS_PER_PAGE } else { per_page };
        let current_page = requested_page
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1);

        let seen = u64::from(per_page) * u64::from(current_page);
        let last_page = u32::try_from(total_items.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX);

        Self {
            current_page,
            per_page,
            total_items,
            has_next_page: seen < total_items,
            has_previous_page: current_page > 1,
            next_page: current_page.saturating_add(1),
            previous_page: current_page.saturating_sub(1),
            last_page,
        }
    }

    /// Number of rows to skip.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.current_page - 1) * i64::from(self.per_page)
    }

    /// Number of rows to fetch.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    /// Whether a link to the last page should be shown separately from "next".
    #[must_use]
    pub fn shows_last_page(&self) -> bool {
        self.last_page > self.current_page && self.last_page != self.next_page
    }

    /// Whether a link to page 1 should be shown separately from "previous".
    #[must_use]
    pub fn shows_first_page(&self) -> bool {
        self.current_page != 1 && self.previous_page != 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_first_page() {
        for raw in [None, Some(""), Some("abc"), Some("0"), Some("-4")] {
            let page = Pagination::new(raw, 10, 2);
            assert_eq!(page.current_page, 1, "input {raw:?}");
            assert!(!page.has_previous_page);
            assert_eq!(page.offset(), 0);
        }
    }

    #[test]
    fn test_has_next_page_boundary() {
        // 4 items, 2 per page: page 2 shows items 3-4, nothing after.
        assert!(Pagination::new(Some("1"), 4, 2).has_next_page);
        assert!(!Pagination::new(Some("2"), 4, 2).has_next_page);
        assert!(Pagination::new(Some("2"), 5, 2).has_next_page);
    }

    #[test]
    fn test_last_page_rounds_up() {
        assert_eq!(Pagination::new(None, 0, 2).last_page, 0);
        assert_eq!(Pagination::new(None, 1, 2).last_page, 1);
        assert_eq!(Pagination::new(None, 4, 2).last_page, 2);
        assert_eq!(Pagination::new(None, 5, 2).last_page, 3);
    }

    #[test]
    fn test_offset_and_limit() {
        let page = Pagination::new(Some("3"), 20, 4);
        assert_eq!(page.offset(), 8);
        assert_eq!(page.limit(), 4);
        assert_eq!(page.previous_page, 2);
        assert_eq!(page.next_page, 4);
    }

    #[test]
    fn test_zero_per_page_uses_default() {
        let page = Pagination::new(None, 10, 0);
        assert_eq!(page.per_page, ITEMS_PER_PAGE);
    }

    #[test]
    fn test_first_and_last_links() {
        let page = Pagination::new(Some("1"), 10, 2);
        assert!(!page.shows_first_page());
        assert!(page.shows_last_page());

        let page = Pagination::new(Some("5"), 10, 2);
        assert!(page.shows_first_page());
        assert!(!page.shows_last_page());

        let page = Pagination::new(Some("2"), 10, 2);
        assert!(!page.shows_first_page());
    }
}
