use serde::{Deserialize, Serialize};

pub const MAX_LIMIT: i64 = 100;

/// Raw `page`/`limit` query parameters. Defaults differ per endpoint, so the
/// default limit is supplied at normalization time.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    /// Clamp into a usable page: page >= 1, 1 <= limit <= MAX_LIMIT.
    pub fn normalize(self, default_limit: i64) -> Page {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT);
        Page { page, limit }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    /// Saturates so an absurd page number yields an empty page, not an
    /// overflow panic or a negative SQL offset.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn info(&self, total: i64) -> PageInfo {
        let total_pages = if total == 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        };
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            total_pages,
            has_next: self.page < total_pages,
            has_prev: self.page > 1,
        }
    }
}

/// Pagination block returned alongside list data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_params_absent() {
        let page = PageQuery::default().normalize(10);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 10);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn limit_is_clamped() {
        let page = PageQuery { page: Some(0), limit: Some(1000) }.normalize(10);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, MAX_LIMIT);
    }

    #[test]
    fn middle_page_of_twelve_items() {
        let page = PageQuery { page: Some(2), limit: Some(5) }.normalize(10);
        assert_eq!(page.offset(), 5);
        let info = page.info(12);
        assert_eq!(info.total, 12);
        assert_eq!(info.total_pages, 3);
        assert!(info.has_next);
        assert!(info.has_prev);
    }

    #[test]
    fn empty_list_has_no_pages() {
        let info = PageQuery::default().normalize(20).info(0);
        assert_eq!(info.total_pages, 0);
        assert!(!info.has_next);
        assert!(!info.has_prev);
    }

    #[test]
    fn huge_page_number_saturates_instead_of_overflowing() {
        let page = PageQuery { page: Some(i64::MAX), limit: Some(100) }.normalize(10);
        assert_eq!(page.offset(), i64::MAX);
        let info = page.info(12);
        assert!(!info.has_next);
        assert!(info.has_prev);
    }

    #[test]
    fn exact_multiple_has_no_phantom_page() {
        let info = PageQuery { page: Some(2), limit: Some(5) }.normalize(10).info(10);
        assert_eq!(info.total_pages, 2);
        assert!(!info.has_next);
    }
}
