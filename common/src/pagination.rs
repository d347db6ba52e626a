// Page-number pagination: `?page=N&limit=M` → `{count, next, previous, results}`

use crate::config::PaginationConfig;
use serde::{Deserialize, Serialize};

/// Raw query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Resolve query parameters against configured defaults
    ///
    /// Page numbers start at 1; `limit` is clamped to `1..=max_page_size`.
    pub fn resolve(params: PageParams, config: &PaginationConfig) -> Self {
        let page = params.page.unwrap_or(1).max(1);
        let limit = params
            .limit
            .unwrap_or(config.page_size)
            .clamp(1, config.max_page_size.max(1));
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }
}

/// Paginated response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Build the envelope, linking neighbours relative to `base_path`
    ///
    /// `base_query` carries the caller's other query parameters (already
    /// encoded, without `page`/`limit`) so filters survive page navigation.
    pub fn new(
        results: Vec<T>,
        count: i64,
        request: PageRequest,
        base_path: &str,
        base_query: &str,
    ) -> Self {
        let link = |page: u32| {
            let mut url = format!("{}?page={}&limit={}", base_path, page, request.limit);
            if !base_query.is_empty() {
                url.push('&');
                url.push_str(base_query);
            }
            url
        };

        let shown_through = request.offset() + results.len() as i64;
        let next = (shown_through < count).then(|| link(request.page + 1));
        let previous = (request.page > 1).then(|| link(request.page - 1));

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig {
            page_size: 6,
            max_page_size: 50,
        }
    }

    #[test]
    fn test_defaults_apply() {
        let req = PageRequest::resolve(PageParams::default(), &config());
        assert_eq!(req, PageRequest { page: 1, limit: 6 });
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_limit_is_clamped() {
        let req = PageRequest::resolve(
            PageParams {
                page: Some(0),
                limit: Some(1000),
            },
            &config(),
        );
        assert_eq!(req, PageRequest { page: 1, limit: 50 });
    }

    #[test]
    fn test_middle_page_links_both_ways() {
        let req = PageRequest { page: 2, limit: 2 };
        let page = Page::new(vec![3, 4], 5, req, "/api/recipes/", "author=abc");
        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?page=3&limit=2&author=abc")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?page=1&limit=2&author=abc")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let req = PageRequest { page: 3, limit: 2 };
        let page = Page::new(vec![5], 5, req, "/api/users/", "");
        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/api/users/?page=2&limit=2"));
    }
}
