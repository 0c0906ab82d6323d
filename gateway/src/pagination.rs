use crate::accumulator::AccumulatedSet;
use crate::types::{FilterSpec, RepositoryRecord};
use serde::Serialize;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 100;

/// The page of the accumulated set returned to the caller. Both values are
/// always at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    page: usize,
    limit: usize,
}

impl Default for PageWindow {
    fn default() -> Self {
        PageWindow {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageWindow {
    /// Parses the raw `page` and `limit` query values. Missing, non-numeric,
    /// zero or negative values fall back to the defaults.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        fn positive(raw: Option<&str>) -> Option<usize> {
            raw.and_then(|v| v.parse::<usize>().ok()).filter(|v| *v >= 1)
        }

        PageWindow {
            page: positive(page).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit).unwrap_or(DEFAULT_LIMIT),
        }
    }

    /// Organization listings are always returned as the default first page,
    /// whatever the caller asked for.
    pub fn for_request(filter: &FilterSpec, page: Option<&str>, limit: Option<&str>) -> Self {
        if filter.organization.is_some() {
            PageWindow::default()
        } else {
            PageWindow::parse(page, limit)
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns `items[(page - 1) * limit .. page * limit]`, clamped to the
    /// slice. A window past the end yields an empty slice.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.page - 1).saturating_mul(self.limit);
        if start >= items.len() {
            return &[];
        }
        let end = start.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}

/// Response body of `GET /repositories`.
#[derive(Debug, PartialEq, Serialize)]
pub struct RepositoriesResponse {
    /// Size of the whole accumulated set, not of this page.
    pub total_count: usize,
    pub repositories: Vec<RepositoryRecord>,
}

impl RepositoriesResponse {
    pub fn assemble(set: AccumulatedSet, window: PageWindow) -> Self {
        let records = set.into_records();
        RepositoriesResponse {
            total_count: records.len(),
            repositories: window.slice(&records).to_vec(),
        }
    }
}
