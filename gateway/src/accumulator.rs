use crate::config::AccumulationConfig;
use crate::metrics_defs::{ACCUMULATION_RECORDS, ACCUMULATION_UPSTREAM_CALLS};
use crate::types::{FilterSpec, RepositoryRecord};
use crate::upstream::{PAGE_SIZE, PageQuery, RepositorySource, UpstreamError};
use chrono::NaiveDate;
use indexmap::IndexMap;
use shared::histogram;
use std::sync::Arc;

/// Search mode stops walking back once this many distinct repositories
/// have been collected.
pub const TARGET_COUNT: usize = 100;

/// Repositories collected for a single request, in the order they were first
/// seen and unique by full name.
#[derive(Debug, Default)]
pub struct AccumulatedSet {
    records: IndexMap<String, RepositoryRecord>,
}

impl AccumulatedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.records.contains_key(full_name)
    }

    /// Inserts the record unless one with the same full name is already
    /// present. Returns true if the record was added.
    pub fn insert(&mut self, record: RepositoryRecord) -> bool {
        if self.records.contains_key(&record.full_name) {
            return false;
        }
        self.records.insert(record.full_name.clone(), record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<RepositoryRecord> {
        self.records.into_values().collect()
    }
}

impl FromIterator<RepositoryRecord> for AccumulatedSet {
    fn from_iter<I: IntoIterator<Item = RepositoryRecord>>(iter: I) -> Self {
        let mut set = AccumulatedSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

/// How the upstream is walked for one request. Selected once from the
/// filters: an organization means an exhaustive listing filtered locally,
/// anything else a date-windowed search filtered upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy<'a> {
    Organization(&'a str),
    Search,
}

impl<'a> Strategy<'a> {
    pub fn select(filter: &'a FilterSpec) -> Self {
        match filter.organization.as_deref() {
            Some(org) => Strategy::Organization(org),
            None => Strategy::Search,
        }
    }
}

/// Drives the upstream source until enough repositories have been collected
/// for one request. Holds no per-request state.
#[derive(Clone)]
pub struct Accumulator {
    source: Arc<dyn RepositorySource>,
    limits: AccumulationConfig,
}

impl Accumulator {
    pub fn new(source: Arc<dyn RepositorySource>, limits: AccumulationConfig) -> Self {
        Accumulator { source, limits }
    }

    /// Collects the repositories matching `filter`. `today` is the first day
    /// of the search window. Any upstream failure aborts the whole
    /// accumulation.
    pub async fn accumulate(
        &self,
        filter: &FilterSpec,
        today: NaiveDate,
    ) -> Result<AccumulatedSet, UpstreamError> {
        let (set, calls) = match Strategy::select(filter) {
            Strategy::Organization(org) => self.walk_organization(org, filter).await?,
            Strategy::Search => self.walk_search_windows(filter, today).await?,
        };

        histogram!(ACCUMULATION_UPSTREAM_CALLS).record(calls as f64);
        histogram!(ACCUMULATION_RECORDS).record(set.len() as f64);
        tracing::debug!(calls, records = set.len(), "accumulation finished");

        Ok(set)
    }

    /// Lists every page of the organization until a short or empty page,
    /// keeping only records that pass the language and license filters.
    /// Stopping at `max_organization_pages` returns the partial set as is.
    async fn walk_organization(
        &self,
        org: &str,
        filter: &FilterSpec,
    ) -> Result<(AccumulatedSet, u32), UpstreamError> {
        let mut set = AccumulatedSet::new();
        let mut page = 1;

        loop {
            let query = PageQuery::Organization {
                org: org.to_string(),
                page,
            };
            let records = self.source.fetch_page(&query).await?;
            let fetched = records.len();
            tracing::debug!(org, page, fetched, "organization page fetched");

            if fetched == 0 {
                break;
            }

            for record in records {
                if !set.contains(&record.full_name) && filter.matches(&record) {
                    set.insert(record);
                }
            }

            if fetched < PAGE_SIZE {
                break;
            }

            if page >= self.limits.max_organization_pages {
                tracing::warn!(
                    org,
                    pages = page,
                    "organization page limit reached, returning partial listing"
                );
                break;
            }
            page += 1;
        }

        Ok((set, page))
    }

    /// Searches for repositories created on or after a date cursor that
    /// starts today and moves back one day after every short page, until the
    /// target count is met, a full page comes back, or the window cap is
    /// reached.
    async fn walk_search_windows(
        &self,
        filter: &FilterSpec,
        today: NaiveDate,
    ) -> Result<(AccumulatedSet, u32), UpstreamError> {
        let mut set = AccumulatedSet::new();
        let mut created_from = today;
        let mut windows = 0;

        while set.len() < TARGET_COUNT && windows < self.limits.max_search_windows {
            let query = PageQuery::Search {
                created_from,
                language: filter.language.clone(),
                license: filter.license.clone(),
                page: 1,
            };
            let records = self.source.fetch_page(&query).await?;
            windows += 1;

            let fetched = records.len();
            let mut added = 0;
            for record in records {
                if set.insert(record) {
                    added += 1;
                }
            }
            tracing::debug!(%created_from, fetched, added, total = set.len(), "search window fetched");

            if fetched >= PAGE_SIZE {
                break;
            }

            match created_from.pred_opt() {
                Some(previous) => created_from = previous,
                None => break,
            }
        }

        if set.len() < TARGET_COUNT && windows >= self.limits.max_search_windows {
            tracing::info!(
                windows,
                records = set.len(),
                "search window limit reached before target count"
            );
        }

        Ok((set, windows))
    }
}
