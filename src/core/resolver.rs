use thiserror::Error;

use crate::core::drop_order::DropOrder;
use crate::models::{ProviderRecord, QueryFilters};
use crate::services::registry::{Registry, RegistryError};

/// Registry page-size bounds enforced before any network call.
pub const PAGE_SIZE_MIN: u32 = 10;
pub const PAGE_SIZE_MAX: u32 = 200;

/// Maximum cumulative skip the registry accepts.
pub const MAX_PAGE_SKIP: u32 = 1000;

/// Ceiling on total fetched results: max skip plus one full page.
pub const MAX_FETCH: u32 = MAX_PAGE_SKIP + PAGE_SIZE_MAX;

/// Tuning knobs for one resolver instance.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Results per page, must lie in `[PAGE_SIZE_MIN, PAGE_SIZE_MAX]`.
    pub page_size: u32,
    /// Highest skip offset paging may reach, must not exceed `MAX_FETCH`.
    pub stop_after: u32,
    /// Initial filter-set index into the drop order. The historical value
    /// of 3 starts one rung above full restriction; kept configurable.
    pub start_index: usize,
    pub drop_order: DropOrder,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            stop_after: MAX_FETCH,
            start_index: 3,
            drop_order: DropOrder::default(),
        }
    }
}

/// Rejected resolver options; raised at construction, never mid-search.
#[derive(Debug, Error)]
pub enum InvalidOptions {
    #[error("page_size {0} out of range [{PAGE_SIZE_MIN}, {PAGE_SIZE_MAX}]")]
    PageSize(u32),

    #[error("stop_after {0} exceeds fetch ceiling {MAX_FETCH}")]
    StopAfter(u32),

    #[error("start_index {index} out of range for a drop order of {len} groups")]
    StartIndex { index: usize, len: usize },
}

/// Terminal outcome classification for one record.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Every filter combination produced 0 or >1 matches. Permanent.
    #[error("no filter combination produced a unique match")]
    ExhaustedSearchSpace,

    /// The search revisited a filter index; no monotonic path to a unique
    /// match exists for this field combination. Permanent.
    #[error("filter relaxation oscillated without converging")]
    Oscillation,

    /// The registry was unreachable or answered malformed. Transient; the
    /// caller may retry on a later run.
    #[error("registry query failed: {0}")]
    Upstream(#[source] RegistryError),
}

#[derive(Debug)]
enum MatchCount {
    None,
    Unique(String),
    Ambiguous,
}

/// Resolves a provider record to a unique NPI by adaptively widening or
/// narrowing the active filter set.
///
/// Each decision depends on the previous query's match count: zero matches
/// means the filters were too restrictive (drop the next most distinguishing
/// group), more than one means too permissive (add a group back). A visited
/// history of filter indices detects oscillation between two rungs.
#[derive(Debug, Clone)]
pub struct Resolver {
    options: ResolverOptions,
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Result<Self, InvalidOptions> {
        if options.page_size < PAGE_SIZE_MIN || options.page_size > PAGE_SIZE_MAX {
            return Err(InvalidOptions::PageSize(options.page_size));
        }
        if options.stop_after > MAX_FETCH {
            return Err(InvalidOptions::StopAfter(options.stop_after));
        }
        if options.start_index >= options.drop_order.len() {
            return Err(InvalidOptions::StartIndex {
                index: options.start_index,
                len: options.drop_order.len(),
            });
        }
        Ok(Self { options })
    }

    pub fn with_default_options() -> Self {
        Self {
            options: ResolverOptions::default(),
        }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Find the unique registry identifier for a record.
    ///
    /// Sequential per record: every paged query must settle before the next
    /// index move, because the move depends on the previous count.
    pub async fn resolve<R: Registry>(
        &self,
        record: &ProviderRecord,
        registry: &R,
    ) -> Result<String, ResolveError> {
        let len = self.options.drop_order.len() as i64;
        let mut idx = self.options.start_index as i64;
        let mut visited: Vec<i64> = Vec::new();

        loop {
            if visited.contains(&idx) {
                tracing::warn!(
                    last_name = %record.last_name,
                    idx,
                    ?visited,
                    "relaxation ping-ponged; no unique match reachable"
                );
                return Err(ResolveError::Oscillation);
            }
            if idx < 0 || idx >= len {
                tracing::warn!(
                    last_name = %record.last_name,
                    idx,
                    "filter index left the drop order; search space exhausted"
                );
                return Err(ResolveError::ExhaustedSearchSpace);
            }
            visited.push(idx);

            let filters = self.options.drop_order.filters_for(record, idx as usize);
            let count = match self.count_matches(registry, &filters).await {
                Ok(count) => count,
                // A parameter combination the registry rejects tells us
                // nothing about scarcity; bias toward relaxing rather than
                // over-narrowing on a malformed query.
                Err(RegistryError::Validation(reason)) => {
                    tracing::debug!(idx, %reason, "registry rejected filter combination, treating as ambiguous");
                    MatchCount::Ambiguous
                }
                Err(err) => return Err(ResolveError::Upstream(err)),
            };

            match count {
                MatchCount::None => {
                    idx += 1;
                    tracing::debug!(idx, "too restrictive, dropping next filter group");
                }
                MatchCount::Unique(npi) => {
                    tracing::info!(%npi, last_name = %record.last_name, "resolved unique match");
                    return Ok(npi);
                }
                MatchCount::Ambiguous => {
                    idx -= 1;
                    tracing::debug!(idx, "not restrictive enough, adding filter group back");
                }
            }
        }
    }

    /// Count matches across result pages, short-circuiting the moment the
    /// running count exceeds one.
    async fn count_matches<R: Registry>(
        &self,
        registry: &R,
        filters: &QueryFilters,
    ) -> Result<MatchCount, RegistryError> {
        let mut total: u32 = 0;
        let mut unique: Option<String> = None;
        let mut skip: u32 = 0;

        while skip <= self.options.stop_after {
            let page = registry
                .fetch_page(filters, self.options.page_size, skip)
                .await?;

            if page.result_count == 0 {
                break;
            }
            total = total.saturating_add(page.result_count);
            if total > 1 {
                return Ok(MatchCount::Ambiguous);
            }
            if unique.is_none() {
                unique = page.results.first().map(|r| r.npi());
            }
            // A short page is the last page; no need to confirm with an
            // empty fetch.
            if page.result_count < self.options.page_size {
                break;
            }
            skip += self.options.page_size;
        }

        match total {
            0 => Ok(MatchCount::None),
            1 => match unique {
                Some(npi) => Ok(MatchCount::Unique(npi)),
                None => Err(RegistryError::InvalidResponse(
                    "result_count was 1 but the page carried no result object".to_string(),
                )),
            },
            _ => Ok(MatchCount::Ambiguous),
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::with_default_options()
    }
}
