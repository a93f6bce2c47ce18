use futures::stream::FuturesUnordered;
use futures::StreamExt;
use thiserror::Error;

use crate::core::resolver::{ResolveError, Resolver};
use crate::core::taxonomy::SpecialtyCrosswalk;
use crate::models::ProviderRecord;
use crate::services::registry::Registry;
use crate::services::store::{RosterRow, RosterStore, StoreError};

/// Per-row outcome classes written to the `npi_status` column.
pub mod status {
    pub const OK: &str = "ok";
    pub const EXHAUSTED: &str = "exhausted";
    pub const OSCILLATION: &str = "oscillation";
    pub const UPSTREAM: &str = "upstream_error";
    pub const INVALID: &str = "invalid_record";
}

/// Batch-level tuning knobs.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Concurrent in-flight resolutions; caps outbound network pressure.
    pub concurrency: usize,
    /// Re-resolve rows that already carry an NPI.
    pub overwrite: bool,
    /// Consecutive upstream failures that abort the batch as unreachable.
    pub max_upstream_failures: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            overwrite: false,
            max_upstream_failures: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("roster store error: {0}")]
    Store(#[from] StoreError),

    /// The registry host is down, not just flaky for one record. Progress
    /// written so far is preserved.
    #[error("registry unreachable after {failures} consecutive upstream failures")]
    RegistryUnreachable { failures: u32 },
}

/// Tallies for one batch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub resolved: usize,
    pub skipped: usize,
    pub exhausted: usize,
    pub oscillated: usize,
    pub upstream_failures: usize,
    pub invalid: usize,
}

/// Fill empty `specialty_code` cells from the free-text `specialty` column
/// via the crosswalk. Returns how many rows were filled.
pub fn fill_specialty_codes(rows: &mut [RosterRow], crosswalk: &SpecialtyCrosswalk) -> usize {
    let mut filled = 0;
    for row in rows.iter_mut() {
        if !row.record.specialty_code.trim().is_empty() || row.specialty.trim().is_empty() {
            continue;
        }
        if let Some(code) = crosswalk.code_for(&row.specialty) {
            row.record.specialty_code = code.to_string();
            filled += 1;
        }
    }
    if filled > 0 {
        tracing::info!(filled, "mapped specialty labels to taxonomy codes");
    }
    filled
}

async fn resolve_row<R: Registry>(
    index: usize,
    record: ProviderRecord,
    resolver: &Resolver,
    registry: &R,
) -> (usize, Result<String, ResolveError>) {
    (index, resolver.resolve(&record, registry).await)
}

/// Resolve every pending roster row against the registry.
///
/// Independent resolutions run concurrently up to `concurrency`; each owns
/// its own filter-index state so no locking is needed. The roster is saved
/// after every settled row so an interrupted run resumes without
/// re-resolving settled records.
pub async fn run_batch<R: Registry>(
    rows: &mut Vec<RosterRow>,
    resolver: &Resolver,
    registry: &R,
    store: &RosterStore,
    options: &BatchOptions,
) -> Result<BatchSummary, BatchError> {
    let mut summary = BatchSummary::default();

    let mut pending: Vec<usize> = Vec::new();
    for (i, row) in rows.iter_mut().enumerate() {
        if row.is_resolved() && !options.overwrite {
            summary.skipped += 1;
            continue;
        }
        if !row.record.has_name() {
            tracing::warn!(row = i, "row has no usable name fields, skipping");
            row.npi_status = status::INVALID.to_string();
            summary.invalid += 1;
            continue;
        }
        // Clear any stale identifier before attempting, so a crash mid-row
        // never leaves a half-trusted value behind.
        row.npi.clear();
        row.npi_status.clear();
        pending.push(i);
    }
    store.save(rows)?;

    let total = pending.len();
    if total == 0 {
        tracing::info!(skipped = summary.skipped, "nothing to resolve");
        return Ok(summary);
    }
    tracing::info!(total, skipped = summary.skipped, "starting resolution batch");

    let concurrency = options.concurrency.max(1);
    let mut queue = pending.into_iter();
    let mut in_flight = FuturesUnordered::new();
    for _ in 0..concurrency {
        if let Some(i) = queue.next() {
            in_flight.push(resolve_row(i, rows[i].record.clone(), resolver, registry));
        }
    }

    let mut upstream_streak: u32 = 0;
    while let Some((i, result)) = in_flight.next().await {
        let row = &mut rows[i];
        match result {
            Ok(npi) => {
                row.npi = npi;
                row.npi_status = status::OK.to_string();
                summary.resolved += 1;
                upstream_streak = 0;
            }
            Err(ResolveError::ExhaustedSearchSpace) => {
                row.npi_status = status::EXHAUSTED.to_string();
                summary.exhausted += 1;
                upstream_streak = 0;
            }
            Err(ResolveError::Oscillation) => {
                row.npi_status = status::OSCILLATION.to_string();
                summary.oscillated += 1;
                upstream_streak = 0;
            }
            Err(ResolveError::Upstream(err)) => {
                tracing::warn!(row = i, %err, "upstream failure, deferring row to a later run");
                row.npi_status = status::UPSTREAM.to_string();
                summary.upstream_failures += 1;
                upstream_streak += 1;
            }
        }
        store.save(rows)?;

        if upstream_streak >= options.max_upstream_failures {
            tracing::error!(
                failures = upstream_streak,
                "registry unreachable, aborting batch with progress preserved"
            );
            return Err(BatchError::RegistryUnreachable {
                failures: upstream_streak,
            });
        }

        if let Some(next) = queue.next() {
            in_flight.push(resolve_row(
                next,
                rows[next].record.clone(),
                resolver,
                registry,
            ));
        }
    }

    tracing::info!(
        resolved = summary.resolved,
        exhausted = summary.exhausted,
        oscillated = summary.oscillated,
        upstream = summary.upstream_failures,
        "batch complete"
    );
    Ok(summary)
}
