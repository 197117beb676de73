//! # RPC Fetcher
//!
//! Fetches `[from, head]` from a node. Short ranges go out as one retried
//! call and fail open; long ranges are split into batches of concurrent,
//! staggered sub-range requests. Sub-ranges that exhaust their retries are
//! retried once more after the last batch, and any still failing abort the
//! whole fetch: a truncated deposit list would break leaf contiguity.

use std::sync::Arc;

use futures::future::join_all;
use ps_telemetry::{metric_inc, BATCH_DURATION, EVENTS_FETCHED, RPC_RETRIES, SOURCE_FAILURES};
use shared_types::{BlockNumber, Event, NetworkId};
use tracing::{debug, error, info, warn};

use crate::algorithms::{plan_fetch, retry_range, FetchPlan, RetryOutcome};
use crate::config::SyncConfig;
use crate::domain::{BlockRange, EventSyncError, LogFilter};
use crate::ports::LogProvider;

/// Batched, retrying log fetcher bound to one network's provider.
pub struct RpcFetcher {
    provider: Arc<dyn LogProvider>,
    config: SyncConfig,
    network: String,
}

impl RpcFetcher {
    pub fn new(provider: Arc<dyn LogProvider>, config: SyncConfig, network_id: NetworkId) -> Self {
        Self {
            provider,
            config,
            network: network_id.to_string(),
        }
    }

    /// Current head according to the provider.
    pub async fn head(&self) -> Result<BlockNumber, EventSyncError> {
        self.provider.block_number().await
    }

    /// Every event matching `filter`'s address and kind in `[from, head]`.
    ///
    /// An unreachable head or an exhausted single call yields no events;
    /// only an unrecoverable batched fetch is an error.
    pub async fn fetch_from(
        &self,
        filter: &LogFilter,
        from: BlockNumber,
    ) -> Result<Vec<Event>, EventSyncError> {
        let head = match self.head().await {
            Ok(head) => head,
            Err(e) => {
                warn!(network = %self.network, error = %e, "Failed to read head block, skipping RPC fetch");
                metric_inc!(SOURCE_FAILURES, &["rpc"]);
                return Ok(Vec::new());
            }
        };

        let plan = plan_fetch(
            from,
            head,
            self.config.block_sync_interval,
            self.config.batch_size,
        );
        debug!(
            kind = %filter.kind,
            from_block = from,
            to_block = head,
            requests = plan.request_count(),
            "Planned log fetch"
        );

        let events = match plan {
            FetchPlan::Empty => Vec::new(),
            FetchPlan::Single(range) => self.fetch_single(filter, range).await,
            FetchPlan::Batched(batches) => {
                self.fetch_batched(filter, BlockRange::new(from, head), batches)
                    .await?
            }
        };

        EVENTS_FETCHED
            .with_label_values(&[filter.kind.collection_prefix(), "rpc"])
            .inc_by(events.len() as u64);
        Ok(events)
    }

    async fn fetch_single(&self, filter: &LogFilter, range: BlockRange) -> Vec<Event> {
        match self.fetch_range(filter, range, 0).await {
            RetryOutcome::Success { value, .. } => value,
            RetryOutcome::Exhausted { last_error, .. } => {
                warn!(
                    kind = %filter.kind,
                    %range,
                    error = %last_error,
                    "RPC fetch failed, continuing without RPC events"
                );
                metric_inc!(SOURCE_FAILURES, &["rpc"]);
                Vec::new()
            }
        }
    }

    async fn fetch_batched(
        &self,
        filter: &LogFilter,
        requested: BlockRange,
        batches: Vec<Vec<BlockRange>>,
    ) -> Result<Vec<Event>, EventSyncError> {
        let total = batches.len();
        let mut events = Vec::new();
        let mut failed = Vec::new();

        for (number, batch) in batches.into_iter().enumerate() {
            let _timer = BATCH_DURATION
                .with_label_values(&[&self.network])
                .start_timer();
            let (fetched, exhausted) = self.run_batch(filter, &batch).await;
            info!(
                kind = %filter.kind,
                batch = number + 1,
                total,
                events = fetched.len(),
                failed = exhausted.len(),
                "Fetched batch"
            );
            events.extend(fetched);
            failed.extend(exhausted);
        }

        if failed.is_empty() {
            return Ok(events);
        }

        warn!(
            kind = %filter.kind,
            ranges = failed.len(),
            "Retrying failed sub-ranges"
        );
        let (fetched, still_failed) = self.run_batch(filter, &failed).await;
        if !still_failed.is_empty() {
            error!(
                kind = %filter.kind,
                range = %requested,
                failed = still_failed.len(),
                "Failed to batch events"
            );
            metric_inc!(SOURCE_FAILURES, &["rpc"]);
            return Err(EventSyncError::BatchAborted {
                from_block: requested.from,
                to_block: requested.to,
                failed: still_failed.len(),
            });
        }
        events.extend(fetched);
        Ok(events)
    }

    /// Run one batch concurrently; returns the events and the exhausted ranges.
    async fn run_batch(
        &self,
        filter: &LogFilter,
        ranges: &[BlockRange],
    ) -> (Vec<Event>, Vec<BlockRange>) {
        let outcomes = join_all(
            ranges
                .iter()
                .enumerate()
                .map(|(position, range)| self.fetch_range(filter, *range, position)),
        )
        .await;

        let mut events = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                RetryOutcome::Success { value, .. } => events.extend(value),
                RetryOutcome::Exhausted { range, .. } => failed.push(range),
            }
        }
        (events, failed)
    }

    async fn fetch_range(
        &self,
        filter: &LogFilter,
        range: BlockRange,
        position: usize,
    ) -> RetryOutcome<Vec<Event>> {
        let stagger = self.config.stagger_for(position);
        if !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }

        let outcome = retry_range(range, self.config.retry_policy(), |range| {
            let provider = self.provider.clone();
            let request = filter.with_range(range);
            async move { provider.get_logs(&request).await }
        })
        .await;

        RPC_RETRIES.inc_by(u64::from(outcome.retries()));
        outcome
    }
}
