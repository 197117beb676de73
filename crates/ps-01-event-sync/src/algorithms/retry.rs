//! # Bounded Retry
//!
//! Retries one sub-range request with linear backoff.
//!
//! A provider error naming the last accepted block is not a failure: the
//! range end is clamped to that block and the failure count resets. Each
//! clamp strictly lowers the range end, so the loop always terminates.

use std::future::Future;
use std::time::Duration;

use shared_types::BlockNumber;
use tracing::{debug, warn};

use crate::domain::{BlockRange, EventSyncError, ACCEPTED_BLOCK_MARKER};

/// Attempt budget and backoff for one sub-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Calls allowed before the range is reported as exhausted
    pub max_attempts: u32,
    /// Backoff unit; failure `n` waits `n * base_delay`
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the call following failure number `failures`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        self.base_delay * failures
    }
}

/// Typed outcome of a retried request.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The request succeeded over `range` (possibly clamped).
    Success {
        /// Response
        value: T,
        /// Range actually covered
        range: BlockRange,
        /// Failed calls before success
        retries: u32,
    },
    /// Every attempt failed.
    Exhausted {
        /// Range of the last attempt
        range: BlockRange,
        /// Failed calls
        retries: u32,
        /// Error of the last attempt
        last_error: EventSyncError,
    },
}

impl<T> RetryOutcome<T> {
    /// Range of the final attempt.
    pub fn range(&self) -> BlockRange {
        match self {
            RetryOutcome::Success { range, .. } | RetryOutcome::Exhausted { range, .. } => *range,
        }
    }

    /// Failed calls made along the way.
    pub fn retries(&self) -> u32 {
        match self {
            RetryOutcome::Success { retries, .. } | RetryOutcome::Exhausted { retries, .. } => {
                *retries
            }
        }
    }
}

/// Extract `N` from "... after last accepted block N ...".
pub fn parse_accepted_block(message: &str) -> Option<BlockNumber> {
    let (_, tail) = message.split_once(ACCEPTED_BLOCK_MARKER)?;
    let digits: String = tail
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Run `request` over `range` until it succeeds or the budget is spent.
///
/// An accepted block below `range.from` means the node has nothing to offer
/// for this range yet and yields an empty success.
pub async fn retry_range<T, F, Fut>(
    range: BlockRange,
    policy: RetryPolicy,
    mut request: F,
) -> RetryOutcome<T>
where
    T: Default,
    F: FnMut(BlockRange) -> Fut,
    Fut: Future<Output = Result<T, EventSyncError>>,
{
    let mut range = range;
    let mut failures = 0u32;
    let mut retries = 0u32;

    loop {
        let error = match request(range).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    range,
                    retries,
                }
            }
            Err(error) => error,
        };

        match parse_accepted_block(&error.to_string()) {
            Some(accepted) if accepted < range.from => {
                debug!(%range, accepted, "Accepted block precedes range, nothing to fetch");
                return RetryOutcome::Success {
                    value: T::default(),
                    range: range.with_to(accepted),
                    retries,
                };
            }
            Some(accepted) if accepted < range.to => {
                debug!(%range, accepted, "Clamping range to last accepted block");
                range = range.with_to(accepted);
                failures = 0;
                continue;
            }
            _ => {}
        }

        failures += 1;
        retries += 1;
        if failures >= policy.max_attempts {
            warn!(%range, attempts = failures, error = %error, "Sub-range exhausted retries");
            return RetryOutcome::Exhausted {
                range,
                retries,
                last_error: error,
            };
        }

        debug!(%range, attempt = failures, error = %error, "Retrying sub-range");
        tokio::time::sleep(policy.delay_for(failures)).await;
    }
}
