//! Reconciliation poller.
//!
//! A redemption transaction mints players and scouts on chain, but downstream game
//! services read them from an indexer that trails the chain. [`poll_entity`] keeps
//! asking the indexer for one minted entity until exactly one matching row shows
//! up, then asks the backend to sync it. A failed sync counts as a failed attempt,
//! so the whole fetch-and-sync step is retried together.

use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{
    debug,
    error,
    info,
    warn,
};

use crate::{
    cancel::CancelToken,
    config::{
        AmbiguityPolicy,
        PollerConfig,
        RetryStrategy,
    },
    error::{
        AttemptFailure,
        PollError,
    },
    indexer_client::{
        EntityIndex,
        EntityKind,
        IndexedEntity,
    },
    sync_client::BackendSync,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub chain: String,
    pub kind: EntityKind,
    pub token_id: u64,
}

impl PollRequest {
    pub fn new(chain: impl Into<String>, kind: EntityKind, token_id: u64) -> Self {
        Self {
            chain: chain.into(),
            kind,
            token_id,
        }
    }
}

pub async fn poll_entity<I, S>(
    index: &I,
    sync: &S,
    request: &PollRequest,
    config: &PollerConfig,
    cancel: &CancelToken,
) -> Result<IndexedEntity, PollError>
where
    I: EntityIndex,
    S: BackendSync,
{
    let max_attempts = config.max_attempts.max(1);
    let mut cancel = cancel.clone();
    let id = request.token_id.to_string();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { attempts: attempt });
        }
        attempt += 1;
        debug!(
            kind = %request.kind,
            chain = %request.chain,
            token_id = request.token_id,
            attempt,
            max_attempts,
            "querying indexer"
        );

        let outcome = tokio::select! {
            outcome = attempt_once(index, sync, request, &id) => outcome,
            _ = cancel.cancelled() => {
                return Err(PollError::Cancelled { attempts: attempt - 1 });
            }
        };

        let failure = match outcome {
            Ok(entity) => {
                info!(
                    kind = %request.kind,
                    chain = %request.chain,
                    token_id = request.token_id,
                    attempt,
                    "entity indexed and synced"
                );
                return Ok(entity);
            }
            Err(failure) => failure,
        };

        if let AttemptFailure::Ambiguous { count, .. } = &failure {
            error!(
                kind = %request.kind,
                chain = %request.chain,
                token_id = request.token_id,
                count,
                attempt,
                "indexer holds duplicate rows for one id"
            );
            if config.ambiguity == AmbiguityPolicy::FailFast {
                return Err(PollError::Ambiguous {
                    kind: request.kind,
                    token_id: request.token_id,
                    count: *count,
                });
            }
        }

        if attempt >= max_attempts {
            warn!(
                kind = %request.kind,
                chain = %request.chain,
                token_id = request.token_id,
                attempts = attempt,
                error = %failure,
                "giving up on entity"
            );
            return Err(PollError::Exhausted {
                kind: request.kind,
                token_id: request.token_id,
                attempts: attempt,
                last: failure,
            });
        }

        let delay = next_delay(&config.retry, attempt);
        warn!(
            kind = %request.kind,
            token_id = request.token_id,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %failure,
            "entity not ready, retrying after delay"
        );
        tokio::select! {
            _ = sleep(delay) => {}
            _ = cancel.cancelled() => {
                return Err(PollError::Cancelled { attempts: attempt });
            }
        }
    }
}

async fn attempt_once<I, S>(
    index: &I,
    sync: &S,
    request: &PollRequest,
    id: &str,
) -> Result<IndexedEntity, AttemptFailure>
where
    I: EntityIndex,
    S: BackendSync,
{
    let mut rows = index.entities(request.kind, id).await?;
    if rows.len() > 1 {
        return Err(AttemptFailure::Ambiguous {
            kind: request.kind,
            token_id: request.token_id,
            count: rows.len(),
        });
    }
    let Some(entity) = rows.pop() else {
        return Err(AttemptFailure::NotFound {
            kind: request.kind,
            token_id: request.token_id,
        });
    };
    if entity.id.trim() != id {
        warn!(
            kind = %request.kind,
            requested = id,
            returned = %entity.id,
            "indexer answered with a different id"
        );
        return Err(AttemptFailure::NotFound {
            kind: request.kind,
            token_id: request.token_id,
        });
    }
    sync.sync(&request.chain, request.kind, request.token_id)
        .await?;
    Ok(entity)
}

/// Upper bound of the wait that follows the given (1-based) failed attempt.
pub fn backoff_ceiling(retry: &RetryStrategy, attempt: u32) -> Duration {
    match *retry {
        RetryStrategy::Constant { delay } => delay,
        RetryStrategy::ExponentialJitter { base, max } => {
            let exp = attempt.saturating_sub(1).min(31);
            base.saturating_mul(1u32 << exp).min(max)
        }
    }
}

pub fn next_delay(retry: &RetryStrategy, attempt: u32) -> Duration {
    let ceiling = backoff_ceiling(retry, attempt);
    match retry {
        RetryStrategy::Constant { .. } => ceiling,
        RetryStrategy::ExponentialJitter { .. } => jittered(ceiling, &mut rand::rng()),
    }
}

// Equal jitter: half the ceiling is always waited, the other half is random.
fn jittered(ceiling: Duration, rng: &mut impl Rng) -> Duration {
    let half = ceiling / 2;
    let spread_ms = u64::try_from(ceiling.saturating_sub(half).as_millis()).unwrap_or(u64::MAX);
    half + Duration::from_millis(rng.random_range(0..=spread_ms))
}
