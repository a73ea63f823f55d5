//! Reveal of a redemption's rewards.
//!
//! Every player and scout reward is polled concurrently and the reveal resolves
//! only after all of them have settled, so a caller never shows a partial set.

use futures::future::join_all;
use thiserror::Error;
use tracing::{
    info,
    warn,
};

use crate::{
    cancel::CancelToken,
    config::PollerConfig,
    error::PollError,
    indexer_client::{
        EntityIndex,
        IndexedEntity,
    },
    poller::{
        PollRequest,
        poll_entity,
    },
    rewards::RewardRecord,
    sync_client::BackendSync,
};

/// A reward that is ready to show. Land rewards carry no indexed entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealedReward {
    pub reward: RewardRecord,
    pub entity: Option<IndexedEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardStatus {
    pub reward: RewardRecord,
    pub result: Result<Option<IndexedEntity>, PollError>,
}

impl RewardStatus {
    pub fn is_ready(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} of {total} rewards are not ready: {}", .failures.len(), describe(.failures))]
pub struct RevealError {
    pub total: usize,
    pub failures: Vec<(RewardRecord, PollError)>,
}

fn describe(failures: &[(RewardRecord, PollError)]) -> String {
    failures
        .iter()
        .map(|(reward, e)| format!("{} #{} ({e})", reward.asset_kind, reward.token_id))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Settled state of every reward in one redemption, in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealOutcome {
    pub chain: String,
    pub rewards: Vec<RewardStatus>,
}

impl RevealOutcome {
    pub fn is_ready(&self) -> bool {
        self.rewards.iter().all(RewardStatus::is_ready)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&RewardRecord, &PollError)> {
        self.rewards
            .iter()
            .filter_map(|status| status.result.as_ref().err().map(|e| (&status.reward, e)))
    }

    pub fn into_result(self) -> Result<Vec<RevealedReward>, RevealError> {
        let total = self.rewards.len();
        let mut revealed = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for status in self.rewards {
            match status.result {
                Ok(entity) => revealed.push(RevealedReward {
                    reward: status.reward,
                    entity,
                }),
                Err(e) => failures.push((status.reward, e)),
            }
        }
        if failures.is_empty() {
            Ok(revealed)
        } else {
            Err(RevealError { total, failures })
        }
    }

    /// Poll again every reward that failed, keeping the ones already confirmed.
    pub async fn retry_failed<I, S>(
        self,
        index: &I,
        sync: &S,
        config: &PollerConfig,
        cancel: &CancelToken,
    ) -> RevealOutcome
    where
        I: EntityIndex,
        S: BackendSync,
    {
        let retried = self.failures().count();
        let chain = self.chain;
        info!(chain = %chain, retried, "retrying failed rewards");
        let polls = self.rewards.into_iter().map(|status| {
            let chain = chain.as_str();
            async move {
                if status.is_ready() {
                    return status;
                }
                resolve(index, sync, chain, status.reward, config, cancel).await
            }
        });
        let rewards = join_all(polls).await;
        RevealOutcome { chain, rewards }
    }
}

pub async fn reveal<I, S>(
    index: &I,
    sync: &S,
    chain: &str,
    rewards: Vec<RewardRecord>,
    config: &PollerConfig,
    cancel: &CancelToken,
) -> RevealOutcome
where
    I: EntityIndex,
    S: BackendSync,
{
    let pending = rewards.iter().filter(|r| r.needs_indexer()).count();
    info!(chain, rewards = rewards.len(), pending, "revealing redemption rewards");
    let polls = rewards
        .into_iter()
        .map(|reward| resolve(index, sync, chain, reward, config, cancel));
    let outcome = RevealOutcome {
        chain: chain.to_string(),
        rewards: join_all(polls).await,
    };
    for (reward, error) in outcome.failures() {
        warn!(
            chain,
            asset = %reward.asset_kind,
            token_id = %reward.token_id,
            %error,
            "reward not ready"
        );
    }
    outcome
}

async fn resolve<I, S>(
    index: &I,
    sync: &S,
    chain: &str,
    reward: RewardRecord,
    config: &PollerConfig,
    cancel: &CancelToken,
) -> RewardStatus
where
    I: EntityIndex,
    S: BackendSync,
{
    let Some(kind) = reward.asset_kind.entity_kind() else {
        return RewardStatus {
            reward,
            result: Ok(None),
        };
    };
    let Some(token_id) = reward.token_id_u64() else {
        let result = Err(PollError::InvalidTokenId(reward.token_id.to_string()));
        return RewardStatus { reward, result };
    };
    let request = PollRequest::new(chain, kind, token_id);
    let result = poll_entity(index, sync, &request, config, cancel)
        .await
        .map(Some);
    RewardStatus { reward, result }
}
