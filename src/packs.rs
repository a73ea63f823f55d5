//! Bundling of reward NFTs into Epic Box packs.
//!
//! Rewards are handed to the pack contract in chunks of `CHUNK_SIZE`. The first
//! chunk creates the pack when the creator holds none yet; later chunks are added
//! to pack `0`. A chunk that cannot fill whole packs is left out.

use std::collections::HashSet;

use alloy_primitives::{
    Address,
    U256,
};
use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;
use tracing::{
    debug,
    info,
    warn,
};

use crate::rewards::{
    AssetKind,
    RewardRecord,
};

pub const REWARDS_PER_PACK: usize = 3;
pub const CHUNK_SIZE: usize = REWARDS_PER_PACK * 3;
pub const PACK_ID: u64 = 0;

pub const PACK_NAME: &str = "MetaSoccer Epic Box";
pub const PACK_DESCRIPTION: &str =
    "MetaSoccer Epic Boxes are a limited collection of 1000 NFTs, each containing secret gifts.";
pub const PACK_IMAGE: &str =
    "https://ipfs.io/ipfs/QmRHEp1hS9pwt1jVNBMmyKgXvDeSqvrU8QVtbWpGKgMnZi";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
}

impl Default for PackMetadata {
    fn default() -> Self {
        Self {
            name: PACK_NAME.to_string(),
            description: PACK_DESCRIPTION.to_string(),
            image: PACK_IMAGE.to_string(),
        }
    }
}

/// One ERC-721 entry of a pack's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackReward {
    pub contract_address: Address,
    pub token_id: U256,
    pub quantity_per_reward: u32,
    pub total_rewards: u32,
}

impl From<&RewardRecord> for PackReward {
    fn from(record: &RewardRecord) -> Self {
        Self {
            contract_address: record.contract_address,
            token_id: record.token_id,
            quantity_per_reward: 1,
            total_rewards: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Holder {
    /// Marketing wallet; its NFTs move to the pack creator before bundling.
    Marketing,
    PackCreator,
}

/// A reward NFT and the wallet currently holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub holder: Holder,
    #[serde(flatten)]
    pub reward: RewardRecord,
}

impl Holding {
    pub fn needs_transfer(&self) -> bool {
        self.holder != Holder::PackCreator
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PackStep {
    #[serde(rename_all = "camelCase")]
    CreatePack {
        metadata: PackMetadata,
        rewards: Vec<PackReward>,
        rewards_per_pack: usize,
    },
    #[serde(rename_all = "camelCase")]
    AddContents {
        pack_id: u64,
        rewards: Vec<PackReward>,
    },
    Skip {
        rewards: Vec<PackReward>,
        reason: String,
    },
}

impl PackStep {
    pub fn rewards(&self) -> &[PackReward] {
        match self {
            PackStep::CreatePack { rewards, .. }
            | PackStep::AddContents { rewards, .. }
            | PackStep::Skip { rewards, .. } => rewards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackPlan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack_contract: Option<Address>,
    pub steps: Vec<PackStep>,
}

impl PackPlan {
    /// Address the pack steps are sent to.
    pub fn on_contract(mut self, pack_contract: Address) -> Self {
        self.pack_contract = Some(pack_contract);
        self
    }

    pub fn bundled(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| !matches!(step, PackStep::Skip { .. }))
            .map(|step| step.rewards().len())
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, PackStep::Skip { .. }))
            .map(|step| step.rewards().len())
            .sum()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PackPlanError {
    #[error("no rewards to bundle")]
    NoRewards,
    #[error("reward {token_id} of {contract} is listed more than once")]
    DuplicateReward { contract: Address, token_id: U256 },
}

/// Order holdings the way they are gathered: marketing wallet first, then the
/// pack creator, each split into land, players and scouts.
pub fn collect_rewards(holdings: &[Holding]) -> Vec<PackReward> {
    let mut ordered: Vec<&Holding> = holdings.iter().collect();
    ordered.sort_by_key(|h| (h.holder, kind_rank(h.reward.asset_kind)));
    let transfers = ordered.iter().filter(|h| h.needs_transfer()).count();
    debug!(holdings = ordered.len(), transfers, "collected pack rewards");
    ordered.into_iter().map(|h| PackReward::from(&h.reward)).collect()
}

fn kind_rank(kind: AssetKind) -> u8 {
    match kind {
        AssetKind::Land => 0,
        AssetKind::Player => 1,
        AssetKind::Scout => 2,
    }
}

/// Splits `rewards` into chunks of `CHUNK_SIZE`. A first chunk that does not fill
/// whole packs is skipped rather than used to create the pack.
pub fn plan_pack_contents(
    rewards: &[PackReward],
    existing_pack_balance: u64,
) -> Result<PackPlan, PackPlanError> {
    if rewards.is_empty() {
        return Err(PackPlanError::NoRewards);
    }
    let mut seen = HashSet::new();
    for reward in rewards {
        if !seen.insert((reward.contract_address, reward.token_id)) {
            return Err(PackPlanError::DuplicateReward {
                contract: reward.contract_address,
                token_id: reward.token_id,
            });
        }
    }

    let steps: Vec<_> = rewards
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(index, chunk)| plan_chunk(index, chunk, existing_pack_balance))
        .collect();
    let plan = PackPlan {
        pack_contract: None,
        steps,
    };
    info!(
        bundled = plan.bundled(),
        skipped = plan.skipped(),
        steps = plan.steps.len(),
        "planned pack contents"
    );
    Ok(plan)
}

fn plan_chunk(index: usize, chunk: &[PackReward], existing_pack_balance: u64) -> PackStep {
    let rewards = chunk.to_vec();
    if chunk.len() % REWARDS_PER_PACK != 0 {
        warn!(
            chunk = index,
            len = chunk.len(),
            "skipping chunk that does not fill whole packs"
        );
        return PackStep::Skip {
            rewards,
            reason: format!(
                "{} rewards is not a multiple of {REWARDS_PER_PACK}",
                chunk.len()
            ),
        };
    }
    if index == 0 && existing_pack_balance == 0 {
        PackStep::CreatePack {
            metadata: PackMetadata::default(),
            rewards,
            rewards_per_pack: REWARDS_PER_PACK,
        }
    } else {
        PackStep::AddContents {
            pack_id: PACK_ID,
            rewards,
        }
    }
}
