#![allow(non_snake_case)]

use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    str::FromStr,
    sync::Mutex,
    time::Duration,
};

use alloy_primitives::{
    Address,
    B256,
    Bytes,
    U256,
};
use deployments::Chain;

use crate::{
    error::{
        IndexerError,
        SyncError,
    },
    indexer_client::{
        EntityIndex,
        EntityKind,
        IndexedEntity,
    },
    rewards::{
        AssetKind,
        ReceiptLog,
        RewardContracts,
        RewardRecord,
        redeemer_address,
    },
    sync_client::BackendSync,
};

pub const OWNER: &str = "0x6f5d7ba06ad7b28319d86fcec09fae5bbc83d32f";

pub type IndexResponse = Result<Vec<IndexedEntity>, IndexerError>;

struct Script {
    queued: VecDeque<IndexResponse>,
    fallback: IndexResponse,
}

/// In-memory indexer that replays scripted answers per `(kind, id)`.
///
/// Queued responses are served first, then the fallback forever. Ids with no
/// script answer with no rows, like an indexer that has not caught up.
#[derive(Default)]
pub struct ScriptedIndex {
    scripts: Mutex<HashMap<(EntityKind, u64), Script>>,
    calls: Mutex<Vec<(EntityKind, String)>>,
    latency: Option<Duration>,
}

impl ScriptedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        self,
        kind: EntityKind,
        id: u64,
        queued: Vec<IndexResponse>,
        fallback: IndexResponse,
    ) -> Self {
        self.scripts.lock().unwrap().insert(
            (kind, id),
            Script {
                queued: queued.into(),
                fallback,
            },
        );
        self
    }

    /// Every query sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls_for(&self, kind: EntityKind, id: u64) -> usize {
        let id = id.to_string();
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, i)| *k == kind && *i == id)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl EntityIndex for ScriptedIndex {
    async fn entities(&self, kind: EntityKind, id: &str) -> IndexResponse {
        self.calls.lock().unwrap().push((kind, id.to_string()));
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let Ok(key) = id.parse::<u64>() else {
            return Ok(vec![]);
        };
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&(kind, key)) {
            Some(script) => script
                .queued
                .pop_front()
                .unwrap_or_else(|| script.fallback.clone()),
            None => Ok(vec![]),
        }
    }
}

/// Sync service stub that records every call and fails on demand.
#[derive(Default)]
pub struct RecordingSync {
    failures: Mutex<VecDeque<SyncError>>,
    calls: Mutex<Vec<(String, EntityKind, u64)>>,
}

impl RecordingSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next sync call. Calls past the queue succeed.
    pub fn fail_next(self, error: SyncError) -> Self {
        self.failures.lock().unwrap().push_back(error);
        self
    }

    pub fn calls(&self) -> Vec<(String, EntityKind, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl BackendSync for RecordingSync {
    async fn sync(&self, chain: &str, kind: EntityKind, token_id: u64) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push((chain.to_string(), kind, token_id));
        match self.failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub fn entity_with_id(id: u64) -> IndexedEntity {
    IndexedEntity {
        id: id.to_string(),
        owner: Address::from_str(OWNER).unwrap(),
        block_hash: format!("0x{id:064x}"),
        transaction_index: 0,
    }
}

pub fn found(id: u64) -> IndexResponse {
    Ok(vec![entity_with_id(id)])
}

pub fn empty() -> IndexResponse {
    Ok(vec![])
}

pub fn duplicated(id: u64) -> IndexResponse {
    Ok(vec![entity_with_id(id), entity_with_id(id)])
}

pub fn unreachable() -> IndexResponse {
    Err(IndexerError::Transport("connection refused".to_string()))
}

pub fn polygon_reward_contracts() -> RewardContracts {
    RewardContracts::from_record(&Chain::Polygon.builtin_record()).unwrap()
}

pub fn polygon_redeemer() -> Address {
    redeemer_address(&Chain::Polygon.builtin_record()).unwrap()
}

pub fn reward(asset_kind: AssetKind, token_id: u64) -> RewardRecord {
    RewardRecord {
        token_id: U256::from(token_id),
        contract_address: polygon_reward_contracts().address_of(asset_kind),
        asset_kind,
    }
}

/// Receipt log for a redeemer event; `indexed` puts the id in topic 1 instead of data.
pub fn minted_log(address: Address, signature: B256, id: u64, indexed: bool) -> ReceiptLog {
    let word = B256::from(U256::from(id).to_be_bytes::<32>());
    if indexed {
        ReceiptLog {
            address,
            topics: vec![signature, word],
            data: Bytes::new(),
        }
    } else {
        ReceiptLog {
            address,
            topics: vec![signature],
            data: Bytes::copy_from_slice(word.as_slice()),
        }
    }
}
