use std::{
    fmt,
    str::FromStr,
};

use alloy_primitives::{
    Address,
    B256,
    Bytes,
    U256,
};
use deployments::DeploymentRecord;
use generated_abi::{
    SolEvent,
    redeemer_types::{
        LandTicketTransferred,
        PlayerMinted,
        ScoutMinted,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::indexer_client::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Land,
    Player,
    Scout,
}

impl AssetKind {
    /// Indexer entity that must exist before the reward counts as ready.
    /// Land tickets are not indexed.
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            AssetKind::Land => None,
            AssetKind::Player => Some(EntityKind::Player),
            AssetKind::Scout => Some(EntityKind::Scout),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::Land => "Land",
            AssetKind::Player => "Player",
            AssetKind::Scout => "Scout",
        };
        f.pad(name)
    }
}

/// One asset minted or transferred to the user by a redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRecord {
    pub token_id: U256,
    pub contract_address: Address,
    pub asset_kind: AssetKind,
}

impl RewardRecord {
    pub fn needs_indexer(&self) -> bool {
        self.asset_kind.entity_kind().is_some()
    }

    pub fn token_id_u64(&self) -> Option<u64> {
        if self.token_id > U256::from(u64::MAX) {
            return None;
        }
        Some(self.token_id.as_limbs()[0])
    }
}

/// Collections that hold the reward assets on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardContracts {
    pub land: Address,
    pub player: Address,
    pub scout: Address,
}

impl RewardContracts {
    pub fn from_record(record: &DeploymentRecord) -> Result<Self, RewardDecodeError> {
        Ok(Self {
            land: record_address(record, "land", record.land_contract.as_deref())?,
            player: record_address(record, "player", record.player_contract.as_deref())?,
            scout: record_address(record, "scout", record.scout_contract.as_deref())?,
        })
    }

    pub fn address_of(&self, kind: AssetKind) -> Address {
        match kind {
            AssetKind::Land => self.land,
            AssetKind::Player => self.player,
            AssetKind::Scout => self.scout,
        }
    }
}

pub fn redeemer_address(record: &DeploymentRecord) -> Result<Address, RewardDecodeError> {
    record_address(record, "redeemer", record.redeemer_contract.as_deref())
}

pub fn pack_address(record: &DeploymentRecord) -> Result<Address, RewardDecodeError> {
    record_address(record, "pack", record.pack_contract.as_deref())
}

fn record_address(
    record: &DeploymentRecord,
    field: &'static str,
    value: Option<&str>,
) -> Result<Address, RewardDecodeError> {
    value
        .and_then(|raw| Address::from_str(raw.trim()).ok())
        .ok_or_else(|| RewardDecodeError::Deployment {
            chain: record.chain.clone(),
            field,
        })
}

/// A log entry as it appears in a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewardDecodeError {
    #[error("{event} log #{log_index} carries no token id")]
    MissingTokenId {
        event: &'static str,
        log_index: usize,
    },
    #[error("invalid receipt: {0}")]
    Receipt(String),
    #[error("deployment for {chain} has no usable {field} contract address")]
    Deployment { chain: String, field: &'static str },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReceiptDto {
    Receipt { logs: Vec<ReceiptLog> },
    Logs(Vec<ReceiptLog>),
}

/// Accepts either a full receipt object or a bare array of its logs.
pub fn parse_receipt_logs(json: &[u8]) -> Result<Vec<ReceiptLog>, RewardDecodeError> {
    let dto: ReceiptDto = serde_json::from_slice(json)
        .map_err(|e| RewardDecodeError::Receipt(e.to_string()))?;
    Ok(match dto {
        ReceiptDto::Receipt { logs } => logs,
        ReceiptDto::Logs(logs) => logs,
    })
}

/// Turn the redeemer's mint events into reward records, in log order.
///
/// Logs from any other contract, and redeemer events other than the three mint
/// events, are ignored.
pub fn decode_rewards(
    logs: &[ReceiptLog],
    redeemer: Address,
    contracts: &RewardContracts,
) -> Result<Vec<RewardRecord>, RewardDecodeError> {
    let mut records = Vec::new();
    for (log_index, log) in logs.iter().enumerate() {
        if log.address != redeemer {
            continue;
        }
        let Some(topic0) = log.topics.first() else {
            continue;
        };
        let Some((event, asset_kind)) = mint_event(topic0) else {
            continue;
        };
        let token_id = minted_id(log)
            .ok_or(RewardDecodeError::MissingTokenId { event, log_index })?;
        records.push(RewardRecord {
            token_id,
            contract_address: contracts.address_of(asset_kind),
            asset_kind,
        });
    }
    Ok(records)
}

fn mint_event(topic0: &B256) -> Option<(&'static str, AssetKind)> {
    if *topic0 == PlayerMinted::SIGNATURE_HASH {
        Some(("PlayerMinted", AssetKind::Player))
    } else if *topic0 == ScoutMinted::SIGNATURE_HASH {
        Some(("ScoutMinted", AssetKind::Scout))
    } else if *topic0 == LandTicketTransferred::SIGNATURE_HASH {
        Some(("LandTicketTransferred", AssetKind::Land))
    } else {
        None
    }
}

// The id is topic 1 when the event indexes it, otherwise the first data word.
fn minted_id(log: &ReceiptLog) -> Option<U256> {
    if let Some(topic) = log.topics.get(1) {
        return Some(U256::from_be_slice(topic.as_slice()));
    }
    log.data.get(..32).map(U256::from_be_slice)
}

pub fn marketplace_link(slug: &str, record: &RewardRecord) -> String {
    format!(
        "https://opensea.io/assets/{slug}/{}/{}",
        record.contract_address, record.token_id
    )
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::test_helpers::*;

    fn contracts() -> RewardContracts {
        polygon_reward_contracts()
    }

    #[test]
    fn decode_rewards__maps_each_mint_event_to_its_collection() {
        let redeemer = polygon_redeemer();
        let logs = vec![
            minted_log(redeemer, PlayerMinted::SIGNATURE_HASH, 11, true),
            minted_log(redeemer, ScoutMinted::SIGNATURE_HASH, 12, false),
            minted_log(redeemer, LandTicketTransferred::SIGNATURE_HASH, 13, true),
        ];

        let rewards = decode_rewards(&logs, redeemer, &contracts()).unwrap();

        assert_eq!(
            rewards,
            vec![
                RewardRecord {
                    token_id: U256::from(11),
                    contract_address: contracts().player,
                    asset_kind: AssetKind::Player,
                },
                RewardRecord {
                    token_id: U256::from(12),
                    contract_address: contracts().scout,
                    asset_kind: AssetKind::Scout,
                },
                RewardRecord {
                    token_id: U256::from(13),
                    contract_address: contracts().land,
                    asset_kind: AssetKind::Land,
                },
            ]
        );
    }

    #[test]
    fn decode_rewards__ignores_logs_from_other_contracts_and_unknown_events() {
        let redeemer = polygon_redeemer();
        let logs = vec![
            minted_log(contracts().player, PlayerMinted::SIGNATURE_HASH, 1, true),
            minted_log(redeemer, B256::repeat_byte(0xee), 2, true),
            ReceiptLog {
                address: redeemer,
                topics: vec![],
                data: Bytes::new(),
            },
        ];

        let rewards = decode_rewards(&logs, redeemer, &contracts()).unwrap();

        assert!(rewards.is_empty());
    }

    #[test]
    fn decode_rewards__rejects_mint_event_without_id() {
        let redeemer = polygon_redeemer();
        let logs = vec![ReceiptLog {
            address: redeemer,
            topics: vec![ScoutMinted::SIGNATURE_HASH],
            data: Bytes::from(vec![0u8; 4]),
        }];

        let err = decode_rewards(&logs, redeemer, &contracts()).unwrap_err();

        assert_eq!(
            err,
            RewardDecodeError::MissingTokenId {
                event: "ScoutMinted",
                log_index: 0
            }
        );
    }

    #[test]
    fn parse_receipt_logs__accepts_receipt_object_with_lowercase_addresses() {
        let json = format!(
            r#"{{
                "transactionHash": "0x01",
                "logs": [{{
                    "address": "{}",
                    "topics": ["{}", "0x000000000000000000000000000000000000000000000000000000000000002a"],
                    "data": "0x"
                }}]
            }}"#,
            format!("{:#x}", polygon_redeemer()),
            format!("{:#x}", PlayerMinted::SIGNATURE_HASH)
        );

        let logs = parse_receipt_logs(json.as_bytes()).unwrap();
        let rewards = decode_rewards(&logs, polygon_redeemer(), &contracts()).unwrap();

        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].token_id, U256::from(42));
    }

    #[test]
    fn parse_receipt_logs__accepts_bare_log_array() {
        let logs = parse_receipt_logs(b"[]").unwrap();
        assert!(logs.is_empty());
        assert!(parse_receipt_logs(b"{\"status\": 1}").is_err());
    }

    #[test]
    fn token_id_u64__rejects_ids_beyond_u64() {
        let mut record = RewardRecord {
            token_id: U256::from(u64::MAX),
            contract_address: contracts().player,
            asset_kind: AssetKind::Player,
        };
        assert_eq!(record.token_id_u64(), Some(u64::MAX));

        record.token_id = U256::from(u64::MAX) + U256::from(1);
        assert_eq!(record.token_id_u64(), None);
    }

    #[test]
    fn from_record__requires_reward_collections() {
        let polygon = deployments::Chain::Polygon.builtin_record();
        let contracts = RewardContracts::from_record(&polygon).unwrap();
        assert_eq!(
            contracts.player,
            Address::from_str("0x6f5D7bA06aD7B28319d86fceC09fae5bbC83d32F").unwrap()
        );

        let boba = deployments::Chain::Boba.builtin_record();
        assert_eq!(
            RewardContracts::from_record(&boba).unwrap_err(),
            RewardDecodeError::Deployment {
                chain: "boba".to_string(),
                field: "land"
            }
        );
        assert!(redeemer_address(&boba).is_err());
    }

    #[test]
    fn pack_address__reads_recorded_pack_contract() {
        let polygon = deployments::Chain::Polygon.builtin_record();
        assert_eq!(
            pack_address(&polygon).unwrap(),
            Address::from_str("0x019C38026dE05862ef332cf5A17f245876D15674").unwrap()
        );

        let xdc = deployments::Chain::Xdc.builtin_record();
        assert_eq!(
            pack_address(&xdc).unwrap_err(),
            RewardDecodeError::Deployment {
                chain: "xdc".to_string(),
                field: "pack"
            }
        );
    }

    #[test]
    fn marketplace_link__points_at_collection_and_token() {
        let record = RewardRecord {
            token_id: U256::from(77),
            contract_address: contracts().player,
            asset_kind: AssetKind::Player,
        };

        let link = marketplace_link("matic", &record);

        assert_eq!(
            link,
            format!("https://opensea.io/assets/matic/{}/77", contracts().player)
        );
    }
}
