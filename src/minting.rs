use std::{
    fmt,
    str::FromStr,
};

use alloy_primitives::{
    Address,
    Bytes,
    U256,
};
use deployments::{
    Chain,
    DeploymentRecord,
};
use generated_abi::{
    SolCall,
    box_types::{
        mintToCall,
        safeMintCall,
    },
};
use serde::Serialize;
use thiserror::Error;

/// IPFS CID of the Epic Box token metadata.
pub const BOX_METADATA_CID: &str = "QmUz5hyETCGgd4xpFQvksi7JKGLEw684FxgYipfzTGHoTp";
pub const FIXED_GAS_LIMIT: u64 = 300_000;
/// 0.0001 native units, in wei.
pub const MIN_SIGNER_BALANCE_WEI: u128 = 100_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MintFunction {
    SafeMint,
    MintTo,
}

impl fmt::Display for MintFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MintFunction::SafeMint => "safeMint",
            MintFunction::MintTo => "mintTo",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GasLimit {
    /// Ask the node for an estimate before each send.
    Estimate,
    Fixed(u64),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MintPlanError {
    #[error("unsupported chain '{0}'")]
    UnknownChain(String),
    #[error("deployment for {chain} has an invalid box contract '{value}'")]
    InvalidBoxContract { chain: String, value: String },
    #[error("invalid recipient address '{0}'")]
    InvalidRecipient(String),
    #[error("amount must be a positive integer")]
    ZeroAmount,
}

/// Everything needed to mint `amount` Epic Boxes to one recipient. Signing and
/// sending the calls is left to an external signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MintPlan {
    pub chain: String,
    pub chain_name: String,
    pub symbol: String,
    pub rpc_url: String,
    pub box_contract: Address,
    pub recipient: Address,
    pub amount: u32,
    pub function: MintFunction,
    pub token_uri: String,
    pub gas_limit: GasLimit,
}

impl MintPlan {
    pub fn new(
        deployment: &DeploymentRecord,
        recipient: &str,
        amount: u32,
    ) -> Result<Self, MintPlanError> {
        let chain = Chain::from_str(&deployment.chain)
            .map_err(|_| MintPlanError::UnknownChain(deployment.chain.clone()))?;
        let box_contract = Address::from_str(deployment.box_contract.trim()).map_err(|_| {
            MintPlanError::InvalidBoxContract {
                chain: deployment.chain.clone(),
                value: deployment.box_contract.clone(),
            }
        })?;
        let recipient = Address::from_str(recipient.trim())
            .map_err(|_| MintPlanError::InvalidRecipient(recipient.to_string()))?;
        if amount == 0 {
            return Err(MintPlanError::ZeroAmount);
        }

        let (function, token_uri, gas_limit) = match chain {
            Chain::Polygon => (
                MintFunction::SafeMint,
                BOX_METADATA_CID.to_string(),
                GasLimit::Estimate,
            ),
            _ => (
                MintFunction::MintTo,
                format!("https://ipfs.io/ipfs/{BOX_METADATA_CID}"),
                GasLimit::Fixed(FIXED_GAS_LIMIT),
            ),
        };

        Ok(Self {
            chain: chain.slug().to_string(),
            chain_name: deployment.name.clone(),
            symbol: deployment.symbol.clone(),
            rpc_url: deployment.rpc_url.clone(),
            box_contract,
            recipient,
            amount,
            function,
            token_uri,
            gas_limit,
        })
    }

    /// One encoded mint call per token.
    pub fn calldata(&self) -> Vec<Bytes> {
        let call = match self.function {
            MintFunction::SafeMint => safeMintCall {
                to: self.recipient,
                tokenURI: self.token_uri.clone(),
            }
            .abi_encode(),
            MintFunction::MintTo => mintToCall {
                to: self.recipient,
                tokenURI: self.token_uri.clone(),
            }
            .abi_encode(),
        };
        let call = Bytes::from(call);
        (0..self.amount).map(|_| call.clone()).collect()
    }

    pub fn min_balance(&self) -> U256 {
        U256::from(MIN_SIGNER_BALANCE_WEI)
    }

    pub fn can_afford(&self, balance_wei: U256) -> bool {
        balance_wei >= self.min_balance()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    const RECIPIENT: &str = "0x94E42811Db93EF7831595b6fF9360491B987DFbD";

    #[test]
    fn new__uses_safe_mint_with_bare_cid_on_polygon() {
        let plan = MintPlan::new(&Chain::Polygon.builtin_record(), RECIPIENT, 2).unwrap();

        assert_eq!(plan.function, MintFunction::SafeMint);
        assert_eq!(plan.token_uri, BOX_METADATA_CID);
        assert_eq!(plan.gas_limit, GasLimit::Estimate);
        assert_eq!(
            plan.box_contract,
            Address::from_str("0xB7F21E3A4B2B3fD8b897201a2Fb47A973c8E5A2c").unwrap()
        );
    }

    #[test]
    fn new__uses_mint_to_with_gateway_uri_elsewhere() {
        for chain in [Chain::Matchain, Chain::Boba, Chain::Xdc] {
            let plan = MintPlan::new(&chain.builtin_record(), RECIPIENT, 1).unwrap();

            assert_eq!(plan.function, MintFunction::MintTo);
            assert_eq!(
                plan.token_uri,
                "https://ipfs.io/ipfs/QmUz5hyETCGgd4xpFQvksi7JKGLEw684FxgYipfzTGHoTp"
            );
            assert_eq!(plan.gas_limit, GasLimit::Fixed(300_000));
        }
    }

    #[test]
    fn new__rejects_bad_inputs() {
        let polygon = Chain::Polygon.builtin_record();

        assert_eq!(
            MintPlan::new(&polygon, "0x1234", 1),
            Err(MintPlanError::InvalidRecipient("0x1234".to_string()))
        );
        assert_eq!(
            MintPlan::new(&polygon, RECIPIENT, 0),
            Err(MintPlanError::ZeroAmount)
        );

        let mut unknown = polygon.clone();
        unknown.chain = "solana".to_string();
        assert_eq!(
            MintPlan::new(&unknown, RECIPIENT, 1),
            Err(MintPlanError::UnknownChain("solana".to_string()))
        );

        let mut broken = polygon;
        broken.box_contract = "not-a-contract".to_string();
        assert!(matches!(
            MintPlan::new(&broken, RECIPIENT, 1),
            Err(MintPlanError::InvalidBoxContract { .. })
        ));
    }

    #[test]
    fn calldata__encodes_one_call_per_token() {
        let plan = MintPlan::new(&Chain::Xdc.builtin_record(), RECIPIENT, 3).unwrap();

        let calls = plan.calldata();

        assert_eq!(calls.len(), 3);
        assert_eq!(&calls[0][..4], mintToCall::SELECTOR.as_slice());
        let decoded = mintToCall::abi_decode(&calls[0], true).unwrap();
        assert_eq!(decoded.to, plan.recipient);
        assert_eq!(decoded.tokenURI, plan.token_uri);
    }

    #[test]
    fn can_afford__requires_minimum_balance() {
        let plan = MintPlan::new(&Chain::Boba.builtin_record(), RECIPIENT, 1).unwrap();

        assert!(!plan.can_afford(U256::from(MIN_SIGNER_BALANCE_WEI - 1)));
        assert!(plan.can_afford(U256::from(MIN_SIGNER_BALANCE_WEI)));
    }
}
