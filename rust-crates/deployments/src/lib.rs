use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Chain {
    Polygon,
    Matchain,
    Boba,
    Xdc,
}

impl Chain {
    pub const ALL: [Chain; 4] = [Chain::Polygon, Chain::Matchain, Chain::Boba, Chain::Xdc];

    /// Identifier used on the wire (`chainName`) and as the store directory name.
    pub fn slug(self) -> &'static str {
        match self {
            Chain::Polygon => "polygon",
            Chain::Matchain => "matchain",
            Chain::Boba => "boba",
            Chain::Xdc => "xdc",
        }
    }

    pub fn builtin_record(self) -> DeploymentRecord {
        match self {
            Chain::Polygon => DeploymentRecord {
                chain: self.slug().to_string(),
                name: "Polygon".to_string(),
                symbol: "POL".to_string(),
                rpc_url: "https://polygon-rpc.com".to_string(),
                box_contract: "0xB7F21E3A4B2B3fD8b897201a2Fb47A973c8E5A2c".to_string(),
                redeemer_contract: Some(
                    "0x312cC0B8e2b2F81cef459f40F821fcDda6Ab4e67".to_string(),
                ),
                land_contract: Some(
                    "0x1C80e3D799eBf28E47C488EcdABd7ea47B5d8595".to_string(),
                ),
                player_contract: Some(
                    "0x6f5D7bA06aD7B28319d86fceC09fae5bbC83d32F".to_string(),
                ),
                scout_contract: Some(
                    "0x94E42811Db93EF7831595b6fF9360491B987DFbD".to_string(),
                ),
                pack_contract: Some(
                    "0x019C38026dE05862ef332cf5A17f245876D15674".to_string(),
                ),
                indexer_url: None,
                sync_url: None,
                marketplace_slug: Some("matic".to_string()),
                recorded_at: None,
            },
            Chain::Matchain => DeploymentRecord::box_only(
                self,
                "Matchain",
                "BNB",
                "https://rpc.ankr.com/matchain_mainnet",
                "0x47120974eaa4D7AE806c9DD5fbAAC823B18419FC",
            ),
            Chain::Boba => DeploymentRecord::box_only(
                self,
                "Boba Network",
                "ETH",
                "https://mainnet.boba.network",
                "0x5d8963198C66BEDa41Fcbc9485323FaC749Dc38C",
            ),
            Chain::Xdc => DeploymentRecord::box_only(
                self,
                "XDC",
                "XDC",
                "https://earpc.xinfin.network",
                "0x331936B75f6ebC061723e30B3A9AbD692d1cD460",
            ),
        }
    }
}

impl FromStr for Chain {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Chain::ALL
            .into_iter()
            .find(|chain| chain.slug() == lowered)
            .ok_or_else(|| {
                let supported: Vec<_> = Chain::ALL.iter().map(|c| c.slug()).collect();
                anyhow!(
                    "Invalid chain '{raw}'. Supported chains: {}",
                    supported.join(", ")
                )
            })
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// Contract addresses and service endpoints known for one chain.
///
/// Addresses are kept as the hex strings they were recorded with; callers parse
/// them into typed addresses when they need one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub chain: String,
    pub name: String,
    pub symbol: String,
    pub rpc_url: String,
    pub box_contract: String,
    #[serde(default)]
    pub redeemer_contract: Option<String>,
    #[serde(default)]
    pub land_contract: Option<String>,
    #[serde(default)]
    pub player_contract: Option<String>,
    #[serde(default)]
    pub scout_contract: Option<String>,
    #[serde(default)]
    pub pack_contract: Option<String>,
    #[serde(default)]
    pub indexer_url: Option<String>,
    #[serde(default)]
    pub sync_url: Option<String>,
    #[serde(default)]
    pub marketplace_slug: Option<String>,
    #[serde(default)]
    pub recorded_at: Option<String>,
}

impl DeploymentRecord {
    fn box_only(
        chain: Chain,
        name: &str,
        symbol: &str,
        rpc_url: &str,
        box_contract: &str,
    ) -> Self {
        Self {
            chain: chain.slug().to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            rpc_url: rpc_url.to_string(),
            box_contract: box_contract.to_string(),
            redeemer_contract: None,
            land_contract: None,
            player_contract: None,
            scout_contract: None,
            pack_contract: None,
            indexer_url: None,
            sync_url: None,
            marketplace_slug: None,
            recorded_at: None,
        }
    }

    pub fn is_for(&self, chain: Chain) -> bool {
        self.chain.eq_ignore_ascii_case(chain.slug())
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    chain: Chain,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(chain: Chain) -> Self {
        Self::with_root(DEPLOYMENTS_ROOT, chain)
    }

    /// Nothing is touched on disk until a record is saved.
    pub fn with_root(root: impl AsRef<Path>, chain: Chain) -> Self {
        let path = root.as_ref().join(chain.slug()).join(DEPLOYMENTS_FILE);
        Self { chain, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let record = read_record(&self.path)?;
        match record {
            Some(record) if !record.is_for(self.chain) => Err(anyhow!(
                "Deployment record at {} is for chain '{}', expected '{}'",
                self.path.display(),
                record.chain,
                self.chain
            )),
            other => Ok(other),
        }
    }

    /// Stored record when one exists, otherwise the built-in record for the chain.
    pub fn resolve(&self) -> Result<DeploymentRecord> {
        Ok(self
            .load()?
            .unwrap_or_else(|| self.chain.builtin_record()))
    }

    pub fn save(&self, mut record: DeploymentRecord) -> Result<()> {
        if !record.is_for(self.chain) {
            return Err(anyhow!(
                "Refusing to store a '{}' record in the '{}' store",
                record.chain,
                self.chain
            ));
        }
        ensure_store_dir(&self.path)?;
        record.recorded_at = Some(Utc::now().to_rfc3339());
        write_record(&self.path, &record)
    }
}

fn ensure_store_dir(file_path: &Path) -> Result<()> {
    let Some(chain_dir) = file_path.parent() else {
        return Ok(());
    };
    if !chain_dir.exists() {
        fs::create_dir_all(chain_dir).with_context(|| {
            format!("Failed to create {} directory", chain_dir.display())
        })?;
    }
    Ok(())
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) || data.is_empty() {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}
