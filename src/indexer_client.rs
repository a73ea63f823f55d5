use std::{
    collections::HashMap,
    fmt,
    future::Future,
    str::FromStr,
    time::Duration,
};

use alloy_primitives::Address;
use serde::{
    Deserialize,
    Serialize,
};

use crate::error::IndexerError;

/// Minted assets that the read-side index tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Scout,
}

impl EntityKind {
    /// GraphQL collection holding this kind of entity.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Player => "players",
            EntityKind::Scout => "scouts",
        }
    }

    /// Id field name the backend sync service expects for this kind.
    pub fn sync_field(self) -> &'static str {
        match self {
            EntityKind::Player => "playerNftId",
            EntityKind::Scout => "scoutNftId",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Player => "player",
            EntityKind::Scout => "scout",
        };
        write!(f, "{name}")
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "player" => Ok(EntityKind::Player),
            "scout" => Ok(EntityKind::Scout),
            other => Err(format!("unknown entity kind '{other}', expected player or scout")),
        }
    }
}

/// Read-only projection of a minted asset as the indexer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedEntity {
    pub id: String,
    pub owner: Address,
    pub block_hash: String,
    pub transaction_index: u64,
}

/// Query side of the indexer. Returns every row stored under `id`, which may be
/// none while the indexer lags behind the chain.
pub trait EntityIndex {
    fn entities(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> impl Future<Output = Result<Vec<IndexedEntity>, IndexerError>>;
}

#[derive(Clone)]
pub struct IndexerClient {
    url: String,
    http: reqwest::Client,
}

impl IndexerClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, IndexerError> {
        let url = url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                IndexerError::Transport(format!("failed to build indexer HTTP client: {e}"))
            })?;
        Ok(Self { url, http })
    }

    fn query_for(kind: EntityKind) -> String {
        format!(
            "query EntityById($id: String!) {{ {}(where: {{ id_eq: $id }}) {{ id owner blockHash transactionIndex }} }}",
            kind.collection()
        )
    }
}

impl EntityIndex for IndexerClient {
    async fn entities(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Vec<IndexedEntity>, IndexerError> {
        let query = Self::query_for(kind);
        let request = GraphQlRequest {
            query: &query,
            variables: IdVariables { id },
        };
        let res = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexerError::Transport(e.to_string()))?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(|e| {
            IndexerError::Transport(format!("failed to read indexer response body: {e}"))
        })?;
        if !status.is_success() {
            return Err(IndexerError::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let dto: GraphQlResponse = serde_json::from_slice(&bytes)
            .map_err(|e| IndexerError::Decode(e.to_string()))?;
        if !dto.errors.is_empty() {
            let messages: Vec<_> = dto.errors.into_iter().map(|e| e.message).collect();
            return Err(IndexerError::GraphQl(messages.join("; ")));
        }
        let mut data = dto
            .data
            .ok_or_else(|| IndexerError::GraphQl("response carried no data".to_string()))?;
        let rows = data.remove(kind.collection()).ok_or_else(|| {
            IndexerError::Decode(format!("response is missing `{}`", kind.collection()))
        })?;
        rows.into_iter().map(IndexedEntity::try_from).collect()
    }
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: IdVariables<'a>,
}

#[derive(Serialize)]
struct IdVariables<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<HashMap<String, Vec<IndexedEntityDto>>>,
    #[serde(default)]
    errors: Vec<GraphQlErrorDto>,
}

#[derive(Deserialize)]
struct GraphQlErrorDto {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexedEntityDto {
    id: String,
    owner: String,
    block_hash: String,
    transaction_index: u64,
}

impl TryFrom<IndexedEntityDto> for IndexedEntity {
    type Error = IndexerError;

    fn try_from(dto: IndexedEntityDto) -> Result<Self, Self::Error> {
        let owner = Address::from_str(dto.owner.trim()).map_err(|e| {
            IndexerError::Decode(format!("invalid owner address '{}': {e}", dto.owner))
        })?;
        Ok(IndexedEntity {
            id: dto.id,
            owner,
            block_hash: dto.block_hash,
            transaction_index: dto.transaction_index,
        })
    }
}

impl fmt::Display for IndexerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
