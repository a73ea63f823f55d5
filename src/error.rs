use crate::indexer_client::EntityKind;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexerError {
    #[error("indexer transport error: {0}")]
    Transport(String),
    #[error("indexer responded with http status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("indexer returned graphql errors: {0}")]
    GraphQl(String),
    #[error("invalid indexer payload: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("sync transport error: {0}")]
    Transport(String),
    #[error("sync service responded with http status {status}: {body}")]
    HttpStatus { status: u16, body: String },
}

/// Why a single poll attempt did not produce a confirmed entity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] IndexerError),
    #[error("no indexed {kind} with id {token_id}")]
    NotFound { kind: EntityKind, token_id: u64 },
    #[error("indexer returned {count} {kind} rows for id {token_id}")]
    Ambiguous {
        kind: EntityKind,
        token_id: u64,
        count: usize,
    },
    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("{kind} {token_id} not confirmed after {attempts} attempts: {last}")]
    Exhausted {
        kind: EntityKind,
        token_id: u64,
        attempts: u32,
        last: AttemptFailure,
    },
    #[error("indexer holds {count} {kind} rows for id {token_id}")]
    Ambiguous {
        kind: EntityKind,
        token_id: u64,
        count: usize,
    },
    #[error("polling cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
    #[error("token id {0} does not fit the indexer id range")]
    InvalidTokenId(String),
}

impl PollError {
    /// The failure that ended an exhausted poll, if the poll was exhausted.
    pub fn last_failure(&self) -> Option<&AttemptFailure> {
        match self {
            PollError::Exhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}
