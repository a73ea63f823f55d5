pub mod cancel;

pub mod config;

pub mod error;

pub mod indexer_client;

pub mod minting;

pub mod packs;

pub mod poller;

pub mod redemption;

pub mod rewards;

pub mod sync_client;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use cancel::{
    CancelHandle,
    CancelToken,
    cancellation,
};
pub use config::{
    AmbiguityPolicy,
    PollerConfig,
    RetryStrategy,
    ServiceEndpoints,
};
pub use error::{
    AttemptFailure,
    IndexerError,
    PollError,
    SyncError,
};
pub use indexer_client::{
    EntityIndex,
    EntityKind,
    IndexedEntity,
    IndexerClient,
};
pub use poller::{
    PollRequest,
    poll_entity,
};
pub use redemption::{
    RevealOutcome,
    reveal,
};
pub use sync_client::{
    BackendSync,
    BackendSyncClient,
};
