use std::{
    fmt,
    future::Future,
    time::Duration,
};

use serde_json::{
    Map,
    Value,
};

use crate::{
    error::SyncError,
    indexer_client::EntityKind,
};

/// Backend hook that pulls a freshly indexed asset into the game services.
pub trait BackendSync {
    fn sync(
        &self,
        chain: &str,
        kind: EntityKind,
        token_id: u64,
    ) -> impl Future<Output = Result<(), SyncError>>;
}

#[derive(Clone)]
pub struct BackendSyncClient {
    endpoint: String,
    http: reqwest::Client,
}

impl BackendSyncClient {
    pub fn new(
        base_url: impl Into<String>,
        sync_path: &str,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let base_url = base_url.into();
        let endpoint = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            sync_path.trim_start_matches('/')
        );
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SyncError::Transport(format!("failed to build sync HTTP client: {e}"))
            })?;
        Ok(Self { endpoint, http })
    }

    fn body(chain: &str, kind: EntityKind, token_id: u64) -> Value {
        let mut body = Map::new();
        body.insert("chainName".to_string(), Value::from(chain));
        body.insert(kind.sync_field().to_string(), Value::from(token_id));
        Value::Object(body)
    }
}

impl BackendSync for BackendSyncClient {
    async fn sync(
        &self,
        chain: &str,
        kind: EntityKind,
        token_id: u64,
    ) -> Result<(), SyncError> {
        let res = self
            .http
            .post(&self.endpoint)
            .json(&Self::body(chain, kind, token_id))
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl fmt::Display for BackendSyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint)
    }
}
