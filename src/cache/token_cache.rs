use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::FetchError;
use crate::observability::metrics::get_metrics;
use crate::sources::fetch::FetchToken;

/// Single shared credential with single-flight refresh.
///
/// Reads go through `token`; `refresh` is only held by the task that talks to
/// the token endpoint so concurrent misses wait instead of fetching again.
#[derive(Debug, Default)]
pub struct TokenCache {
    token: RwLock<String>,
    refresh: Mutex<()>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current credential, empty when unset. Never fetches.
    pub async fn get_token(&self) -> String {
        self.token.read().await.clone()
    }

    pub async fn clear_token(&self) {
        self.token.write().await.clear();
        get_metrics().await.token_cache_clears.inc();
        debug!("cached token cleared");
    }

    /// Return the cached credential, fetching it through `fetcher` when unset.
    ///
    /// A failed fetch leaves the cache unset and is not retried here.
    pub async fn ensure_token<F>(&self, fetcher: &F) -> Result<String, FetchError>
    where
        F: FetchToken + Sync,
    {
        let current = self.get_token().await;
        if !current.is_empty() {
            return Ok(current);
        }

        let _refresh = self.refresh.lock().await;

        // another task may have published while we waited for the lock
        let current = self.get_token().await;
        if !current.is_empty() {
            return Ok(current);
        }

        let token = fetcher.fetch_token().await?;
        if token.is_empty() {
            return Err(FetchError::Empty);
        }

        *self.token.write().await = token.clone();
        info!("token refreshed, length {}", token.len());
        Ok(token)
    }
}
