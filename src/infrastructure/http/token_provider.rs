//! Refreshing bearer tokens shared by all workers of a connection

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::domain::errors::CollectorResult;
use crate::domain::models::{RefreshedToken, TokenState};
use crate::domain::ports::{TokenRefresher, TokenStore};

/// An access token together with the generation it belongs to
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub generation: u64,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Hands out access tokens, refreshing them before they expire.
///
/// Readers share a read lock while the token is valid. A refresh holds the
/// write lock for the whole round trip, so concurrent callers that find an
/// expired token queue behind it and observe the new token instead of
/// refreshing again.
pub struct TokenProvider {
    connection_id: u64,
    state: RwLock<TokenState>,
    refresher: Arc<dyn TokenRefresher>,
    store: Option<Arc<dyn TokenStore>>,
    buffer: chrono::Duration,
}

impl TokenProvider {
    pub fn new(
        connection_id: u64,
        initial: TokenState,
        refresher: Arc<dyn TokenRefresher>,
        buffer: chrono::Duration,
    ) -> Self {
        Self {
            connection_id,
            state: RwLock::new(initial),
            refresher,
            store: None,
            buffer,
        }
    }

    /// Persist refreshed tokens to `store`
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start from the persisted token when one exists, else from `fallback`
    pub async fn load_or(
        connection_id: u64,
        fallback: TokenState,
        refresher: Arc<dyn TokenRefresher>,
        store: Arc<dyn TokenStore>,
        buffer: chrono::Duration,
    ) -> CollectorResult<Self> {
        let initial = store.load(connection_id).await?.unwrap_or(fallback);
        Ok(Self::new(connection_id, initial, refresher, buffer).with_store(store))
    }

    pub const fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// A valid access token, refreshing first when it expires within the buffer
    pub async fn get_token(&self) -> CollectorResult<AccessToken> {
        {
            let state = self.state.read().await;
            if !state.needs_refresh(Utc::now(), self.buffer) {
                return Ok(current(&state));
            }
        }

        let mut state = self.state.write().await;
        if !state.needs_refresh(Utc::now(), self.buffer) {
            return Ok(current(&state));
        }
        self.refresh_locked(&mut state).await
    }

    /// Refresh after the provider rejected the token of `stale_generation`.
    ///
    /// When another caller already refreshed, the current token is returned
    /// without contacting the provider.
    pub async fn force_refresh(&self, stale_generation: u64) -> CollectorResult<AccessToken> {
        let mut state = self.state.write().await;
        if state.generation != stale_generation {
            return Ok(current(&state));
        }
        self.refresh_locked(&mut state).await
    }

    #[instrument(skip(self, state), fields(connection_id = self.connection_id, generation = state.generation))]
    async fn refresh_locked(&self, state: &mut TokenState) -> CollectorResult<AccessToken> {
        let refreshed = self.refresher.refresh(&state.refresh_token).await?;
        apply(state, refreshed);
        info!(
            generation = state.generation,
            expires_at = ?state.expires_at,
            "access token refreshed"
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.save(self.connection_id, state).await {
                warn!(error = %e, "failed to persist refreshed token; continuing with in-memory token");
            }
        }
        Ok(current(state))
    }
}

fn current(state: &TokenState) -> AccessToken {
    AccessToken {
        value: state.access_token.clone(),
        generation: state.generation,
    }
}

fn apply(state: &mut TokenState, refreshed: RefreshedToken) {
    state.access_token = refreshed.access_token;
    if !refreshed.refresh_token.is_empty() {
        state.refresh_token = refreshed.refresh_token;
    }
    state.expires_at = refreshed.expires_at;
    if refreshed.refresh_expires_at.is_some() {
        state.refresh_expires_at = refreshed.refresh_expires_at;
    }
    state.generation += 1;
}
