//! Shared session credential handling
//!
//! The access/refresh token pair lives in a [`TokenCell`] that is cloned into
//! every component performing network calls. Any of them may trigger a
//! refresh; all later header builds observe the new token because the pair
//! sits behind a shared lock rather than being copied around.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

/// An access token together with the refresh token used to renew it.
///
/// Expiry fields are optional: sessions created from a plain API token have
/// no lifetime information and are never proactively refreshed.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        TokenPair {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_in: None,
            refresh_expires_in: None,
        }
    }

    /// Attach a known access-token lifetime in seconds.
    pub fn with_expiry(mut self, expires_in: u64) -> Self {
        self.expires_in = Some(expires_in);
        self
    }
}

/// Capability to exchange a refresh token for a new token pair.
///
/// The identity service is a boundary collaborator; this trait is the whole
/// surface the rest of the crate relies on.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, String>;
}

/// Token refresh against an OpenID-style identity endpoint.
pub struct IdentityClient {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
}

impl IdentityClient {
    pub fn new(token_url: Url, client_id: impl Into<String>) -> Self {
        IdentityClient {
            http: reqwest::Client::new(),
            token_url,
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for IdentityClient {
    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, String> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!(
                "identity endpoint answered {}",
                response.status()
            ));
        }

        response
            .json::<TokenPair>()
            .await
            .map_err(|e| format!("identity endpoint body not readable: {e}"))
    }
}

/// Refresher for sessions that only carry a static API token.
pub struct NoRefresh;

#[async_trait]
impl TokenRefresher for NoRefresh {
    async fn exchange(&self, _refresh_token: &str) -> Result<TokenPair, String> {
        Err("no refresh token configured for this session".to_string())
    }
}

struct TokenState {
    pair: TokenPair,
    retrieved_at: Instant,
}

/// Shared, interior-mutable credential cell.
///
/// Cloning is cheap and every clone observes refreshes performed through any
/// other clone. Callers within one session are expected to issue requests
/// sequentially; the cell only guards the token swap itself.
#[derive(Clone)]
pub struct TokenCell {
    state: Arc<tokio::sync::RwLock<TokenState>>,
    refresher: Arc<dyn TokenRefresher>,
}

impl TokenCell {
    pub fn new(pair: TokenPair, refresher: Arc<dyn TokenRefresher>) -> Self {
        TokenCell {
            state: Arc::new(tokio::sync::RwLock::new(TokenState {
                pair,
                retrieved_at: Instant::now(),
            })),
            refresher,
        }
    }

    /// Cell around a static API token that can never be refreshed.
    pub fn fixed(access_token: impl Into<String>) -> Self {
        TokenCell::new(
            TokenPair::new(access_token, String::new()),
            Arc::new(NoRefresh),
        )
    }

    /// The current access token, for building an `Authorization` header.
    pub async fn access_token(&self) -> String {
        self.state.read().await.pair.access_token.clone()
    }

    /// Exchange the refresh token for a new pair. Returns whether the swap
    /// happened; on failure the old pair stays in place and the caller
    /// treats its triggering request as terminal.
    pub async fn refresh(&self) -> bool {
        let refresh_token = self.state.read().await.pair.refresh_token.clone();

        match self.refresher.exchange(&refresh_token).await {
            Ok(pair) => {
                let mut state = self.state.write().await;
                state.pair = pair;
                state.retrieved_at = Instant::now();
                debug!("POST -- AUTH -- refresh token -- OK");
                true
            }
            Err(e) => {
                error!("POST -- AUTH -- refresh token -- {e} -- FAILED");
                false
            }
        }
    }

    /// Proactive check used before every poll iteration: refresh only when
    /// the tracked lifetime has elapsed. Returns whether the credential is
    /// usable afterwards.
    pub async fn ensure_fresh(&self) -> bool {
        let expired = {
            let state = self.state.read().await;
            match state.pair.expires_in {
                Some(secs) => state.retrieved_at.elapsed() >= Duration::from_secs(secs),
                None => false,
            }
        };

        if expired {
            self.refresh().await
        } else {
            true
        }
    }
}
