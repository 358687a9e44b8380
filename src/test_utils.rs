//! Shared helpers for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::token::{TokenPair, TokenRefresher};

/// Refresher that counts exchanges and can be told to fail.
pub struct CountingRefresher {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingRefresher {
    pub fn new(fail: bool) -> Self {
        CountingRefresher {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn exchange(&self, _refresh_token: &str) -> Result<TokenPair, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err("refresh token rejected".to_string())
        } else {
            // Issue an immediately-expiring token so helpers like
            // `always_expiring_cell` keep forcing a refresh on every check.
            Ok(TokenPair::new("fresh-access", "fresh-refresh").with_expiry(0))
        }
    }
}

/// Build a `reqwest::Response` without a server, for scripting exact
/// status/body sequences.
pub fn scripted_response(status: u16, body: &'static str) -> reqwest::Response {
    reqwest::Response::from(
        http::Response::builder()
            .status(status)
            .body(body)
            .unwrap(),
    )
}
