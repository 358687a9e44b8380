use std::collections::HashMap;

use reqwest::Client;
use reqwest::Url;
use tracing::debug;

use crate::request::RequestType;
use crate::token::TokenCell;

/// Default storage zone used when the caller does not name one.
pub const DEFAULT_ZONE: &str = "MainZone";

// This is the base client that will be used to make requests to the API.
// It acts as a wrapper around the reqwest::Client, owns the shared session
// credential, and provides methods to make GET, POST, and DELETE requests.
// The Authorization header is built from the token cell at send time, so a
// refresh performed anywhere in the session is observed by the next call.
#[derive(Clone)]
pub struct BaseClient {
    base_url: Url,
    zone: String,
    token: TokenCell,
    client: Client,
}

impl BaseClient {
    pub fn new(base_url: &str, zone: Option<String>, token: TokenCell) -> Result<Self, String> {
        let mut base_url = Url::parse(base_url).map_err(|e| e.to_string())?;

        // Endpoint paths are joined relative to the base URL, which only
        // works as intended when the base path ends in a slash.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        // Increased timeouts for large transfers
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(60))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| e.to_string())?;

        Ok(BaseClient {
            base_url,
            zone: zone.unwrap_or_else(|| DEFAULT_ZONE.to_string()),
            token,
            client,
        })
    }

    /// Get the base URL of the client
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The storage zone this session defaults to.
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// The shared session credential.
    pub fn token(&self) -> &TokenCell {
        &self.token
    }

    /// The underlying HTTP client, shared with the transfer engine.
    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub async fn get(
        &self,
        path: &str,
        parameters: Option<HashMap<String, String>>,
        context: RequestType,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.perform_request(reqwest::Method::GET, path, parameters, context)
            .await
    }

    pub async fn post(
        &self,
        path: &str,
        parameters: Option<HashMap<String, String>>,
        context: RequestType,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.perform_request(reqwest::Method::POST, path, parameters, context)
            .await
    }

    pub async fn delete(
        &self,
        path: &str,
        parameters: Option<HashMap<String, String>>,
        context: RequestType,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.perform_request(reqwest::Method::DELETE, path, parameters, context)
            .await
    }

    async fn perform_request(
        &self,
        method: reqwest::Method,
        path: &str,
        parameters: Option<HashMap<String, String>>,
        context: RequestType,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let url = self
            .base_url
            .join(path)
            .expect("relative endpoint paths always join onto the base URL");

        debug!("{} -- {}", method, url);

        let bearer = self.token.access_token().await;
        let request = context
            .to_request(self.client.request(method, url))
            .header("Authorization", format!("Bearer {}", bearer));

        let request = match parameters {
            Some(parameters) => request.query(&parameters),
            None => request,
        };

        request.send().await
    }
}
