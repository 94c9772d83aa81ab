//! HTTP client for the CampusConnect API.
//!
//! Remote-backed stores use this client to hydrate from
//! `GET /collections/{name}` and to confirm optimistic writes. Any non-2xx
//! status is a failure; error bodies are carried along as text only.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{CampusConfig, DEFAULT_API_URL};
use crate::models::{Message, NewMessage};

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: API key required or invalid")]
    Unauthorized,

    #[error("Server error: {0}")]
    Server(String),
}

/// HTTP client for the CampusConnect API.
#[derive(Debug, Clone)]
pub struct CampusClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl CampusClient {
    /// Create client from loaded configuration.
    pub fn from_config(config: &CampusConfig) -> Self {
        Self::new(config.api_url.clone(), config.api_key.clone())
    }

    /// Create with explicit configuration.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: Client::new(),
        }
    }

    /// Build a request with optional auth header.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Handle response, converting HTTP errors to ClientError.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::status_error(status, response).await)
        }
    }

    async fn status_error(status: StatusCode, response: reqwest::Response) -> ClientError {
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(body),
            StatusCode::BAD_REQUEST => ClientError::BadRequest(body),
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            _ => ClientError::Server(format!("{}: {}", status, body)),
        }
    }

    // ============================================================
    // Collections
    // ============================================================

    /// Fetch every record of a named collection.
    /// An empty array is a valid response, not an error.
    pub async fn fetch_collection<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Vec<T>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/collections/{}", name))
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ============================================================
    // Messages
    // ============================================================

    /// Send a message. Returns the server's copy.
    pub async fn send_message(&self, input: &NewMessage) -> Result<Message, ClientError> {
        let response = self
            .request(reqwest::Method::POST, "/messages")
            .json(input)
            .send()
            .await?;
        self.handle_response(response).await
    }
}

impl Default for CampusClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL, None)
    }
}
