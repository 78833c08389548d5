//! HTTP client for the MasterTrust REST API.
//!
//! Sessions are bearer-token based: the login handshake sends the account
//! password and PIN plus a SHA-256 checksum of `client_id + api_secret`, and
//! the returned token is cached on disk so a restart can resume the session
//! without a fresh login.

use parking_lot::RwLock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::core::{Error, Result};
use crate::master_trust_api::model::{Envelope, OrderRow, PositionRow, SessionData};

pub struct MasterTrustClient {
    http: Client,
    base_url: String,
    client_id: String,
    password: String,
    pin: String,
    api_secret: String,
    token_file: PathBuf,
    token: RwLock<Option<String>>,
}

impl MasterTrustClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        password: impl Into<String>,
        pin: impl Into<String>,
        api_secret: impl Into<String>,
        token_file: PathBuf,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            client_id: client_id.into(),
            password: password.into(),
            pin: pin.into(),
            api_secret: api_secret.into(),
            token_file,
            token: RwLock::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.client_id.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn cached_token(&self) -> Option<String> {
        let token = std::fs::read_to_string(&self.token_file).ok()?;
        let token = token.trim().to_string();
        (!token.is_empty()).then_some(token)
    }

    fn bearer(&self) -> Result<String> {
        self.token
            .read()
            .clone()
            .ok_or_else(|| Error::Auth(format!("{} has no active session", self.client_id)))
    }

    /// Log in, or resume the on-disk session if the venue still accepts it.
    pub async fn authenticate(&self) -> Result<()> {
        if let Some(token) = self.cached_token() {
            if self.token_is_valid(&token).await {
                debug!(client_id = %self.client_id, "resumed cached session");
                *self.token.write() = Some(token);
                return Ok(());
            }
        }

        let body = serde_json::json!({
            "login_id": self.client_id,
            "password": self.password,
            "pin": self.pin,
            "checksum": self.checksum(),
        });
        let envelope: Envelope<SessionData> = self
            .http
            .post(format!("{}/user/session", self.base_url))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if !envelope.is_success() {
            return Err(Error::Auth(format!(
                "{}: login rejected: {}",
                self.client_id, envelope.message
            )));
        }
        let token = envelope
            .data
            .ok_or_else(|| Error::Auth(format!("{}: login reply had no token", self.client_id)))?
            .auth_token;

        if let Err(e) = std::fs::write(&self.token_file, &token) {
            warn!(client_id = %self.client_id, error = %e, "could not cache session token");
        }
        *self.token.write() = Some(token);
        Ok(())
    }

    async fn token_is_valid(&self, token: &str) -> bool {
        let url = format!("{}/user/profile", self.base_url);
        match self.http.get(url).bearer_auth(token).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = format!("{}{}", self.base_url, path);
        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
                .collect();
            url = format!("{url}?{}", encoded.join("&"));
        }
        let envelope: Envelope<T> = self
            .http
            .get(url)
            .bearer_auth(self.bearer()?)
            .send()
            .await?
            .json()
            .await?;
        if !envelope.is_success() {
            return Err(Error::Broker(format!(
                "{}: {path}: {}",
                self.client_id, envelope.message
            )));
        }
        envelope
            .data
            .ok_or_else(|| Error::Broker(format!("{}: {path}: empty reply", self.client_id)))
    }

    async fn send_order(&self, method: reqwest::Method, path: &str, body: &Value) -> Result<Value> {
        let reply: Value = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(self.bearer()?)
            .json(body)
            .send()
            .await?
            .json()
            .await?;
        let status = reply.get("status").and_then(Value::as_str).unwrap_or("");
        if !status.eq_ignore_ascii_case("success") {
            let message = reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("order rejected");
            return Err(Error::Broker(format!("{}: {message}", self.client_id)));
        }
        Ok(reply)
    }

    /// Live positions for this account.
    pub async fn positions(&self) -> Result<Vec<PositionRow>> {
        self.get_json(
            "/positions",
            &[("client_id", self.client_id.as_str()), ("type", "live")],
        )
        .await
    }

    /// Orders still working at the venue.
    pub async fn pending_orders(&self) -> Result<Vec<OrderRow>> {
        self.get_json(
            "/orders",
            &[("client_id", self.client_id.as_str()), ("type", "pending")],
        )
        .await
    }

    pub async fn place_order(&self, params: &Value) -> Result<Value> {
        self.send_order(reqwest::Method::POST, "/orders", params).await
    }

    pub async fn modify_order(&self, params: &Value) -> Result<Value> {
        self.send_order(reqwest::Method::PUT, "/orders", params).await
    }

    pub async fn cancel_order(
        &self,
        oms_order_id: &str,
        leg_order_indicator: Option<&str>,
    ) -> Result<Value> {
        let mut path = format!(
            "/orders/{}?client_id={}",
            urlencoding::encode(oms_order_id),
            urlencoding::encode(&self.client_id),
        );
        if let Some(leg) = leg_order_indicator {
            path = format!("{path}&leg_order_indicator={}", urlencoding::encode(leg));
        }
        let reply: Value = self
            .http
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(self.bearer()?)
            .send()
            .await?
            .json()
            .await?;
        Ok(reply)
    }
}
