//! PDI backend client
//!
//! Thin typed wrapper over the job card REST API. Every request races the
//! session scope so tearing a session down aborts whatever is still in flight.

pub mod types;

pub use types::{
    normalize_chassis, LoginResponse, RectifyJobCard, User, VehicleDetails, VehicleSummary,
};

use pdi_common::{Approval, ApprovalRequest, JobCardSubmission, RectifySubmission};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::Config;
use crate::error::{PdiError, Result};
use types::LoginRequest;

const JOB_CARD_NOT_FOUND: &str = "Job Card not found";

/// Cancellation signal shared by every request of one session
#[derive(Clone, Debug)]
pub struct SessionScope {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionScope {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow_and_update() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

impl Default for SessionScope {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    scope: SessionScope,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            scope: SessionScope::new(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn scope(&self) -> &SessionScope {
        &self.scope
    }

    /// Starts a fresh scope after the previous one was cancelled
    pub fn renew_scope(&mut self) {
        self.scope = SessionScope::new();
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Response> {
        if self.scope.is_cancelled() {
            return Err(PdiError::Cancelled);
        }
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        tracing::debug!(endpoint, "request");
        tokio::select! {
            res = request.send() => Ok(res?),
            _ = self.scope.cancelled() => {
                tracing::debug!(endpoint, "request cancelled");
                Err(PdiError::Cancelled)
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(endpoint, status = status.as_u16(), "request failed");
            return Err(PdiError::from_status(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(endpoint, "malformed response: {}", e);
            PdiError::MalformedResponse {
                endpoint: endpoint.to_string(),
                detail: e.to_string(),
            }
        })
    }

    async fn expect_success(response: Response, endpoint: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(endpoint, status = status.as_u16(), "request failed");
        Err(PdiError::from_status(status.as_u16(), &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.get(self.url(path)), path).await?;
        Self::read_json(response, path).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        self.send(self.client.post(self.url(path)).json(body), path).await
    }

    pub async fn vehicle(&self, chassis_no: &str) -> Result<VehicleDetails> {
        self.get_json(&format!("vehicles/{}", chassis_no)).await
    }

    pub async fn search_vehicles(&self, query: &str) -> Result<Vec<VehicleSummary>> {
        let path = "vehicles/search";
        let request = self.client.get(self.url(path)).query(&[("query", query)]);
        let response = self.send(request, path).await?;
        Self::read_json(response, path).await
    }

    /// 200 → exists; 404 carrying "Job Card not found" → does not exist
    pub async fn job_card_exists(&self, chassis_no: &str) -> Result<bool> {
        let path = format!("jobcards/{}", chassis_no);
        let response = self.send(self.client.get(self.url(&path)), &path).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND && body.contains(JOB_CARD_NOT_FOUND) {
            return Ok(false);
        }
        Err(PdiError::from_status(status.as_u16(), &body))
    }

    pub async fn rectify_job_card(&self, chassis_no: &str) -> Result<RectifyJobCard> {
        self.get_json(&format!("jobcards/rectify/{}", chassis_no)).await
    }

    pub async fn submit_job_card(&self, body: &JobCardSubmission) -> Result<()> {
        let response = self.post("jobcards", body).await?;
        Self::expect_success(response, "jobcards").await
    }

    pub async fn submit_rectification(&self, body: &RectifySubmission) -> Result<()> {
        let response = self.post("jobcards/rectify", body).await?;
        Self::expect_success(response, "jobcards/rectify").await
    }

    pub async fn approve(&self, chassis_no: &str, approval: Approval) -> Result<()> {
        let path = format!("approvals/{}", chassis_no);
        let response = self.post(&path, &ApprovalRequest { approval }).await?;
        Self::expect_success(response, &path).await
    }

    pub async fn supervisors(&self) -> Result<Vec<User>> {
        let users: Vec<User> = self.get_json("users").await?;
        Ok(users.into_iter().filter(User::is_supervisor).collect())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let response = self
            .post("login", &LoginRequest { username, password })
            .await?;
        Self::read_json(response, "login").await
    }

    /// Re-checks the password of the logged-in user before a destructive action
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<()> {
        match self.login(username, password).await {
            Ok(_) => Ok(()),
            Err(PdiError::Api { status, .. }) if (400..500).contains(&status) => {
                Err(PdiError::VerificationFailed)
            }
            Err(e) => Err(e),
        }
    }
}
