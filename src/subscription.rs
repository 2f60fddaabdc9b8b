//! Subscription status lookup and payment link.
//!
//! The status endpoint is optional infrastructure: any non-2xx answer is read
//! as an inactive subscription instead of an error. Only a transport failure
//! (no connection, timeout) or an unreadable 2xx body is an error.

use crate::config::SubscriptionConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("subscription service unreachable: {0}")]
    Network(String),
    #[error("unreadable subscription response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Trial,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub status: SubscriptionStatus,
    pub plan_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl SubscriptionInfo {
    /// What a failing endpoint means.
    pub fn fallback() -> Self {
        Self {
            status: SubscriptionStatus::Inactive,
            plan_name: "None".to_string(),
            expires_at: None,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trial
        )
    }
}

/// Interpret a status response.
pub fn parse_status_response(
    status: StatusCode,
    body: &str,
) -> Result<SubscriptionInfo, SubscriptionError> {
    if !status.is_success() {
        tracing::debug!(%status, "subscription endpoint failed, treating as inactive");
        return Ok(SubscriptionInfo::fallback());
    }
    Ok(serde_json::from_str(body)?)
}

/// Payment page for this device, with `email` when known.
pub fn build_payment_url(
    base: &str,
    email: Option<&str>,
    equipment_id: &str,
) -> Result<String, SubscriptionError> {
    let mut url = Url::parse(base)?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(email) = email.filter(|e| !e.is_empty()) {
            query.append_pair("email", email);
        }
        query.append_pair("equipment_id", equipment_id);
    }
    Ok(url.into())
}

/// At most one request per interval.
#[derive(Debug)]
struct Throttle {
    min_interval: Duration,
    last_fetch: Option<Instant>,
    cached: Option<SubscriptionInfo>,
}

impl Throttle {
    /// Claim the slot for a request at `now`. The slot is taken even if the
    /// request later fails.
    fn try_begin(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_fetch
            && now.duration_since(last) < self.min_interval
        {
            return false;
        }
        self.last_fetch = Some(now);
        true
    }
}

pub struct SubscriptionClient {
    client: Client,
    status_url: String,
    throttle: Mutex<Throttle>,
}

impl SubscriptionClient {
    pub fn new(config: &SubscriptionConfig) -> Result<Self, SubscriptionError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(SubscriptionError::Client)?;
        Ok(Self {
            client,
            status_url: config.status_url.clone(),
            throttle: Mutex::new(Throttle {
                min_interval: Duration::from_secs(config.min_interval_secs),
                last_fetch: None,
                cached: None,
            }),
        })
    }

    /// Current status for this device.
    ///
    /// Inside the throttle window nothing is sent and the last good answer
    /// (if any) comes back instead.
    pub async fn fetch_subscription(
        &self,
        email: Option<&str>,
        equipment_id: &str,
    ) -> Result<Option<SubscriptionInfo>, SubscriptionError> {
        let mut throttle = self.throttle.lock().await;
        if !throttle.try_begin(Instant::now()) {
            tracing::debug!("subscription fetch throttled");
            return Ok(throttle.cached.clone());
        }

        let response = self
            .client
            .post(&self.status_url)
            .json(&json!({ "email": email, "equipmentId": equipment_id }))
            .send()
            .await
            .map_err(|e| SubscriptionError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubscriptionError::Network(e.to_string()))?;

        let info = parse_status_response(status, &body)?;
        throttle.cached = Some(info.clone());
        Ok(Some(info))
    }
}
