//! Gmail API delivery.
//!
//! Uses a pre-provisioned OAuth authorized-user token file. Expired access
//! tokens are refreshed once through the token endpoint and written back.

use super::mime::{build_message, encode_raw, new_boundary};
use super::{DeliveryError, DeliveryReceipt, MailSink, OutgoingMail};
use crate::config::MailConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Contents of the token file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default, alias = "access_token")]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    /// Fields we don't use (scopes, account, ...) survive a rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoredToken {
    /// Missing, or within a minute of expiring.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => expiry <= now + ChronoDuration::seconds(60),
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Map a failed send to a delivery error.
fn classify_send_failure(status: StatusCode, body: &str) -> DeliveryError {
    let quota = ["rateLimitExceeded", "quotaExceeded", "dailyLimitExceeded", "userRateLimitExceeded"];
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && quota.iter().any(|q| body.contains(q)))
    {
        return DeliveryError::QuotaExceeded(format!("HTTP {status}"));
    }
    if status == StatusCode::UNAUTHORIZED {
        return DeliveryError::AuthTokenExpired(format!("HTTP {status}"));
    }

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect());
    DeliveryError::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Sends mail through the Gmail REST API.
pub struct GmailSink {
    client: Client,
    config: MailConfig,
    token_path: PathBuf,
    token: Option<StoredToken>,
}

impl GmailSink {
    pub fn new(config: &MailConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DeliveryError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            token_path: PathBuf::from(&config.token_path),
            token: None,
        })
    }

    async fn load_token(&self) -> Result<StoredToken, DeliveryError> {
        let content = tokio::fs::read_to_string(&self.token_path)
            .await
            .map_err(|e| {
                DeliveryError::Token(format!("cannot read {}: {e}", self.token_path.display()))
            })?;
        serde_json::from_str(&content).map_err(|e| {
            DeliveryError::Token(format!("cannot parse {}: {e}", self.token_path.display()))
        })
    }

    async fn save_token(&self, token: &StoredToken) -> Result<(), DeliveryError> {
        let content = serde_json::to_string_pretty(token)
            .map_err(|e| DeliveryError::Token(e.to_string()))?;
        tokio::fs::write(&self.token_path, content)
            .await
            .map_err(|e| {
                DeliveryError::Token(format!("cannot write {}: {e}", self.token_path.display()))
            })
    }

    /// Exchange the refresh token for a new access token.
    async fn refresh(&self, mut token: StoredToken) -> Result<StoredToken, DeliveryError> {
        let expired = |why: &str| DeliveryError::AuthTokenExpired(why.to_string());

        let refresh_token = token.refresh_token.clone().ok_or_else(|| expired("no refresh token"))?;
        let client_id = token.client_id.clone().ok_or_else(|| expired("no client id"))?;
        let client_secret = token
            .client_secret
            .clone()
            .ok_or_else(|| expired("no client secret"))?;
        let url = token
            .token_uri
            .clone()
            .unwrap_or_else(|| self.config.token_url.clone());

        debug!("Refreshing mail token at {}", url);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(expired(&format!("token endpoint returned HTTP {}", response.status())));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| expired(&format!("bad token response: {e}")))?;

        token.token = Some(refreshed.access_token);
        token.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));

        if let Err(e) = self.save_token(&token).await {
            warn!("Refreshed mail token could not be saved: {}", e);
        }
        info!("Mail token refreshed");
        Ok(token)
    }

    async fn post_message(&self, access_token: &str, raw: &str) -> Result<String, DeliveryError> {
        let url = format!(
            "{}/users/me/messages/send",
            self.config.api_base.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_send_failure(status, &body));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Network(format!("bad send response: {e}")))?;
        Ok(sent.id)
    }
}

#[async_trait]
impl MailSink for GmailSink {
    async fn send(&mut self, mail: &OutgoingMail) -> Result<DeliveryReceipt, DeliveryError> {
        if mail.recipients.is_empty() {
            return Err(DeliveryError::Rejected {
                status: 0,
                message: "no recipients".to_string(),
            });
        }

        let mut token = match self.token.take() {
            Some(token) => token,
            None => self.load_token().await?,
        };
        let mut refreshed = false;
        if token.is_expired(Utc::now()) {
            token = self.refresh(token).await?;
            refreshed = true;
        }

        let message = build_message(mail, &new_boundary("mixed"), &new_boundary("alt"));
        let raw = encode_raw(&message);
        debug!("MIME message is {} bytes", message.len());

        let access = token.token.clone().unwrap_or_default();
        let result = match self.post_message(&access, &raw).await {
            Err(DeliveryError::AuthTokenExpired(_)) if !refreshed => {
                warn!("Mail API rejected the access token, refreshing once");
                token = self.refresh(token).await?;
                let access = token.token.clone().unwrap_or_default();
                self.post_message(&access, &raw).await
            }
            other => other,
        };
        self.token = Some(token);

        let message_id = result?;
        info!("Mail sent to {} recipient(s), id {}", mail.recipients.len(), message_id);
        Ok(DeliveryReceipt {
            message_id,
            recipients: mail.recipients.len(),
        })
    }
}
