//! Live league portal adapter.

use super::parse::{parse_fixtures_json, parse_standings_html, standings_from_fixtures};
use super::{DataSource, SourceError};
use crate::config::{PortalConfig, StandingsMode};
use crate::models::{FixtureRecord, StandingsRow};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reads standings pages and the fixtures API of the league portal.
pub struct PortalSource {
    client: Client,
    config: PortalConfig,
    token: Option<String>,
}

/// Map a non-success status to a source error.
pub(crate) fn classify_status(status: StatusCode, what: &str) -> Option<SourceError> {
    if status.is_success() {
        return None;
    }
    let message = format!("{what}: HTTP {status}");
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => SourceError::Network(message),
        s if s.is_server_error() => SourceError::Network(message),
        _ => SourceError::Scrape(message),
    })
}

/// Pull the session token out of a login response.
fn extract_token(body: &Value) -> Option<String> {
    ["token", "access_token"]
        .iter()
        .find_map(|key| body.get(key))
        .or_else(|| body.get("data").and_then(|d| d.get("token")))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn is_login_page(url: &reqwest::Url) -> bool {
    url.path().contains("/login")
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl PortalSource {
    /// Build the HTTP client. No request is made until `connect`.
    pub fn new(config: &PortalConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
            token: None,
        })
    }

    fn standings_url(&self, division_id: u32) -> String {
        format!(
            "{}/re/tournament/{}",
            self.config.base_url.trim_end_matches('/'),
            division_id
        )
    }

    fn fixtures_url(&self, division_id: u32) -> String {
        format!(
            "{}/organizer/{}/parent/fixtures?league_id={}&competition_id={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.organizer,
            division_id,
            self.config.competition_id
        )
    }

    fn login_url(&self) -> String {
        format!("{}/auth/login", self.config.api_base.trim_end_matches('/'))
    }

    fn token(&self) -> Result<&str, SourceError> {
        self.token
            .as_deref()
            .ok_or_else(|| SourceError::Auth("not connected".to_string()))
    }

    async fn login(&self, username: &str, password: &str) -> Result<String, SourceError> {
        let url = self.login_url();
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&json!({ "email": username, "password": password }))
            .send()
            .await?;

        if let Some(err) = classify_status(response.status(), "login") {
            return Err(err);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Scrape(format!("login response is not JSON: {e}")))?;

        extract_token(&body)
            .ok_or_else(|| SourceError::Auth("login response carried no token".to_string()))
    }

    /// Scrape the table from the tournament page.
    ///
    /// The page renders its table client-side, so a plain GET may come back
    /// without rows; that surfaces as a `Scrape` error.
    async fn page_standings(&self, division_id: u32) -> Result<Vec<StandingsRow>, SourceError> {
        let url = self.standings_url(division_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await?;

        if let Some(err) = classify_status(response.status(), "standings") {
            return Err(err);
        }
        if is_login_page(response.url()) {
            return Err(SourceError::Auth(
                "redirected to the login page; session expired".to_string(),
            ));
        }

        let html = response.text().await?;
        parse_standings_html(&html)
    }
}

/// Resolve standings for one division according to `mode`.
///
/// Under `Auto` only a `Scrape` failure of the page falls back to the
/// fixtures; auth and network errors propagate.
async fn resolve_standings<S: DataSource + ?Sized>(
    source: &S,
    mode: StandingsMode,
    page: Result<Vec<StandingsRow>, SourceError>,
    division_id: u32,
) -> Result<Vec<StandingsRow>, SourceError> {
    match (mode, page) {
        (StandingsMode::Auto, Err(SourceError::Scrape(reason))) => {
            warn!(
                "Division {}: no standings table ({}), deriving it from fixtures",
                division_id, reason
            );
            let fixtures = source.fetch_fixtures(division_id).await?;
            Ok(standings_from_fixtures(&fixtures))
        }
        (_, page) => page,
    }
}

#[async_trait]
impl DataSource for PortalSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        if let Some(token) = env_value(&self.config.token_env) {
            info!("Using portal API token from {}", self.config.token_env);
            self.token = Some(token);
            return Ok(());
        }

        let username = env_value(&self.config.username_env).ok_or_else(|| {
            SourceError::Auth(format!("{} is not set", self.config.username_env))
        })?;
        let password = env_value(&self.config.password_env).ok_or_else(|| {
            SourceError::Auth(format!("{} is not set", self.config.password_env))
        })?;

        let token = self.login(&username, &password).await?;
        info!("Logged in to the portal as {}", username);
        self.token = Some(token);
        Ok(())
    }

    async fn fetch_standings(&self, division_id: u32) -> Result<Vec<StandingsRow>, SourceError> {
        let mode = self.config.standings;
        if mode == StandingsMode::Fixtures {
            let fixtures = self.fetch_fixtures(division_id).await?;
            return Ok(standings_from_fixtures(&fixtures));
        }
        let page = self.page_standings(division_id).await;
        resolve_standings(self, mode, page, division_id).await
    }

    async fn fetch_fixtures(&self, division_id: u32) -> Result<Vec<FixtureRecord>, SourceError> {
        let url = self.fixtures_url(division_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if let Some(err) = classify_status(response.status(), "fixtures") {
            return Err(err);
        }

        let body = response.text().await?;
        let fixtures = parse_fixtures_json(&body)?;
        debug!("Division {}: {} fixture rows", division_id, fixtures.len());
        Ok(fixtures)
    }
}
