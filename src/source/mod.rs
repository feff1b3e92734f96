//! Data source adapters.
//!
//! A data source supplies, per division, the official standings table and
//! the raw fixture rows. The live adapter talks to the league portal; the
//! snapshot adapter reads saved pages from disk.

pub mod parse;
pub mod portal;
pub mod snapshot;

use crate::models::{FixtureRecord, StandingsRow};
use async_trait::async_trait;
use thiserror::Error;

pub use portal::PortalSource;
pub use snapshot::SnapshotSource;

/// Failures reported by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Login rejected, session expired or credentials missing.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The page or payload did not have the expected structure.
    #[error("unexpected page structure: {0}")]
    Scrape(String),

    /// Timeout, connection failure or a transient server error.
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Scrape(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

/// Supplies standings and fixtures per division.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Establish a session. Failing here aborts the whole run.
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// League table in rank order, as published or derived from fixtures.
    async fn fetch_standings(&self, division_id: u32) -> Result<Vec<StandingsRow>, SourceError>;

    /// Every fixture row of the division, in scrape order.
    async fn fetch_fixtures(&self, division_id: u32) -> Result<Vec<FixtureRecord>, SourceError>;
}
