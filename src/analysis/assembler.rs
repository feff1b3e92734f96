//! Report assembly across divisions.
//!
//! Walks the configured divisions in order, fetching and aggregating each
//! one, and applies the failure policy when a division cannot be built.

use super::aggregator::{build_form_guide, DataIntegrityError};
use crate::models::{DivisionReport, OmittedDivision, Report};
use crate::source::{DataSource, SourceError};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// What to do when a single division fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Drop the division from the report and keep going.
    #[default]
    Partial,
    /// Abort the run on the first failure.
    FailFast,
}

/// One configured division.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionSpec {
    pub id: u32,
    pub name: String,
    /// Template panel id.
    pub slot: String,
}

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Divisions in render order.
    pub divisions: Vec<DivisionSpec>,
    /// Division rendered into the email body.
    pub inline_division: u32,
    pub recipients: Vec<String>,
    pub failure_policy: FailurePolicy,
    /// Draw a progress bar over divisions.
    pub show_progress: bool,
}

/// Why a single division could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DivisionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),
}

/// Failures that abort the whole run.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("could not connect to the data source: {0}")]
    Connect(#[source] SourceError),

    #[error("division {name} ({id}) failed: {source}")]
    Division {
        id: u32,
        name: String,
        #[source]
        source: DivisionError,
    },

    #[error("all {0} configured divisions failed")]
    NoDivisions(usize),
}

/// Fetch and aggregate one division.
async fn assemble_division<S: DataSource>(
    spec: &DivisionSpec,
    source: &S,
) -> Result<DivisionReport, DivisionError> {
    let standings = source.fetch_standings(spec.id).await?;
    let fixtures = source.fetch_fixtures(spec.id).await?;
    debug!(
        "{}: {} standings rows, {} fixtures",
        spec.name,
        standings.len(),
        fixtures.len()
    );

    let guide = build_form_guide(&fixtures, &standings)?;

    Ok(DivisionReport {
        division_id: spec.id,
        division_name: spec.name.clone(),
        slot: spec.slot.clone(),
        current_week: guide.current_week,
        horizon_weeks: guide.horizon_weeks,
        entries: guide.entries,
        next_fixtures: guide.next_fixtures,
    })
}

fn division_progress(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Build the report for every configured division.
///
/// Connection failures always abort. Per-division failures follow
/// `config.failure_policy`; if nothing could be assembled the run aborts.
pub async fn assemble_report<S: DataSource>(
    config: &RunConfig,
    source: &mut S,
) -> Result<Report, AssembleError> {
    source.connect().await.map_err(AssembleError::Connect)?;

    let pb = if config.show_progress {
        division_progress(config.divisions.len())
    } else {
        ProgressBar::hidden()
    };

    let mut divisions = Vec::new();
    let mut omitted = Vec::new();

    for spec in &config.divisions {
        pb.set_message(spec.name.clone());

        match assemble_division(spec, source).await {
            Ok(report) => {
                info!(
                    "{}: {} teams, current week {}, {} discrepancies",
                    spec.name,
                    report.entries.len(),
                    report.current_week,
                    report.discrepancy_count()
                );
                divisions.push(report);
            }
            Err(err) => match config.failure_policy {
                FailurePolicy::FailFast => {
                    pb.abandon();
                    return Err(AssembleError::Division {
                        id: spec.id,
                        name: spec.name.clone(),
                        source: err,
                    });
                }
                FailurePolicy::Partial => {
                    warn!("Omitting {} ({}): {}", spec.name, spec.id, err);
                    omitted.push(OmittedDivision {
                        division_id: spec.id,
                        division_name: spec.name.clone(),
                        reason: err.to_string(),
                    });
                }
            },
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let Some(first) = divisions.first() else {
        return Err(AssembleError::NoDivisions(config.divisions.len()));
    };

    let inline_division = if divisions
        .iter()
        .any(|d| d.division_id == config.inline_division)
    {
        config.inline_division
    } else {
        warn!(
            "Inline division {} is not in the report, using {} instead",
            config.inline_division, first.division_name
        );
        first.division_id
    };

    Ok(Report {
        divisions,
        omitted,
        inline_division,
        generated_at: Utc::now(),
    })
}
