//! Data models for the form guide.
//!
//! This module contains the scraped records (fixtures, standings), the
//! derived per-team form data and the assembled report consumed by the
//! render and delivery sinks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status of a fixture as published by the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureStatus {
    /// Result is in; both scores are present.
    Played,
    /// Not played yet (or overdue).
    Scheduled,
    /// Voided or cancelled by the league.
    Voided,
}

impl FixtureStatus {
    /// Played and voided fixtures both count as resolved for the week horizon.
    pub fn is_resolved(&self) -> bool {
        matches!(self, FixtureStatus::Played | FixtureStatus::Voided)
    }
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureStatus::Played => write!(f, "played"),
            FixtureStatus::Scheduled => write!(f, "scheduled"),
            FixtureStatus::Voided => write!(f, "voided"),
        }
    }
}

/// A single fixture row scraped for a division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureRecord {
    /// Week number (1-based).
    pub week: u32,
    /// Home team id.
    pub home_team: String,
    /// Away team id.
    pub away_team: String,
    /// Home score, present iff the fixture was played.
    pub home_score: Option<u32>,
    /// Away score, present iff the fixture was played.
    pub away_score: Option<u32>,
    /// Fixture status.
    pub status: FixtureStatus,
    /// Date shown in the portal's week header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_date: Option<NaiveDate>,
    /// Venue name, when the portal publishes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Score recorded before the league voided the fixture, as (home, away).
    /// Display only; never counted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voided_score: Option<(u32, u32)>,
}

impl FixtureRecord {
    /// A played fixture with its final score.
    pub fn played(week: u32, home: &str, away: &str, home_score: u32, away_score: u32) -> Self {
        Self {
            week,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: Some(home_score),
            away_score: Some(away_score),
            status: FixtureStatus::Played,
            week_date: None,
            venue: None,
            voided_score: None,
        }
    }

    /// A fixture that has not been played yet.
    pub fn scheduled(week: u32, home: &str, away: &str) -> Self {
        Self {
            week,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: None,
            away_score: None,
            status: FixtureStatus::Scheduled,
            week_date: None,
            venue: None,
            voided_score: None,
        }
    }

    /// A voided fixture. Scores stay empty; see `with_voided_score`.
    pub fn voided(week: u32, home: &str, away: &str) -> Self {
        Self {
            week,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: None,
            away_score: None,
            status: FixtureStatus::Voided,
            week_date: None,
            venue: None,
            voided_score: None,
        }
    }

    pub fn with_week_date(mut self, date: NaiveDate) -> Self {
        self.week_date = Some(date);
        self
    }

    pub fn with_venue(mut self, venue: &str) -> Self {
        self.venue = Some(venue.to_string());
        self
    }

    /// Keep the pre-void score of a voided fixture.
    pub fn with_voided_score(mut self, home_score: u32, away_score: u32) -> Self {
        if self.status == FixtureStatus::Voided {
            self.voided_score = Some((home_score, away_score));
        }
        self
    }

    /// Whether the given team plays in this fixture.
    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    /// The other side of the fixture from `team`'s point of view.
    pub fn opponent_of(&self, team: &str) -> &str {
        if self.home_team == team {
            &self.away_team
        } else {
            &self.home_team
        }
    }

    /// Scores as (for, against) from `team`'s point of view.
    pub fn scores_for(&self, team: &str) -> Option<(u32, u32)> {
        let (home, away) = (self.home_score?, self.away_score?);
        if self.home_team == team {
            Some((home, away))
        } else {
            Some((away, home))
        }
    }
}

/// A row of the official league table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingsRow {
    /// Team id (display name with division suffix stripped).
    pub team: String,
    /// Rank as published.
    #[serde(default)]
    pub position: u32,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    #[serde(default)]
    pub goals_for: u32,
    #[serde(default)]
    pub goals_against: u32,
    #[serde(default)]
    pub goal_difference: i64,
    pub points: i64,
    /// Club crest URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl StandingsRow {
    /// A row with only the record columns filled in.
    pub fn new(team: &str, played: u32, won: u32, drawn: u32, lost: u32, points: i64) -> Self {
        Self {
            team: team.to_string(),
            position: 0,
            played,
            won,
            drawn,
            lost,
            goals_for: 0,
            goals_against: 0,
            goal_difference: 0,
            points,
            logo_url: None,
        }
    }
}

/// Single-letter weekly outcome symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Badge {
    W,
    L,
    D,
    /// No result: no fixture that week, or the fixture is overdue.
    N,
    /// Voided fixture.
    V,
}

impl Badge {
    pub fn letter(&self) -> &'static str {
        match self {
            Badge::W => "W",
            Badge::L => "L",
            Badge::D => "D",
            Badge::N => "N",
            Badge::V => "V",
        }
    }

    /// Ring/text colour used by the renderer.
    pub fn color(&self) -> &'static str {
        match self {
            Badge::W => "#22c55e",
            Badge::D => "#eab308",
            Badge::L => "#ef4444",
            Badge::N | Badge::V => "#9ca3af",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// Why a week slot carries its badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeReason {
    Played,
    Voided,
    /// Scheduled but inside the horizon, i.e. not played yet.
    Overdue,
    /// The team had no fixture that week.
    NoFixture,
}

/// One team's outcome for one horizon week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamWeekResult {
    pub team: String,
    pub week: u32,
    pub badge: Badge,
    pub reason: BadgeReason,
    /// Opponent, empty when there was no fixture.
    pub opponent: String,
    /// Score from the team's perspective (e.g. "2–1"). For a voided week
    /// this is the score recorded before the void, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_date: Option<NaiveDate>,
}

/// Record recomputed from fixtures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedRecord {
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points: i64,
}

impl ComputedRecord {
    /// Whether played/won/drawn/lost differ from the official row.
    pub fn differs_from(&self, official: &StandingsRow) -> bool {
        (self.played, self.won, self.drawn, self.lost)
            != (official.played, official.won, official.drawn, official.lost)
    }
}

/// A team's form guide line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormGuideEntry {
    pub team: String,
    /// One result per horizon week, week ascending.
    pub sequence: Vec<TeamWeekResult>,
    pub computed: ComputedRecord,
    pub official: StandingsRow,
    /// Weeks in which the team had more than one fixture row.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicate_weeks: Vec<u32>,
    pub discrepancy: bool,
}

impl FormGuideEntry {
    /// The badges alone, in week order.
    pub fn badges(&self) -> Vec<Badge> {
        self.sequence.iter().map(|r| r.badge).collect()
    }
}

/// A team's earliest outstanding fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextFixture {
    pub team: String,
    pub opponent: String,
    pub week: u32,
    /// Whether the team is the home side.
    pub home: bool,
    pub venue_known: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_date: Option<NaiveDate>,
}

/// Aggregated form guide for one division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionReport {
    pub division_id: u32,
    pub division_name: String,
    /// Template panel id.
    pub slot: String,
    /// Latest week with a played or voided fixture (0 if none).
    pub current_week: u32,
    /// Week numbers rendered in every sequence.
    pub horizon_weeks: Vec<u32>,
    /// Entries in official standings order.
    pub entries: Vec<FormGuideEntry>,
    pub next_fixtures: BTreeMap<String, NextFixture>,
}

impl DivisionReport {
    /// Number of teams flagged with a discrepancy.
    pub fn discrepancy_count(&self) -> usize {
        self.entries.iter().filter(|e| e.discrepancy).count()
    }
}

/// A division dropped from the report under the partial-failure policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedDivision {
    pub division_id: u32,
    pub division_name: String,
    pub reason: String,
}

/// The assembled run report. Never mutated after assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub divisions: Vec<DivisionReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted: Vec<OmittedDivision>,
    /// Division used for the inline email body.
    pub inline_division: u32,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// The division rendered into the email body.
    pub fn inline(&self) -> Option<&DivisionReport> {
        self.divisions
            .iter()
            .find(|d| d.division_id == self.inline_division)
    }

    /// Whether any configured division was dropped.
    pub fn is_partial(&self) -> bool {
        !self.omitted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_perspective() {
        let f = FixtureRecord::played(3, "Lions", "Tigers", 4, 1);
        assert!(f.involves("Lions"));
        assert!(f.involves("Tigers"));
        assert!(!f.involves("Bears"));
        assert_eq!(f.opponent_of("Tigers"), "Lions");
        assert_eq!(f.scores_for("Lions"), Some((4, 1)));
        assert_eq!(f.scores_for("Tigers"), Some((1, 4)));
    }

    #[test]
    fn test_scheduled_has_no_scores() {
        let f = FixtureRecord::scheduled(5, "Lions", "Tigers");
        assert_eq!(f.scores_for("Lions"), None);
        assert!(!f.status.is_resolved());
        assert!(FixtureRecord::voided(5, "A", "B").status.is_resolved());
    }

    #[test]
    fn test_record_differs() {
        let official = StandingsRow::new("Lions", 2, 1, 1, 0, 4);
        let mut computed = ComputedRecord {
            played: 2,
            won: 1,
            drawn: 1,
            lost: 0,
            goals_for: 9,
            goals_against: 0,
            points: 0,
        };
        // goals and points are not part of the comparison
        assert!(!computed.differs_from(&official));
        computed.lost = 1;
        assert!(computed.differs_from(&official));
    }

    #[test]
    fn test_badge_display() {
        assert_eq!(Badge::W.to_string(), "W");
        assert_eq!(Badge::V.letter(), "V");
        assert_eq!(Badge::N.color(), Badge::V.color());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&FixtureStatus::Voided).unwrap();
        assert_eq!(json, "\"voided\"");
    }
}
