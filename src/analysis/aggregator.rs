//! Form guide aggregation.
//!
//! Turns one division's raw fixture rows and official standings into
//! per-team weekly badge sequences, recomputed records cross-checked
//! against the league table, and each team's next fixture.

use crate::models::{
    Badge, BadgeReason, ComputedRecord, FixtureRecord, FixtureStatus, FormGuideEntry,
    NextFixture, StandingsRow, TeamWeekResult,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Fatal data problems for a single division.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataIntegrityError {
    #[error("team '{team}' plays in week {week} but is missing from the standings")]
    UnknownTeam { team: String, week: u32 },

    #[error("played fixture {home} v {away} in week {week} has no score")]
    MissingScore {
        week: u32,
        home: String,
        away: String,
    },

    #[error("team '{0}' is listed more than once in the standings")]
    DuplicateStanding(String),
}

/// Aggregated output for one division.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormGuide {
    /// Latest week with a played or voided fixture (0 if none).
    pub current_week: u32,
    /// Weeks present in the fixture set up to `current_week`.
    pub horizon_weeks: Vec<u32>,
    /// Entries in official standings order.
    pub entries: Vec<FormGuideEntry>,
    pub next_fixtures: BTreeMap<String, NextFixture>,
}

/// Latest week with any resolved (played or voided) fixture.
pub fn current_week_index<'a>(fixtures: impl IntoIterator<Item = &'a FixtureRecord>) -> u32 {
    fixtures
        .into_iter()
        .filter(|f| f.status.is_resolved())
        .map(|f| f.week)
        .max()
        .unwrap_or(0)
}

/// Build the form guide for one division.
pub fn build_form_guide(
    fixtures: &[FixtureRecord],
    standings: &[StandingsRow],
) -> Result<FormGuide, DataIntegrityError> {
    let mut known: HashSet<&str> = HashSet::new();
    for row in standings {
        if !known.insert(row.team.as_str()) {
            return Err(DataIntegrityError::DuplicateStanding(row.team.clone()));
        }
    }
    validate_fixtures(fixtures, &known)?;

    // Later rows overwrite earlier ones for the same (team, week).
    let mut slots: HashMap<(&str, u32), &FixtureRecord> = HashMap::new();
    let mut duplicates: HashMap<&str, BTreeSet<u32>> = HashMap::new();
    for fixture in fixtures {
        for team in [fixture.home_team.as_str(), fixture.away_team.as_str()] {
            if slots.insert((team, fixture.week), fixture).is_some() {
                duplicates.entry(team).or_default().insert(fixture.week);
            }
        }
    }
    let effective = effective_fixtures(fixtures, &slots);

    let current_week = current_week_index(effective.iter().copied());
    let horizon_weeks: Vec<u32> = effective
        .iter()
        .map(|f| f.week)
        .filter(|w| *w <= current_week)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    debug!(
        "Aggregating {} fixtures ({} after de-duplication) for {} teams, current week {}",
        fixtures.len(),
        effective.len(),
        standings.len(),
        current_week
    );

    let mut entries = Vec::with_capacity(standings.len());
    for row in standings {
        let team = row.team.as_str();
        let sequence: Vec<TeamWeekResult> = horizon_weeks
            .iter()
            .map(|&week| week_result(team, week, slots.get(&(team, week)).copied()))
            .collect();

        let computed = tally(&sequence, |week| slots.get(&(team, week)).copied(), team);
        let duplicate_weeks: Vec<u32> = duplicates
            .get(team)
            .map(|weeks| weeks.iter().copied().collect())
            .unwrap_or_default();

        if !duplicate_weeks.is_empty() {
            warn!(
                "{}: duplicate fixture rows for week(s) {:?}; kept the last scraped row",
                team, duplicate_weeks
            );
        }

        let mismatch = computed.differs_from(row);
        if mismatch {
            warn!(
                "{}: official P{} W{} D{} L{} vs computed P{} W{} D{} L{}",
                team,
                row.played,
                row.won,
                row.drawn,
                row.lost,
                computed.played,
                computed.won,
                computed.drawn,
                computed.lost
            );
        }

        let entry = FormGuideEntry {
            team: row.team.clone(),
            sequence,
            computed,
            official: row.clone(),
            discrepancy: mismatch || !duplicate_weeks.is_empty(),
            duplicate_weeks,
        };
        debug!("{}: form {:?}", team, entry.badges());
        entries.push(entry);
    }

    let next_fixtures = standings
        .iter()
        .filter_map(|row| next_fixture(&row.team, &effective))
        .map(|nf| (nf.team.clone(), nf))
        .collect();

    Ok(FormGuide {
        current_week,
        horizon_weeks,
        entries,
        next_fixtures,
    })
}

/// Rows still holding at least one (team, week) slot, in input order.
fn effective_fixtures<'a>(
    fixtures: &'a [FixtureRecord],
    slots: &HashMap<(&'a str, u32), &'a FixtureRecord>,
) -> Vec<&'a FixtureRecord> {
    fixtures
        .iter()
        .filter(|f| {
            [f.home_team.as_str(), f.away_team.as_str()]
                .iter()
                .any(|team| {
                    slots
                        .get(&(*team, f.week))
                        .is_some_and(|kept| std::ptr::eq(*kept, *f))
                })
        })
        .collect()
}

/// Check team ids against the standings and the score invariant.
fn validate_fixtures(
    fixtures: &[FixtureRecord],
    known: &HashSet<&str>,
) -> Result<(), DataIntegrityError> {
    for fixture in fixtures {
        for team in [&fixture.home_team, &fixture.away_team] {
            if !known.contains(team.as_str()) {
                return Err(DataIntegrityError::UnknownTeam {
                    team: team.clone(),
                    week: fixture.week,
                });
            }
        }
        if fixture.status == FixtureStatus::Played
            && (fixture.home_score.is_none() || fixture.away_score.is_none())
        {
            return Err(DataIntegrityError::MissingScore {
                week: fixture.week,
                home: fixture.home_team.clone(),
                away: fixture.away_team.clone(),
            });
        }
    }
    Ok(())
}

/// Derive the badge for one team in one horizon week.
fn week_result(team: &str, week: u32, fixture: Option<&FixtureRecord>) -> TeamWeekResult {
    let Some(fixture) = fixture else {
        return TeamWeekResult {
            team: team.to_string(),
            week,
            badge: Badge::N,
            reason: BadgeReason::NoFixture,
            opponent: String::new(),
            score: None,
            week_date: None,
        };
    };

    let (badge, reason, score) = match fixture.status {
        FixtureStatus::Voided => {
            let original = fixture.voided_score.map(|(home, away)| {
                let (gf, ga) = if fixture.home_team == team {
                    (home, away)
                } else {
                    (away, home)
                };
                format!("{gf}–{ga}")
            });
            (Badge::V, BadgeReason::Voided, original)
        }
        FixtureStatus::Scheduled => (Badge::N, BadgeReason::Overdue, None),
        FixtureStatus::Played => {
            // validate_fixtures guarantees both scores
            let (gf, ga) = fixture.scores_for(team).unwrap_or_default();
            let badge = if gf > ga {
                Badge::W
            } else if gf < ga {
                Badge::L
            } else {
                Badge::D
            };
            (badge, BadgeReason::Played, Some(format!("{gf}–{ga}")))
        }
    };

    TeamWeekResult {
        team: team.to_string(),
        week,
        badge,
        reason,
        opponent: fixture.opponent_of(team).to_string(),
        score,
        week_date: fixture.week_date,
    }
}

/// Tally W/D/L (and goals) from a resolved sequence. V and N never count.
fn tally<'a>(
    sequence: &[TeamWeekResult],
    lookup: impl Fn(u32) -> Option<&'a FixtureRecord>,
    team: &str,
) -> ComputedRecord {
    let mut record = ComputedRecord::default();
    for result in sequence {
        match result.badge {
            Badge::W => {
                record.won += 1;
                record.points += 3;
            }
            Badge::D => {
                record.drawn += 1;
                record.points += 1;
            }
            Badge::L => record.lost += 1,
            Badge::N | Badge::V => continue,
        }
        record.played += 1;
        if let Some((gf, ga)) = lookup(result.week).and_then(|f| f.scores_for(team)) {
            record.goals_for += gf;
            record.goals_against += ga;
        }
    }
    record
}

/// Earliest scheduled fixture for a team; ties keep the first row.
fn next_fixture(team: &str, fixtures: &[&FixtureRecord]) -> Option<NextFixture> {
    let mut best: Option<&FixtureRecord> = None;
    for &fixture in fixtures
        .iter()
        .filter(|f| f.status == FixtureStatus::Scheduled && f.involves(team))
    {
        if best.map_or(true, |b| fixture.week < b.week) {
            best = Some(fixture);
        }
    }

    best.map(|f| NextFixture {
        team: team.to_string(),
        opponent: f.opponent_of(team).to_string(),
        week: f.week,
        home: f.home_team == team,
        venue_known: f.venue.is_some(),
        venue: f.venue.clone(),
        week_date: f.week_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_team_standings() -> Vec<StandingsRow> {
        vec![
            StandingsRow::new("A", 1, 1, 0, 0, 3),
            StandingsRow::new("B", 1, 0, 0, 1, 0),
        ]
    }

    fn entry<'a>(guide: &'a FormGuide, team: &str) -> &'a FormGuideEntry {
        guide.entries.iter().find(|e| e.team == team).unwrap()
    }

    #[test]
    fn test_single_played_fixture() {
        let fixtures = vec![FixtureRecord::played(1, "A", "B", 2, 1)];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();

        assert_eq!(guide.current_week, 1);
        assert_eq!(entry(&guide, "A").badges(), vec![Badge::W]);
        assert_eq!(entry(&guide, "B").badges(), vec![Badge::L]);
        assert!(!entry(&guide, "A").discrepancy);
        assert!(!entry(&guide, "B").discrepancy);
        assert_eq!(entry(&guide, "A").computed.goals_for, 2);
        assert_eq!(entry(&guide, "B").computed.goals_against, 2);
    }

    #[test]
    fn test_voided_week_excluded_from_tally() {
        let fixtures = vec![
            FixtureRecord::played(1, "A", "B", 2, 1),
            FixtureRecord::voided(2, "B", "A"),
        ];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();
        let a = entry(&guide, "A");

        assert_eq!(guide.current_week, 2);
        assert_eq!(a.badges(), vec![Badge::W, Badge::V]);
        assert_eq!(a.sequence[1].reason, BadgeReason::Voided);
        assert_eq!(a.computed.played, 1);
        assert_eq!(a.computed.won, 1);
        assert!(!a.discrepancy);
    }

    #[test]
    fn test_voided_original_score_shown_but_not_counted() {
        let fixtures = vec![
            FixtureRecord::played(1, "A", "B", 2, 1),
            FixtureRecord::voided(2, "B", "A").with_voided_score(3, 0),
        ];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();
        let a = entry(&guide, "A");

        assert_eq!(a.sequence[1].badge, Badge::V);
        assert_eq!(a.sequence[1].score.as_deref(), Some("0–3"));
        assert_eq!(entry(&guide, "B").sequence[1].score.as_deref(), Some("3–0"));
        assert_eq!(a.computed.goals_for, 2);
        assert_eq!(a.computed.goals_against, 1);
        assert!(!a.discrepancy);
    }

    #[test]
    fn test_team_without_fixtures() {
        let fixtures = vec![FixtureRecord::played(1, "A", "B", 0, 0)];
        let standings = vec![
            StandingsRow::new("A", 1, 0, 1, 0, 1),
            StandingsRow::new("B", 1, 0, 1, 0, 1),
            StandingsRow::new("C", 0, 0, 0, 0, 0),
            StandingsRow::new("D", 1, 1, 0, 0, 3),
        ];
        let guide = build_form_guide(&fixtures, &standings).unwrap();

        let c = entry(&guide, "C");
        assert_eq!(c.computed, ComputedRecord::default());
        assert!(!c.discrepancy);
        assert_eq!(c.badges(), vec![Badge::N]);
        assert_eq!(c.sequence[0].reason, BadgeReason::NoFixture);

        let d = entry(&guide, "D");
        assert_eq!(d.computed.played, 0);
        assert!(d.discrepancy);
    }

    #[test]
    fn test_future_weeks_omitted_and_overdue_is_n() {
        let fixtures = vec![
            FixtureRecord::played(1, "A", "B", 1, 3),
            FixtureRecord::scheduled(2, "A", "B"),
            FixtureRecord::played(3, "B", "A", 1, 1),
            FixtureRecord::scheduled(4, "A", "B"),
            FixtureRecord::scheduled(5, "B", "A"),
        ];
        let standings = vec![
            StandingsRow::new("A", 2, 0, 1, 1, 1),
            StandingsRow::new("B", 2, 1, 1, 0, 4),
        ];
        let guide = build_form_guide(&fixtures, &standings).unwrap();

        assert_eq!(guide.current_week, 3);
        assert_eq!(guide.horizon_weeks, vec![1, 2, 3]);
        let a = entry(&guide, "A");
        assert_eq!(a.badges(), vec![Badge::L, Badge::N, Badge::D]);
        assert_eq!(a.sequence[1].reason, BadgeReason::Overdue);
        assert_eq!(a.sequence[1].opponent, "B");
        assert!(!a.discrepancy);
    }

    #[test]
    fn test_sequences_have_equal_length() {
        let fixtures = vec![
            FixtureRecord::played(1, "A", "B", 1, 0),
            FixtureRecord::played(2, "C", "A", 2, 2),
            FixtureRecord::voided(4, "B", "C"),
            FixtureRecord::scheduled(6, "A", "C"),
        ];
        let standings = vec![
            StandingsRow::new("A", 2, 1, 1, 0, 4),
            StandingsRow::new("C", 1, 0, 1, 0, 1),
            StandingsRow::new("B", 1, 0, 0, 1, 0),
        ];
        let guide = build_form_guide(&fixtures, &standings).unwrap();

        assert_eq!(guide.current_week, 4);
        assert_eq!(guide.horizon_weeks, vec![1, 2, 4]);
        for e in &guide.entries {
            assert_eq!(e.sequence.len(), guide.horizon_weeks.len());
            let weeks: Vec<u32> = e.sequence.iter().map(|r| r.week).collect();
            assert_eq!(weeks, guide.horizon_weeks);
            assert_eq!(
                e.computed.played,
                e.computed.won + e.computed.drawn + e.computed.lost
            );
        }
    }

    #[test]
    fn test_no_resolved_fixtures_gives_empty_horizon() {
        let fixtures = vec![FixtureRecord::scheduled(1, "A", "B")];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();

        assert_eq!(guide.current_week, 0);
        assert!(guide.horizon_weeks.is_empty());
        assert!(guide.entries.iter().all(|e| e.sequence.is_empty()));
        assert_eq!(guide.next_fixtures["A"].week, 1);
    }

    #[test]
    fn test_preserves_standings_order() {
        let fixtures = vec![FixtureRecord::played(1, "A", "B", 5, 0)];
        // Official table ranks B first even though the data says otherwise.
        let standings = vec![
            StandingsRow::new("B", 1, 1, 0, 0, 3),
            StandingsRow::new("A", 1, 0, 0, 1, 0),
        ];
        let guide = build_form_guide(&fixtures, &standings).unwrap();

        let order: Vec<&str> = guide.entries.iter().map(|e| e.team.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert!(guide.entries.iter().all(|e| e.discrepancy));
    }

    #[test]
    fn test_unknown_team_is_integrity_error() {
        let fixtures = vec![FixtureRecord::played(1, "A", "Z", 1, 0)];
        let err = build_form_guide(&fixtures, &two_team_standings()).unwrap_err();
        assert_eq!(
            err,
            DataIntegrityError::UnknownTeam {
                team: "Z".to_string(),
                week: 1
            }
        );
    }

    #[test]
    fn test_played_without_score_is_integrity_error() {
        let mut fixture = FixtureRecord::played(1, "A", "B", 1, 0);
        fixture.away_score = None;
        let err = build_form_guide(&[fixture], &two_team_standings()).unwrap_err();
        assert!(matches!(err, DataIntegrityError::MissingScore { week: 1, .. }));
    }

    #[test]
    fn test_duplicate_standings_row_rejected() {
        let standings = vec![
            StandingsRow::new("A", 0, 0, 0, 0, 0),
            StandingsRow::new("A", 0, 0, 0, 0, 0),
        ];
        let err = build_form_guide(&[], &standings).unwrap_err();
        assert_eq!(err, DataIntegrityError::DuplicateStanding("A".to_string()));
    }

    #[test]
    fn test_duplicate_week_later_row_wins_and_flags() {
        let fixtures = vec![
            FixtureRecord::played(1, "A", "B", 0, 3),
            FixtureRecord::played(1, "A", "B", 2, 1),
        ];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();
        let a = entry(&guide, "A");

        assert_eq!(a.badges(), vec![Badge::W]);
        assert_eq!(a.computed.played, 1);
        assert_eq!(a.duplicate_weeks, vec![1]);
        assert!(!a.computed.differs_from(&a.official));
        assert!(a.discrepancy);
    }

    #[test]
    fn test_replaced_scheduled_row_is_not_next_fixture() {
        let fixtures = vec![
            FixtureRecord::scheduled(1, "A", "B"),
            FixtureRecord::played(1, "A", "B", 2, 1),
        ];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();

        assert_eq!(entry(&guide, "A").badges(), vec![Badge::W]);
        assert_eq!(entry(&guide, "A").duplicate_weeks, vec![1]);
        assert!(guide.next_fixtures.is_empty());
    }

    #[test]
    fn test_replaced_played_row_does_not_advance_current_week() {
        let fixtures = vec![
            FixtureRecord::played(1, "A", "B", 2, 1),
            FixtureRecord::played(3, "A", "B", 1, 0),
            FixtureRecord::scheduled(3, "A", "B"),
        ];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();

        assert_eq!(guide.current_week, 1);
        assert_eq!(guide.horizon_weeks, vec![1]);
        assert_eq!(entry(&guide, "A").badges(), vec![Badge::W]);
        assert_eq!(guide.next_fixtures["A"].week, 3);
        assert_eq!(entry(&guide, "B").duplicate_weeks, vec![3]);
    }

    #[test]
    fn test_next_fixture_is_minimum_scheduled_week() {
        let fixtures = vec![
            FixtureRecord::played(1, "A", "B", 1, 0),
            FixtureRecord::scheduled(7, "B", "A"),
            FixtureRecord::scheduled(3, "B", "A").with_venue("Field 2"),
            FixtureRecord::scheduled(5, "A", "B"),
        ];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();

        let next = &guide.next_fixtures["A"];
        assert_eq!(next.week, 3);
        assert_eq!(next.opponent, "B");
        assert!(!next.home);
        assert!(next.venue_known);
        assert_eq!(next.venue.as_deref(), Some("Field 2"));
        assert!(guide.next_fixtures["B"].home);
    }

    #[test]
    fn test_next_fixture_absent_when_none_scheduled() {
        let fixtures = vec![FixtureRecord::played(1, "A", "B", 2, 1)];
        let guide = build_form_guide(&fixtures, &two_team_standings()).unwrap();
        assert!(guide.next_fixtures.is_empty());
    }

    #[test]
    fn test_unordered_input_and_idempotence() {
        let fixtures = vec![
            FixtureRecord::played(3, "B", "A", 0, 0),
            FixtureRecord::played(1, "A", "B", 2, 1),
            FixtureRecord::played(2, "B", "A", 4, 1),
        ];
        let standings = vec![
            StandingsRow::new("A", 3, 1, 1, 1, 4),
            StandingsRow::new("B", 3, 1, 1, 1, 4),
        ];
        let first = build_form_guide(&fixtures, &standings).unwrap();
        let second = build_form_guide(&fixtures, &standings).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            entry(&first, "A").badges(),
            vec![Badge::W, Badge::L, Badge::D]
        );
        assert_eq!(entry(&first, "A").sequence[1].score.as_deref(), Some("1–4"));
    }
}
