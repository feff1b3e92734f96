//! Parsers for portal pages and fixture API payloads.

use super::SourceError;
use crate::models::{FixtureRecord, FixtureStatus, StandingsRow};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

const TABLE_ROW_SELECTORS: [&str; 2] = ["app-league-group-table tr", "table tr"];
const WEEK_HEADER_SELECTOR: &str = "app-fixture-list p.text-xs";
const FIXTURE_CARD_SELECTOR: &str = "app-fixture-list app-single-fixture";
const SCORE_BOX_SELECTOR: &str = "div.flex.flex-row.items-center.justify-center.gap-2";

fn division_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(D\d+\)").expect("valid division suffix regex"))
}

fn week_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Week\s+(\d+)").expect("valid week regex"))
}

fn goals_pair() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("valid goals regex"))
}

fn voided_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bvoided\b").expect("valid voided regex"))
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Scrape(format!("bad selector {css}: {e}")))
}

/// Collapse whitespace in an element's text.
fn cell_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip the portal's "(D3)" division marker from a team name.
pub fn team_id(raw: &str) -> String {
    division_suffix()
        .replace_all(raw, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a date as the portal prints it.
pub fn parse_portal_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim().trim_start_matches(['-', '–', ',']).trim();
    if let Some(date) = text
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
    {
        return Some(date);
    }
    [
        "%d %b %Y",
        "%d %B %Y",
        "%a, %d %b %Y",
        "%A, %d %B %Y",
        "%a %d %b %Y",
        "%A %d %B %Y",
        "%b %d, %Y",
        "%B %d, %Y",
    ]
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Parse a fixture-list header such as "Week 4 - Sat, 11 Oct 2025".
pub fn parse_week_header(header: &str) -> Option<(u32, Option<NaiveDate>)> {
    let week = week_number()
        .captures(header)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    let date = header
        .split_once('-')
        .and_then(|(_, rest)| parse_portal_date(rest));
    Some((week, date))
}

/// Parse the official league table from a tournament page.
///
/// Rows need at least nine cells: position, club, P, W, D, L, "GF / GA",
/// GD and PTS. Header rows and anything unparseable are skipped.
pub fn parse_standings_html(html: &str) -> Result<Vec<StandingsRow>, SourceError> {
    let document = Html::parse_document(html);
    let td = selector("td")?;
    let img = selector("img")?;

    let mut rows = Vec::new();
    for css in TABLE_ROW_SELECTORS {
        let tr = selector(css)?;
        rows = document.select(&tr).collect::<Vec<_>>();
        if !rows.is_empty() {
            break;
        }
    }

    let mut standings = Vec::new();
    for row in rows {
        let cells: Vec<ElementRef<'_>> = row.select(&td).collect();
        if cells.len() < 9 {
            continue;
        }
        let text: Vec<String> = cells.iter().map(cell_text).collect();

        let Ok(position) = text[0].parse::<u32>() else {
            continue;
        };
        let numbers: Result<Vec<u32>, _> = text[2..6].iter().map(|t| t.parse::<u32>()).collect();
        let Ok(numbers) = numbers else {
            continue;
        };
        let Some(goals) = goals_pair().captures(&text[6]) else {
            continue;
        };
        let goals_for: u32 = goals[1].parse().unwrap_or(0);
        let goals_against: u32 = goals[2].parse().unwrap_or(0);
        let goal_difference = text[7]
            .trim_start_matches('+')
            .parse::<i64>()
            .unwrap_or(goals_for as i64 - goals_against as i64);
        let points = text[8].parse::<i64>().unwrap_or(0);

        let logo_url = cells[1]
            .select(&img)
            .next()
            .and_then(|i| i.value().attr("src"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let mut row = StandingsRow::new(
            &team_id(&text[1]),
            numbers[0],
            numbers[1],
            numbers[2],
            numbers[3],
            points,
        );
        row.position = position;
        row.goals_for = goals_for;
        row.goals_against = goals_against;
        row.goal_difference = goal_difference;
        row.logo_url = logo_url;
        standings.push(row);
    }

    if standings.is_empty() {
        return Err(SourceError::Scrape("no league table rows found".to_string()));
    }
    debug!("Parsed official table for {} teams", standings.len());
    Ok(standings)
}

/// Build a league table from played fixtures.
///
/// Ranked by points, then goal difference, then goals scored; ties keep
/// name order. Every team named in any fixture gets a row.
pub fn standings_from_fixtures(fixtures: &[FixtureRecord]) -> Vec<StandingsRow> {
    let mut table: BTreeMap<&str, StandingsRow> = BTreeMap::new();
    for fixture in fixtures {
        for team in [&fixture.home_team, &fixture.away_team] {
            let row = table
                .entry(team.as_str())
                .or_insert_with(|| StandingsRow::new(team, 0, 0, 0, 0, 0));

            if fixture.status != FixtureStatus::Played {
                continue;
            }
            let Some((gf, ga)) = fixture.scores_for(team) else {
                continue;
            };
            row.played += 1;
            row.goals_for += gf;
            row.goals_against += ga;
            match gf.cmp(&ga) {
                Ordering::Greater => {
                    row.won += 1;
                    row.points += 3;
                }
                Ordering::Equal => {
                    row.drawn += 1;
                    row.points += 1;
                }
                Ordering::Less => row.lost += 1,
            }
        }
    }

    let mut rows: Vec<StandingsRow> = table.into_values().collect();
    for row in &mut rows {
        row.goal_difference = row.goals_for as i64 - row.goals_against as i64;
    }
    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.goal_difference.cmp(&a.goal_difference))
            .then(b.goals_for.cmp(&a.goals_for))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.position = i as u32 + 1;
    }
    debug!("Derived table for {} teams from fixtures", rows.len());
    rows
}

/// One rendered week of the portal's fixture list.
pub fn parse_fixture_week_html(html: &str) -> Result<Vec<FixtureRecord>, SourceError> {
    let document = Html::parse_document(html);
    let header_sel = selector(WEEK_HEADER_SELECTOR)?;
    let card_sel = selector(FIXTURE_CARD_SELECTOR)?;
    let score_sel = selector(SCORE_BOX_SELECTOR)?;
    let p_sel = selector("p")?;

    let header = document
        .select(&header_sel)
        .next()
        .map(|el| cell_text(&el))
        .ok_or_else(|| SourceError::Scrape("no week header in fixture list".to_string()))?;
    let (week, week_date) = parse_week_header(&header)
        .ok_or_else(|| SourceError::Scrape(format!("cannot parse week header '{header}'")))?;

    let mut fixtures = Vec::new();
    for card in document.select(&card_sel) {
        let names: Vec<String> = card
            .text()
            .filter(|t| division_suffix().is_match(t))
            .map(team_id)
            .collect();
        if names.len() < 2 {
            continue;
        }

        let voided = card.text().any(|t| voided_marker().is_match(t));
        let score = card.select(&score_sel).next().and_then(|boxed| {
            let parts: Vec<String> = boxed.select(&p_sel).map(|p| cell_text(&p)).collect();
            if parts.len() < 3 || !matches!(parts[1].as_str(), "-" | "–") {
                return None;
            }
            Some((parts[0].parse::<u32>().ok()?, parts[2].parse::<u32>().ok()?))
        });

        let mut record = match (voided, score) {
            (true, Some((h, a))) => {
                FixtureRecord::voided(week, &names[0], &names[1]).with_voided_score(h, a)
            }
            (true, None) => FixtureRecord::voided(week, &names[0], &names[1]),
            (false, Some((h, a))) => FixtureRecord::played(week, &names[0], &names[1], h, a),
            (false, None) => FixtureRecord::scheduled(week, &names[0], &names[1]),
        };
        record.week_date = week_date;
        fixtures.push(record);
    }

    debug!("Week {}: {} fixtures", week, fixtures.len());
    Ok(fixtures)
}

/// A fixture item as served by the fixtures API.
#[derive(Debug, Deserialize)]
struct ApiFixture {
    home_team_name: String,
    away_team_name: String,
    #[serde(default)]
    home_team_score: Option<u32>,
    #[serde(default)]
    away_team_score: Option<u32>,
    #[serde(default)]
    is_voided: Option<bool>,
    #[serde(default)]
    is_canceled: Option<bool>,
    #[serde(default, alias = "round", alias = "week_number")]
    week: Option<u32>,
    #[serde(default, alias = "date")]
    match_date: Option<String>,
    #[serde(default)]
    venue_name: Option<String>,
}

impl ApiFixture {
    fn into_record(self) -> Result<FixtureRecord, SourceError> {
        let home = team_id(&self.home_team_name);
        let away = team_id(&self.away_team_name);
        let week = self.week.filter(|w| *w > 0).ok_or_else(|| {
            SourceError::Scrape(format!("fixture {home} v {away} has no week number"))
        })?;

        let voided = self.is_voided.unwrap_or(false) || self.is_canceled.unwrap_or(false);
        let mut record = match (voided, self.home_team_score, self.away_team_score) {
            (true, Some(h), Some(a)) => {
                FixtureRecord::voided(week, &home, &away).with_voided_score(h, a)
            }
            (true, _, _) => FixtureRecord::voided(week, &home, &away),
            (false, Some(h), Some(a)) => FixtureRecord::played(week, &home, &away, h, a),
            _ => FixtureRecord::scheduled(week, &home, &away),
        };
        if let Some(date) = self.match_date.as_deref().and_then(parse_portal_date) {
            record = record.with_week_date(date);
        }
        if let Some(venue) = self.venue_name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            record = record.with_venue(venue);
        }
        Ok(record)
    }
}

/// Parse the fixtures API payload: a bare array or `{"data": [...]}`.
pub fn parse_fixtures_json(body: &str) -> Result<Vec<FixtureRecord>, SourceError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SourceError::Scrape(format!("fixtures payload is not JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(SourceError::Scrape(
                    "fixtures payload has no data array".to_string(),
                ))
            }
        },
        _ => return Err(SourceError::Scrape("unexpected fixtures payload".to_string())),
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<ApiFixture>(item)
                .map_err(|e| SourceError::Scrape(format!("bad fixture item: {e}")))
                .and_then(ApiFixture::into_record)
        })
        .collect()
}
