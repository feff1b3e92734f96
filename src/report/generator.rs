//! HTML report generation.
//!
//! Converts the assembled report into view rows and renders them through
//! the askama templates in `templates/`.

use crate::models::{
    Badge, BadgeReason, DivisionReport, FormGuideEntry, NextFixture, OmittedDivision, Report,
    TeamWeekResult,
};
use anyhow::{Context, Result};
use askama::Template;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;

const DATE_FORMAT: &str = "%d %b %Y";

/// One form circle.
#[derive(Debug, Clone)]
struct BadgeView {
    letter: &'static str,
    style: String,
    tooltip: String,
}

/// One table row.
#[derive(Debug, Clone)]
struct RowView {
    position: u32,
    team: String,
    has_logo: bool,
    logo_url: String,
    played: u32,
    won: u32,
    drawn: u32,
    lost: u32,
    goals: String,
    gd_class: &'static str,
    gd_text: String,
    points: i64,
    badges: Vec<BadgeView>,
    next_main: String,
    next_meta: String,
    discrepancy: bool,
    discrepancy_note: String,
}

#[derive(Debug, Clone)]
struct DivisionView {
    name: String,
    slot: String,
    current_week: u32,
    active: bool,
    rows: Vec<RowView>,
}

#[derive(Debug, Clone)]
struct OmittedView {
    name: String,
    reason: String,
}

#[derive(Template)]
#[template(path = "full_report.html")]
struct FullReportTemplate<'a> {
    title: &'a str,
    generated: String,
    divisions: Vec<DivisionView>,
    omitted: Vec<OmittedView>,
}

#[derive(Template)]
#[template(path = "inline_email.html")]
struct InlineEmailTemplate<'a> {
    title: &'a str,
    generated: String,
    division: DivisionView,
    omitted: Vec<OmittedView>,
}

fn week_label(week: u32, date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => format!("Week {} — {}", week, d.format(DATE_FORMAT)),
        None => format!("Week {}", week),
    }
}

fn badge_style(badge: Badge) -> String {
    let color = badge.color();
    let mut style = format!(
        "display:inline-flex;align-items:center;justify-content:center;\
         width:24px;height:24px;border-radius:999px;border:2px solid {color};\
         font-size:11px;font-weight:700;margin-right:4px;"
    );
    if badge == Badge::V {
        style.push_str(
            "background:repeating-linear-gradient(45deg,\
             #9ca3af 0,#9ca3af 4px,#e5e7eb 4px,#e5e7eb 8px);color:#020617;",
        );
    } else {
        style.push_str(&format!("background:#020617;color:{color};"));
    }
    style
}

fn badge_tooltip(result: &TeamWeekResult) -> String {
    let when = week_label(result.week, result.week_date);
    match (result.badge, result.reason) {
        (Badge::V, _) => match result.score.as_deref() {
            Some(score) => format!(
                "Voided match\nvs {}\nOriginal score: {}\n{}",
                result.opponent, score, when
            ),
            None => format!("Voided match\nvs {}\n{}", result.opponent, when),
        },
        (_, BadgeReason::Overdue) => {
            format!("Not yet played (scheduled)\nvs {}\n{}", result.opponent, when)
        }
        (_, BadgeReason::NoFixture) => format!("No match played\n{}", when),
        (badge, _) => {
            let outcome = match badge {
                Badge::W => "Win",
                Badge::L => "Loss",
                _ => "Draw",
            };
            format!(
                "{}\nvs {}\nScore: {}\n{}",
                outcome,
                result.opponent,
                result.score.as_deref().unwrap_or("-"),
                when
            )
        }
    }
}

fn discrepancy_note(entry: &FormGuideEntry) -> String {
    let official = &entry.official;
    let computed = &entry.computed;
    let mut note = String::new();

    note.push_str(&format!(
        "Official P/W/D/L: {}/{}/{}/{}\n",
        official.played, official.won, official.drawn, official.lost
    ));
    note.push_str(&format!(
        "From fixtures: {}/{}/{}/{}",
        computed.played, computed.won, computed.drawn, computed.lost
    ));
    if !entry.duplicate_weeks.is_empty() {
        let weeks: Vec<String> = entry.duplicate_weeks.iter().map(u32::to_string).collect();
        note.push_str(&format!("\nDuplicate fixtures in week {}", weeks.join(", ")));
    }

    note
}

fn next_fixture_cells(next: Option<&NextFixture>) -> (String, String) {
    let Some(next) = next else {
        return ("No upcoming fixture".to_string(), "—".to_string());
    };

    let mut meta = week_label(next.week, next.week_date);
    if next.venue_known {
        if let Some(venue) = &next.venue {
            meta.push_str(&format!(" · {}", venue));
        }
    }
    (format!("v {}", next.opponent), meta)
}

fn row_view(index: usize, entry: &FormGuideEntry, division: &DivisionReport) -> RowView {
    let official = &entry.official;
    let gd = official.goal_difference;
    let (next_main, next_meta) = next_fixture_cells(division.next_fixtures.get(&entry.team));

    RowView {
        position: if official.position > 0 {
            official.position
        } else {
            index as u32 + 1
        },
        team: entry.team.clone(),
        has_logo: official.logo_url.is_some(),
        logo_url: official.logo_url.clone().unwrap_or_default(),
        played: official.played,
        won: official.won,
        drawn: official.drawn,
        lost: official.lost,
        goals: format!("{} / {}", official.goals_for, official.goals_against),
        gd_class: match gd {
            g if g > 0 => "gd-pos",
            g if g < 0 => "gd-neg",
            _ => "gd-zero",
        },
        gd_text: if gd > 0 {
            format!("+{}", gd)
        } else {
            gd.to_string()
        },
        points: official.points,
        badges: entry
            .sequence
            .iter()
            .map(|r| BadgeView {
                letter: r.badge.letter(),
                style: badge_style(r.badge),
                tooltip: badge_tooltip(r),
            })
            .collect(),
        next_main,
        next_meta,
        discrepancy: entry.discrepancy,
        discrepancy_note: if entry.discrepancy {
            discrepancy_note(entry)
        } else {
            String::new()
        },
    }
}

fn division_view(division: &DivisionReport, active: bool) -> DivisionView {
    DivisionView {
        name: division.division_name.clone(),
        slot: division.slot.clone(),
        current_week: division.current_week,
        active,
        rows: division
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| row_view(i, e, division))
            .collect(),
    }
}

fn omitted_views(omitted: &[OmittedDivision]) -> Vec<OmittedView> {
    omitted
        .iter()
        .map(|o| OmittedView {
            name: o.division_name.clone(),
            reason: o.reason.clone(),
        })
        .collect()
}

fn generated_label(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y %H:%M UTC").to_string()
}

/// Render the tabbed page covering every assembled division.
pub fn render_full_report(report: &Report, title: &str) -> Result<String> {
    let template = FullReportTemplate {
        title,
        generated: generated_label(report.generated_at),
        divisions: report
            .divisions
            .iter()
            .map(|d| division_view(d, d.division_id == report.inline_division))
            .collect(),
        omitted: omitted_views(&report.omitted),
    };
    template.render().context("Failed to render full report")
}

/// Render a single division as a standalone email body.
pub fn render_inline(
    division: &DivisionReport,
    generated_at: DateTime<Utc>,
    title: &str,
    omitted: &[OmittedDivision],
) -> Result<String> {
    let template = InlineEmailTemplate {
        title,
        generated: generated_label(generated_at),
        division: division_view(division, true),
        omitted: omitted_views(omitted),
    };
    template.render().context("Failed to render email body")
}

/// Serialize the report model as pretty JSON.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered output to disk.
pub fn write_output(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
