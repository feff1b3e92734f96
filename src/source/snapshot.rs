//! Offline adapter over saved portal pages.
//!
//! Layout, one sub-directory per division id:
//!
//! ```text
//! <root>/92/standings.html    (or standings.json)
//! <root>/92/fixtures.json     (or fixtures/week-01.html, ...)
//! ```

use super::parse::{parse_fixture_week_html, parse_fixtures_json, parse_standings_html};
use super::{DataSource, SourceError};
use crate::models::{FixtureRecord, StandingsRow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Reads standings and fixtures from a snapshot directory.
pub struct SnapshotSource {
    root: PathBuf,
}

async fn read_file(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::Scrape(format!("cannot read {}: {e}", path.display())))
}

/// Saved week pages, in file name order.
fn week_pages(dir: &Path) -> Vec<PathBuf> {
    let mut pages: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "html"))
        .collect();
    pages.sort();
    pages
}

impl SnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn division_dir(&self, division_id: u32) -> Result<PathBuf, SourceError> {
        let dir = self.root.join(division_id.to_string());
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(SourceError::Scrape(format!(
                "no snapshot for division {} under {}",
                division_id,
                self.root.display()
            )))
        }
    }
}

#[async_trait]
impl DataSource for SnapshotSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::Scrape(format!(
                "snapshot directory {} does not exist",
                self.root.display()
            )));
        }
        info!("Reading snapshot from {}", self.root.display());
        Ok(())
    }

    async fn fetch_standings(&self, division_id: u32) -> Result<Vec<StandingsRow>, SourceError> {
        let dir = self.division_dir(division_id)?;

        let html = dir.join("standings.html");
        if html.is_file() {
            return parse_standings_html(&read_file(&html).await?);
        }

        let json = dir.join("standings.json");
        if json.is_file() {
            let content = read_file(&json).await?;
            return serde_json::from_str(&content)
                .map_err(|e| SourceError::Scrape(format!("{}: {e}", json.display())));
        }

        Err(SourceError::Scrape(format!(
            "no standings file in {}",
            dir.display()
        )))
    }

    async fn fetch_fixtures(&self, division_id: u32) -> Result<Vec<FixtureRecord>, SourceError> {
        let dir = self.division_dir(division_id)?;

        let json = dir.join("fixtures.json");
        if json.is_file() {
            return parse_fixtures_json(&read_file(&json).await?);
        }

        let pages = week_pages(&dir.join("fixtures"));
        if pages.is_empty() {
            return Err(SourceError::Scrape(format!(
                "no fixtures in {}",
                dir.display()
            )));
        }

        let mut fixtures = Vec::new();
        for page in pages {
            let week = parse_fixture_week_html(&read_file(&page).await?)?;
            debug!("{}: {} fixtures", page.display(), week.len());
            fixtures.extend(week);
        }
        Ok(fixtures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FixtureStatus;
    use std::fs;

    const WEEK_1: &str = r#"<app-fixture-list>
  <p class="text-xs">Week 1 - 20 Sep 2025</p>
  <app-single-fixture>
    <span>Lions (D3)</span>
    <div class="flex flex-row items-center justify-center gap-2"><p>2</p><p>-</p><p>1</p></div>
    <span>Tigers (D3)</span>
  </app-single-fixture>
</app-fixture-list>"#;

    const WEEK_2: &str = r#"<app-fixture-list>
  <p class="text-xs">Week 2 - 27 Sep 2025</p>
  <app-single-fixture><span>Tigers (D3)</span><span>vs</span><span>Lions (D3)</span></app-single-fixture>
</app-fixture-list>"#;

    fn write_division(root: &Path, id: u32) -> PathBuf {
        let dir = root.join(id.to_string());
        fs::create_dir_all(dir.join("fixtures")).unwrap();
        fs::write(
            dir.join("standings.json"),
            r#"[{"team": "Lions", "played": 1, "won": 1, "drawn": 0, "lost": 0, "points": 3},
                {"team": "Tigers", "played": 1, "won": 0, "drawn": 0, "lost": 1, "points": 0}]"#,
        )
        .unwrap();
        fs::write(dir.join("fixtures/week-02.html"), WEEK_2).unwrap();
        fs::write(dir.join("fixtures/week-01.html"), WEEK_1).unwrap();
        fs::write(dir.join("fixtures/notes.txt"), "ignored").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reads_json_standings_and_week_pages() {
        let root = tempfile::tempdir().unwrap();
        write_division(root.path(), 92);
        let mut source = SnapshotSource::new(root.path());
        source.connect().await.unwrap();

        let standings = source.fetch_standings(92).await.unwrap();
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].team, "Lions");
        assert_eq!(standings[0].points, 3);

        let fixtures = source.fetch_fixtures(92).await.unwrap();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].week, 1);
        assert_eq!(fixtures[0].status, FixtureStatus::Played);
        assert_eq!(fixtures[1].week, 2);
        assert_eq!(fixtures[1].status, FixtureStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_fixtures_json_preferred() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_division(root.path(), 90);
        fs::write(
            dir.join("fixtures.json"),
            r#"[{"home_team_name": "Lions", "away_team_name": "Tigers", "is_voided": true, "week": 3}]"#,
        )
        .unwrap();

        let source = SnapshotSource::new(root.path());
        let fixtures = source.fetch_fixtures(90).await.unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].status, FixtureStatus::Voided);
    }

    #[tokio::test]
    async fn test_missing_division_is_scrape_error() {
        let root = tempfile::tempdir().unwrap();
        let source = SnapshotSource::new(root.path());
        assert!(matches!(
            source.fetch_standings(91).await,
            Err(SourceError::Scrape(_))
        ));
        assert!(matches!(
            source.fetch_fixtures(91).await,
            Err(SourceError::Scrape(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_root_fails_connect() {
        let root = tempfile::tempdir().unwrap();
        let mut source = SnapshotSource::new(root.path().join("nope"));
        assert!(source.connect().await.is_err());
    }
}
