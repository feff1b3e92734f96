//! Configuration file handling.
//!
//! This module handles loading, validating and merging configuration from
//! `.formguide.toml` files.

use crate::analysis::{DivisionSpec, FailurePolicy, RunConfig};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".formguide.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Divisions in render order.
    #[serde(default = "default_divisions")]
    pub divisions: Vec<DivisionConfig>,

    /// League portal settings.
    #[serde(default)]
    pub portal: PortalConfig,

    /// Email delivery settings.
    #[serde(default)]
    pub mail: MailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            divisions: default_divisions(),
            portal: PortalConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Page and email heading.
    #[serde(default = "default_title")]
    pub title: String,

    /// Path of the full HTML report.
    #[serde(default = "default_output")]
    pub output: String,

    /// Behaviour when a single division fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Division id rendered into the email body.
    #[serde(default = "default_inline_division")]
    pub inline_division: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            output: default_output(),
            failure_policy: FailurePolicy::default(),
            inline_division: default_inline_division(),
        }
    }
}

fn default_title() -> String {
    "YFL Dubai — Under 11 Form Guide".to_string()
}

fn default_output() -> String {
    "yfl_u11_form_guide.html".to_string()
}

fn default_inline_division() -> u32 {
    92
}

/// One league division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionConfig {
    /// Portal tournament id.
    pub id: u32,

    /// Display name.
    pub name: String,

    /// Panel id in the full report.
    pub slot: String,
}

fn default_divisions() -> Vec<DivisionConfig> {
    [(90, "U11 Division 1"), (91, "U11 Division 2"), (92, "U11 Division 3")]
        .into_iter()
        .enumerate()
        .map(|(i, (id, name))| DivisionConfig {
            id,
            name: name.to_string(),
            slot: format!("panel-div{}", i + 1),
        })
        .collect()
}

/// Where live standings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StandingsMode {
    /// Scrape the tournament page; derive from fixtures if it has no table.
    #[default]
    Auto,
    /// Scrape the tournament page only.
    Page,
    /// Derive the table from the fixtures API.
    Fixtures,
}

/// League portal settings.
///
/// Credentials are never stored here, only the names of the environment
/// variables that hold them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal web root, used for standings pages.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Fixtures API root.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Standings page, fixtures-derived table, or page with fallback.
    #[serde(default)]
    pub standings: StandingsMode,

    /// Organizer slug in API paths.
    #[serde(default = "default_organizer")]
    pub organizer: String,

    /// Competition id passed to the fixtures API.
    #[serde(default = "default_competition_id")]
    pub competition_id: u32,

    /// Environment variable holding the login username.
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Environment variable holding the login password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Environment variable holding a ready-made API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User-Agent header for every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_base: default_api_base(),
            standings: StandingsMode::default(),
            organizer: default_organizer(),
            competition_id: default_competition_id(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            token_env: default_token_env(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://leaguehub-yfl.sportstack.ai".to_string()
}

fn default_api_base() -> String {
    "https://api.sportstack.ai/api/v1".to_string()
}

fn default_organizer() -> String {
    "yfl".to_string()
}

fn default_competition_id() -> u32 {
    4
}

fn default_username_env() -> String {
    "YFL_USERNAME".to_string()
}

fn default_password_env() -> String {
    "YFL_PASSWORD".to_string()
}

fn default_token_env() -> String {
    "SPORTSTACK_API_TOKEN".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("formguide/{}", env!("CARGO_PKG_VERSION"))
}

/// Email delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Send the report by email.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Recipient addresses.
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Subject line.
    #[serde(default = "default_subject")]
    pub subject: String,

    /// OAuth authorized-user token file.
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// Gmail API root.
    #[serde(default = "default_gmail_api")]
    pub api_base: String,

    /// OAuth token endpoint used when the file carries none.
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipients: Vec::new(),
            subject: default_subject(),
            token_path: default_token_path(),
            api_base: default_gmail_api(),
            token_url: default_token_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_subject() -> String {
    "YFL Weekly U11 Form Guide (All Divisions)".to_string()
}

fn default_token_path() -> String {
    "gmail_token.json".to_string()
}

fn default_gmail_api() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if args.fail_fast {
            self.general.failure_policy = FailurePolicy::FailFast;
        }

        if args.no_email {
            self.mail.enabled = false;
        }
    }

    /// Reject settings that cannot produce a sensible run.
    pub fn validate(&self) -> Result<()> {
        if self.divisions.is_empty() {
            bail!("No divisions configured");
        }

        let mut seen = HashSet::new();
        for division in &self.divisions {
            if !seen.insert(division.id) {
                bail!("Division id {} is configured more than once", division.id);
            }
            if division.slot.trim().is_empty() {
                bail!("Division {} has an empty slot", division.id);
            }
        }

        if !seen.contains(&self.general.inline_division) {
            bail!(
                "Inline division {} is not one of the configured divisions",
                self.general.inline_division
            );
        }

        if self.mail.enabled && self.mail.recipients.is_empty() {
            bail!("Email is enabled but no recipients are configured");
        }

        Ok(())
    }

    /// The immutable settings handed to the assembler.
    pub fn run_config(&self, show_progress: bool) -> RunConfig {
        RunConfig {
            divisions: self
                .divisions
                .iter()
                .map(|d| DivisionSpec {
                    id: d.id,
                    name: d.name.clone(),
                    slot: d.slot.clone(),
                })
                .collect(),
            inline_division: self.general.inline_division,
            recipients: self.mail.recipients.clone(),
            failure_policy: self.general.failure_policy,
            show_progress,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_recipient() -> Config {
        let mut config = Config::default();
        config.mail.recipients = vec!["coach@example.com".to_string()];
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.divisions.len(), 3);
        assert_eq!(config.divisions[2].id, 92);
        assert_eq!(config.divisions[2].slot, "panel-div3");
        assert_eq!(config.general.inline_division, 92);
        assert_eq!(config.general.failure_policy, FailurePolicy::Partial);
        assert_eq!(config.portal.token_env, "SPORTSTACK_API_TOKEN");
        assert_eq!(config.portal.standings, StandingsMode::Auto);
        assert!(config.mail.enabled);
    }

    #[test]
    fn test_empty_file_is_valid_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.divisions.len(), 3);
        assert_eq!(config.general.output, "yfl_u11_form_guide.html");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "out.html"
failure_policy = "fail-fast"
inline_division = 7

[[divisions]]
id = 7
name = "U9 Division 1"
slot = "panel-a"

[portal]
competition_id = 9
standings = "fixtures"

[mail]
recipients = ["a@example.com", "b@example.com"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "out.html");
        assert_eq!(config.general.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.divisions.len(), 1);
        assert_eq!(config.divisions[0].name, "U9 Division 1");
        assert_eq!(config.portal.competition_id, 9);
        assert_eq!(config.portal.standings, StandingsMode::Fixtures);
        assert_eq!(config.portal.organizer, "yfl");
        assert_eq!(config.mail.recipients.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[general]\ntitle = \"Weekly\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.general.title, "Weekly");

        std::fs::write(&path, "[general\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(with_recipient().validate().is_ok());

        // mail enabled without recipients
        assert!(Config::default().validate().is_err());

        let mut config = with_recipient();
        config.general.inline_division = 1;
        assert!(config.validate().is_err());

        let mut config = with_recipient();
        config.divisions[1].id = 90;
        assert!(config.validate().is_err());

        let mut config = with_recipient();
        config.divisions.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mail.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_config() {
        let config = with_recipient();
        let run = config.run_config(false);
        assert_eq!(run.divisions.len(), 3);
        assert_eq!(run.divisions[0].id, 90);
        assert_eq!(run.inline_division, 92);
        assert_eq!(run.recipients, vec!["coach@example.com"]);
        assert!(!run.show_progress);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[[divisions]]"));
        assert!(toml_str.contains("[portal]"));
        assert!(toml_str.contains("[mail]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.divisions, Config::default().divisions);
    }
}
