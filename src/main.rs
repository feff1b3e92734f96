//! Formguide - weekly league form guide
//!
//! Scrapes official standings and fixture results for each configured
//! division, derives per-team weekly form, renders HTML and emails it.
//!
//! Exit codes:
//!   0 - Report built and delivered (possibly with divisions omitted)
//!   1 - Run aborted (login failure, every division failed, config or
//!       delivery error)

mod analysis;
mod cli;
mod config;
mod mail;
mod models;
mod report;
mod source;

use analysis::{assemble_report, RunConfig};
use anyhow::{anyhow, Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use mail::{GmailSink, MailSink, OutgoingMail};
use models::Report;
use source::{DataSource, PortalSource, SnapshotSource};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Formguide v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run aborted: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .formguide.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Add mail recipients, then adjust divisions and portal settings.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;
    let run_config = config.run_config(!args.quiet);

    let mut sink = if config.mail.enabled {
        Some(GmailSink::new(&config.mail)?)
    } else {
        None
    };
    let json_path = args.json.as_deref();

    let report = match args.snapshot {
        Some(ref dir) => {
            println!("📂 Reading snapshot: {}", dir.display());
            let mut source = SnapshotSource::new(dir.clone());
            publish(&config, &run_config, &mut source, sink.as_mut(), json_path).await?
        }
        None => {
            println!("🔐 Connecting to {}", config.portal.base_url);
            let mut source = PortalSource::new(&config.portal)?;
            publish(&config, &run_config, &mut source, sink.as_mut(), json_path).await?
        }
    };

    let output = PathBuf::from(&config.general.output);
    print_summary(&report, &output, start_time.elapsed().as_secs_f64());
    Ok(0)
}

/// Assemble, render and write the report, then mail it when a sink is given.
///
/// Nothing is written or sent if assembly aborts.
async fn publish<S: DataSource, M: MailSink>(
    config: &Config,
    run_config: &RunConfig,
    source: &mut S,
    sink: Option<&mut M>,
    json_path: Option<&Path>,
) -> Result<Report> {
    // Step 1: fetch and aggregate every division
    let report = build_report(run_config, source).await?;

    // Step 2: render
    println!("\n📝 Rendering report...");
    let output = PathBuf::from(&config.general.output);
    let full_html = report::render_full_report(&report, &config.general.title)?;
    report::write_output(&full_html, &output)?;
    info!("Full report written to {}", output.display());

    if let Some(json_path) = json_path {
        let json = report::generate_json_report(&report)?;
        report::write_output(&json, json_path)?;
        info!("JSON report written to {}", json_path.display());
    }

    // Step 3: deliver
    let Some(sink) = sink else {
        info!("Email disabled, report not sent");
        return Ok(report);
    };
    let mail = compose_mail(&report, full_html, config, run_config, &output)?;

    println!("📧 Sending to {} recipient(s)...", mail.recipients.len());
    let receipt = sink
        .send(&mail)
        .await
        .context("Failed to send report email")?;
    debug!(
        "Delivered message {} to {} recipient(s)",
        receipt.message_id, receipt.recipients
    );
    Ok(report)
}

fn compose_mail(
    report: &Report,
    full_html: String,
    config: &Config,
    run_config: &RunConfig,
    output: &Path,
) -> Result<OutgoingMail> {
    let inline = report
        .inline()
        .ok_or_else(|| anyhow!("inline division missing from the report"))?;
    let inline_html = report::render_inline(
        inline,
        report.generated_at,
        &config.general.title,
        &report.omitted,
    )?;

    Ok(OutgoingMail {
        subject: config.mail.subject.clone(),
        inline_html_body: inline_html,
        attachment_html: full_html,
        attachment_filename: attachment_name(output),
        recipients: run_config.recipients.clone(),
    })
}

async fn build_report<S: DataSource>(run_config: &RunConfig, source: &mut S) -> Result<Report> {
    let report = assemble_report(run_config, source).await?;
    for omitted in &report.omitted {
        warn!(
            "{} left out of this report: {}",
            omitted.division_name, omitted.reason
        );
    }
    Ok(report)
}

fn attachment_name(output: &Path) -> String {
    output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "form_guide.html".to_string())
}

fn print_summary(report: &Report, output: &Path, duration: f64) {
    println!("\n📊 Summary:");
    for division in &report.divisions {
        println!(
            "   {}: {} teams, week {}, {} discrepancies",
            division.division_name,
            division.entries.len(),
            division.current_week,
            division.discrepancy_count()
        );
    }
    if report.is_partial() {
        for omitted in &report.omitted {
            println!("   ⚠️  {}: omitted ({})", omitted.division_name, omitted.reason);
        }
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Done! Report saved to: {}", output.display());
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FailurePolicy;
    use crate::config::DivisionConfig;
    use crate::mail::{DeliveryError, DeliveryReceipt};
    use async_trait::async_trait;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        sent: Vec<OutgoingMail>,
    }

    #[async_trait]
    impl MailSink for RecordingSink {
        async fn send(&mut self, mail: &OutgoingMail) -> Result<DeliveryReceipt, DeliveryError> {
            self.sent.push(mail.clone());
            Ok(DeliveryReceipt {
                message_id: format!("msg-{}", self.sent.len()),
                recipients: mail.recipients.len(),
            })
        }
    }

    const STANDINGS: &str = r#"<app-league-group-table><table>
  <tr><td>1</td><td>Lions FC (D3)</td><td>1</td><td>1</td><td>0</td><td>0</td><td>2 / 1</td><td>+1</td><td>3</td></tr>
  <tr><td>2</td><td>Tigers (D3)</td><td>1</td><td>0</td><td>0</td><td>1</td><td>1 / 2</td><td>-1</td><td>0</td></tr>
</table></app-league-group-table>"#;

    const FIXTURES: &str = r#"[{"home_team_name": "Lions FC (D3)", "away_team_name": "Tigers (D3)",
        "home_team_score": 2, "away_team_score": 1, "week": 1}]"#;

    /// Snapshot with division 90 saved and division 91 missing.
    fn half_snapshot() -> TempDir {
        let dir = TempDir::new().unwrap();
        let division = dir.path().join("90");
        std::fs::create_dir(&division).unwrap();
        std::fs::write(division.join("standings.html"), STANDINGS).unwrap();
        std::fs::write(division.join("fixtures.json"), FIXTURES).unwrap();
        dir
    }

    fn two_division_config(policy: FailurePolicy, output: &Path) -> Config {
        let mut config = Config::default();
        config.divisions = vec![
            DivisionConfig {
                id: 90,
                name: "U11 Division 1".to_string(),
                slot: "panel-div1".to_string(),
            },
            DivisionConfig {
                id: 91,
                name: "U11 Division 2".to_string(),
                slot: "panel-div2".to_string(),
            },
        ];
        config.general.inline_division = 90;
        config.general.failure_policy = policy;
        config.general.output = output.to_string_lossy().into_owned();
        config.mail.recipients = vec!["coach@example.com".to_string()];
        config
    }

    #[tokio::test]
    async fn test_partial_report_is_mailed_with_surviving_division() {
        let snapshot = half_snapshot();
        let out = TempDir::new().unwrap();
        let output = out.path().join("guide.html");
        let config = two_division_config(FailurePolicy::Partial, &output);
        let run_config = config.run_config(false);
        let mut source = SnapshotSource::new(snapshot.path());
        let mut sink = RecordingSink::default();

        let report = publish(&config, &run_config, &mut source, Some(&mut sink), None)
            .await
            .unwrap();

        assert!(report.is_partial());
        assert_eq!(sink.sent.len(), 1);
        let mail = &sink.sent[0];
        assert_eq!(mail.recipients, vec!["coach@example.com".to_string()]);
        assert_eq!(mail.attachment_filename, "guide.html");
        assert!(mail.inline_html_body.contains("Lions FC"));
        assert!(mail.inline_html_body.contains("Missing this week: U11 Division 2"));
        assert!(mail.attachment_html.contains(r#"id="panel-div1""#));
        assert!(!mail.attachment_html.contains(r#"id="panel-div2""#));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), mail.attachment_html);
    }

    #[tokio::test]
    async fn test_fail_fast_sends_nothing() {
        let snapshot = half_snapshot();
        let out = TempDir::new().unwrap();
        let output = out.path().join("guide.html");
        let config = two_division_config(FailurePolicy::FailFast, &output);
        let run_config = config.run_config(false);
        let mut source = SnapshotSource::new(snapshot.path());
        let mut sink = RecordingSink::default();

        let result = publish(&config, &run_config, &mut source, Some(&mut sink), None).await;

        assert!(result.is_err());
        assert!(sink.sent.is_empty());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_mail_disabled_still_writes_report() {
        let snapshot = half_snapshot();
        let out = TempDir::new().unwrap();
        let output = out.path().join("guide.html");
        let json = out.path().join("guide.json");
        let config = two_division_config(FailurePolicy::Partial, &output);
        let run_config = config.run_config(false);
        let mut source = SnapshotSource::new(snapshot.path());

        let report = publish::<_, RecordingSink>(
            &config,
            &run_config,
            &mut source,
            None,
            Some(json.as_path()),
        )
        .await
        .unwrap();

        assert_eq!(report.divisions.len(), 1);
        assert!(output.exists());
        assert!(json.exists());
    }

    #[test]
    fn test_attachment_name() {
        assert_eq!(attachment_name(Path::new("out/form.html")), "form.html");
        assert_eq!(attachment_name(Path::new("/")), "form_guide.html");
    }
}
