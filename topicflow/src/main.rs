//! topicflow: runs the daily per-topic generation, polling and conversion job.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;

use topicflow::app::{open_run_sink, Collaborators, Runner};
use topicflow::config::AppConfig;
use topicflow::summary::UploadStatus;
use topicflow::utils::{parse_run_date, today_utc};

// ── CLI ─────────────────────────────────────────────────────────────

/// Drives each topic's page, waits for its artifact and converts it.
#[derive(Parser, Debug)]
#[command(name = "topicflow", version, about)]
struct Cli {
    /// Path to a JSON config file.
    #[arg(long, env = "TOPICFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Run date (YYYY-MM-DD); defaults to today in UTC.
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Directory for the summary file, record and screenshots.
    #[arg(long)]
    summary_dir: Option<PathBuf>,

    /// Only process this topic (repeatable).
    #[arg(long = "only", value_name = "TOPIC")]
    only: Vec<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    /// Skip uploading the summary.
    #[arg(long)]
    no_upload: bool,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_run_date(value).map_err(|e| e.to_string())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.apply_env()?;
    if let Some(dir) = cli.summary_dir {
        config.summary_dir = dir;
    }
    config.validate()?;

    let run_date = cli.date.unwrap_or_else(today_utc);
    let sink = open_run_sink(&config, run_date).context("opening run log")?;

    let mut collaborators = Collaborators::from_config(&config)?;
    if cli.no_upload {
        collaborators.uploader = None;
    }

    let runner = Runner::new(config, collaborators, sink)?;
    let report = runner.run(run_date, &cli.only).await;

    info!(
        run_id = %report.summary.run_id(),
        succeeded = report.summary.succeeded(),
        failed = report.summary.failed(),
        digest = %report.publish.digest,
        uploaded = matches!(report.publish.upload, UploadStatus::Completed { .. }),
        "run finished"
    );
    Ok(())
}
