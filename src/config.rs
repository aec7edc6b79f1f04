//! Command-line and environment configuration.

use crate::reports::{ReportOptions, DEFAULT_UPCOMING_LIMIT};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Generate weekly portfolio reports from a project tracker export.
#[derive(Debug, Clone, Parser)]
#[command(name = "portfolio-report", version, about)]
pub struct Cli {
    /// Dashboard export (JSON) to load.
    #[arg(long, env = "TRACKER_EXPORT_PATH", default_value = "dashboard_export.json")]
    pub export_path: PathBuf,

    /// Directory the generated reports are written to.
    #[arg(long, env = "TRACKER_REPORT_DIR", default_value = "reports")]
    pub out_dir: PathBuf,

    /// Limit the reports to a single project.
    #[arg(long)]
    pub project_id: Option<i64>,

    /// Date used as "today" when selecting upcoming tasks (YYYY-MM-DD).
    #[arg(long, value_parser = parse_as_of)]
    pub as_of: Option<NaiveDate>,

    /// Upcoming tasks listed per project.
    #[arg(long, default_value_t = DEFAULT_UPCOMING_LIMIT)]
    pub upcoming_limit: usize,

    /// Seconds a loaded export is reused before it is read again.
    #[arg(long, env = "TRACKER_CACHE_TTL_SECS", default_value_t = 60)]
    pub cache_ttl_secs: u64,

    /// Chart man-day series on an unbroken month axis.
    #[arg(long)]
    pub continuous_months: bool,

    /// Load and generate once, then exit.
    #[arg(long)]
    pub batch: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn parse_as_of(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

impl Cli {
    pub fn options(&self) -> ReportOptions {
        ReportOptions {
            today: self.as_of.unwrap_or_else(|| Local::now().date_naive()),
            upcoming_limit: self.upcoming_limit,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
