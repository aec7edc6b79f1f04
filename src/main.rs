// Entry point and high-level CLI flow.
//
// - Option [1] loads the dashboard export, printing diagnostics.
// - Option [2] generates the weekly documents, the portfolio report and the
//   chart payloads into the output directory.
// - Option [3] drops the cached export so the next step reads it again.
// With `--batch` the binary loads and generates once, then exits.
use chrono::Utc;
use clap::Parser;
use portfolio_report::cache::SnapshotCache;
use portfolio_report::config::Cli;
use portfolio_report::loader::{self, LoadReport};
use portfolio_report::types::{ChartPayload, ProjectRecord};
use portfolio_report::{output, render, reports, util, Result};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct Snapshot {
    projects: Vec<ProjectRecord>,
    load_report: LoadReport,
}

struct App {
    cli: Cli,
    cache: SnapshotCache<Snapshot>,
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
///
/// Returns `None` once stdin is closed.
fn read_choice() -> Option<String> {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask the user whether to go back to the selection menu after generating
/// reports.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        match io::stdin().read_line(&mut buf) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

impl App {
    fn new(cli: Cli) -> Self {
        let cache = SnapshotCache::new(cli.cache_ttl());
        App { cli, cache }
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.cache.get_or_load(|| {
            let (projects, load_report) = loader::load_projects_from_export(&self.cli.export_path)?;
            Ok(Snapshot {
                projects,
                load_report,
            })
        })
    }

    /// Handle option [1]: load the export and print what happened.
    fn handle_load(&self) -> Result<()> {
        let snapshot = self.snapshot()?;
        let report = &snapshot.load_report;
        println!(
            "Processing export... ({} projects loaded, {} tasks attached)",
            util::format_int(report.total_projects),
            util::format_int(report.total_tasks)
        );
        if report.parse_errors > 0 {
            println!(
                "Note: {} fields could not be parsed and were left empty.",
                util::format_int(report.parse_errors)
            );
        }
        if report.skipped_records > 0 {
            println!(
                "Note: {} entries skipped because they were not records.",
                util::format_int(report.skipped_records)
            );
        }
        if !report.unmatched_tasks.is_empty() {
            println!(
                "Warning: {} tasks did not match any project:",
                util::format_int(report.unmatched_tasks.len())
            );
            for task in &report.unmatched_tasks {
                println!("  - {}", task.name);
            }
        }
        println!();
        Ok(())
    }

    /// Handle option [3]: forget the cached export and load it again.
    fn handle_reload(&self) -> Result<()> {
        self.cache.invalidate();
        self.handle_load()
    }

    /// Handle option [2]: generate every report into the output directory.
    fn handle_generate_reports(&self) -> Result<()> {
        let snapshot = self.snapshot()?;
        let options = self.cli.options();
        let generated_at = Utc::now();
        let out = &self.cli.out_dir;

        let mut projects: &[ProjectRecord] = &snapshot.projects;
        if let Some(id) = self.cli.project_id {
            projects = std::slice::from_ref(reports::select_project(projects, id)?);
            let weekly =
                reports::generate_weekly_report(&snapshot.projects, id, &options, generated_at)?;
            output::write_json(&out.join(format!("weekly_report_{id}.json")), &weekly)?;
            output::write_text(
                &out.join(format!("weekly_report_{id}.txt")),
                &render::render_weekly_text(&weekly),
            )?;
        }

        println!("Generating reports...");
        let summaries = reports::summarise_portfolio(projects, &options);
        let portfolio = reports::compute_portfolio_report(projects);
        let mut charts: Vec<ChartPayload> = projects
            .iter()
            .map(|p| render::chart_payload(p, &reports::summarise_project(p, &options)))
            .collect();
        let mut portfolio_series = reports::man_day_series(projects);
        if self.cli.continuous_months {
            for chart in &mut charts {
                chart.man_days = reports::continuous_series(&chart.man_days);
            }
            portfolio_series = reports::continuous_series(&portfolio_series);
        }

        output::write_text(
            &out.join("weekly.md"),
            &render::render_markdown(&summaries, generated_at),
        )?;
        output::write_csv(&out.join("weekly.csv"), &render::csv_rows(&summaries))?;
        output::write_text(
            &out.join("weekly_email.txt"),
            &render::render_email(&summaries, generated_at),
        )?;
        output::write_json(&out.join("summaries.json"), &summaries)?;
        output::write_json(&out.join("portfolio.json"), &portfolio)?;
        output::write_json(
            &out.join("charts.json"),
            &serde_json::json!({
                "projects": charts,
                "man_days": portfolio_series,
            }),
        )?;
        info!(out_dir = %out.display(), projects = projects.len(), "reports written");
        println!("Outputs saved to {}\n", out.display());

        println!(
            "Portfolio: {} projects ({} active), {} tasks",
            util::format_int(portfolio.project_count),
            util::format_int(portfolio.active_projects),
            util::format_int(portfolio.total_tasks)
        );
        println!(
            "Budget: {} spent of {} allocated ({}% utilised)\n",
            util::format_currency(portfolio.budget.spent),
            util::format_currency(portfolio.budget.allocated),
            util::format_number(portfolio.budget.utilisation, 2)
        );
        output::preview_table("Project Health", None, &portfolio.project_health, 10);
        output::preview_table(
            "Project Progress",
            Some("Top 5 by completion"),
            &portfolio.project_progress,
            5,
        );
        output::preview_table(
            "Man-day Allocation",
            Some("Top 5 by estimated man-days"),
            &portfolio.man_day_allocation,
            5,
        );
        Ok(())
    }
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn report_error(e: &portfolio_report::ReportError) {
    error!(error = %e, "request failed");
    eprintln!("Error: {}\n", e);
}

fn run_batch(app: &App) -> Result<()> {
    app.handle_load()?;
    app.handle_generate_reports()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let app = App::new(cli);

    if app.cli.batch {
        return match run_batch(&app) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                report_error(&e);
                ExitCode::FAILURE
            }
        };
    }

    loop {
        println!("Select an option:");
        println!("[1] Load the export");
        println!("[2] Generate Reports");
        println!("[3] Reload the export\n");
        let Some(choice) = read_choice() else {
            return ExitCode::SUCCESS;
        };
        match choice.as_str() {
            "1" => {
                if let Err(e) = app.handle_load() {
                    report_error(&e);
                }
            }
            "2" => {
                println!();
                if let Err(e) = app.handle_generate_reports() {
                    report_error(&e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    return ExitCode::SUCCESS;
                }
            }
            "3" => {
                if let Err(e) = app.handle_reload() {
                    report_error(&e);
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1, 2 or 3.\n");
            }
        }
    }
}
