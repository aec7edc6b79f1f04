//! Document and chart renderings of aggregated summaries.
//!
//! Every number printed here comes from [`crate::reports`]; this module only
//! formats. Given the same summaries and `generated_at`, the output is
//! byte-for-byte identical, and the timestamp only ever appears in a header
//! line.

use crate::calendar::resolve_task_window;
use crate::error::Result;
use crate::output::write_csv_to;
use crate::reports::project_man_day_series;
use crate::status::{is_completed, COMPLETED, IN_PROGRESS, NOT_STARTED};
use crate::types::{
    ChartPayload, GanttEntry, ProjectRecord, ProjectSummary, ReportTask, WeeklyCsvRow,
    WeeklyReport,
};
use crate::util::{format_currency, format_percent};
use chrono::{DateTime, Utc};

const UNASSIGNED: &str = "Unassigned";
const NO_DATE: &str = "—";

pub fn format_timestamp(generated_at: DateTime<Utc>) -> String {
    generated_at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Gantt rows for one project: the project bar, then one bar per task with
/// monthly allocations. Tasks without allocations are left off.
///
/// The project bar uses the record's dates, falling back to the span of its
/// task bars; it is omitted when neither is known.
pub fn gantt_rows(project: &ProjectRecord, summary: &ProjectSummary) -> Vec<GanttEntry> {
    let project_key = format!("project-{}", id_or_placeholder(project.id));

    let task_rows: Vec<GanttEntry> = project
        .tasks
        .iter()
        .enumerate()
        .filter_map(|(idx, task)| {
            let window = resolve_task_window(&task.activities)?;
            Some(GanttEntry {
                id: match task.id {
                    Some(id) => format!("task-{id}"),
                    None => format!("task-pos-{}", idx + 1),
                },
                name: task.name.clone(),
                start: window.start,
                end: window.end,
                progress: if is_completed(task.status.as_deref()) { 100.0 } else { 0.0 },
                dependencies: None,
                css_class: "gantt-task".to_string(),
            })
        })
        .collect();

    let start = project
        .start_date
        .or_else(|| task_rows.iter().map(|r| r.start).min());
    let end = project
        .end_date
        .or_else(|| task_rows.iter().map(|r| r.end).max());

    let mut rows = Vec::with_capacity(task_rows.len() + 1);
    let has_project_row = match (start, end) {
        (Some(start), Some(end)) => {
            rows.push(GanttEntry {
                id: project_key.clone(),
                name: summary.project_name.clone(),
                start,
                end: end.max(start),
                progress: summary.completion_percentage,
                dependencies: None,
                css_class: "gantt-project".to_string(),
            });
            true
        }
        _ => false,
    };
    rows.extend(task_rows.into_iter().map(|mut row| {
        if has_project_row {
            row.dependencies = Some(project_key.clone());
        }
        row
    }));
    rows
}

pub fn chart_payload(project: &ProjectRecord, summary: &ProjectSummary) -> ChartPayload {
    ChartPayload {
        project_id: project.id,
        project_name: summary.project_name.clone(),
        gantt: gantt_rows(project, summary),
        man_days: project_man_day_series(project),
        stats: summary.stats,
    }
}

/// `due · name (owner, status)` entries joined with `; `.
pub fn format_upcoming_tasks(tasks: &[ReportTask]) -> String {
    tasks
        .iter()
        .map(|t| {
            let due = t
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| NO_DATE.to_string());
            format!(
                "{} · {} ({}, {})",
                due,
                t.name,
                t.owner.as_deref().unwrap_or(UNASSIGNED),
                t.status
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn render_markdown(summaries: &[ProjectSummary], generated_at: DateTime<Utc>) -> String {
    let mut lines = vec![
        "# Weekly portfolio update".to_string(),
        String::new(),
        format!("Generated {}", format_timestamp(generated_at)),
        String::new(),
    ];
    for summary in summaries {
        lines.push(markdown_for_project(summary));
    }
    lines.join("\n")
}

fn markdown_for_project(summary: &ProjectSummary) -> String {
    let mut lines = vec![
        format!("## {}", summary.project_name),
        String::new(),
        format!("**Owner:** {}", summary.owner.as_deref().unwrap_or(UNASSIGNED)),
        format!("**Status:** {}", summary.status),
        format!(
            "**Completion:** {}%",
            format_percent(summary.completion_percentage)
        ),
        String::new(),
        "### Status breakdown".to_string(),
    ];
    if summary.status_breakdown.is_empty() {
        lines.push("No tasks recorded for this project yet.".to_string());
    } else {
        lines.push("| Status | Tasks |".to_string());
        lines.push("| --- | ---: |".to_string());
        for (status, count) in summary.status_breakdown.ranked() {
            lines.push(format!("| {} | {} |", cell(status), count));
        }
    }

    let budget = &summary.budget;
    lines.extend([
        String::new(),
        "### Budget".to_string(),
        format!("Allocated: {}", format_currency(budget.allocated)),
        format!("Spent: {}", format_currency(budget.spent)),
        format!("Remaining: {}", format_currency(budget.remaining)),
    ]);

    if !summary.upcoming_tasks.is_empty() {
        lines.push(String::new());
        lines.push("### Upcoming tasks".to_string());
        lines.push("| Due | Task | Owner | Status |".to_string());
        lines.push("| --- | --- | --- | --- |".to_string());
        for task in &summary.upcoming_tasks {
            let due = task
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| NO_DATE.to_string());
            lines.push(format!(
                "| {} | {} | {} | {} |",
                due,
                cell(&task.name),
                cell(task.owner.as_deref().unwrap_or(UNASSIGNED)),
                cell(&task.status)
            ));
        }
    }

    if let Some(notes) = summary.notes.as_deref().filter(|n| !n.is_empty()) {
        lines.extend([String::new(), "### Notes".to_string(), notes.to_string()]);
    }

    lines.push(String::new());
    lines.join("\n")
}

// Pipes would split a table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

pub fn csv_rows(summaries: &[ProjectSummary]) -> Vec<WeeklyCsvRow> {
    summaries
        .iter()
        .map(|s| WeeklyCsvRow {
            project_id: s.project_id,
            project_name: s.project_name.clone(),
            owner: s.owner.clone().unwrap_or_default(),
            status: s.status.clone(),
            completion_percentage: s.completion_percentage,
            total_tasks: s.total_tasks,
            completed_tasks: s.status_breakdown.count(COMPLETED),
            in_progress_tasks: s.status_breakdown.count(IN_PROGRESS),
            not_started_tasks: s.status_breakdown.count(NOT_STARTED),
            budget_allocated: s.budget.allocated,
            budget_spent: s.budget.spent,
            budget_remaining: s.budget.remaining,
            upcoming_tasks: format_upcoming_tasks(&s.upcoming_tasks),
            notes: s.notes.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn render_csv(summaries: &[ProjectSummary]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv_to(&mut buf, &csv_rows(summaries))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// One plaintext line per project for email distribution.
pub fn email_digest_line(summary: &ProjectSummary) -> String {
    let mut components = vec![
        format!(
            "{} — {}% complete",
            summary.project_name,
            format_percent(summary.completion_percentage)
        ),
        format!("Status: {}", summary.status),
    ];
    if !summary.status_breakdown.is_empty() {
        let parts: Vec<String> = summary
            .status_breakdown
            .ranked()
            .into_iter()
            .map(|(status, count)| format!("{status}: {count}"))
            .collect();
        components.push(format!("Breakdown [{}]", parts.join(", ")));
    }
    let upcoming = format_upcoming_tasks(&summary.upcoming_tasks);
    if !upcoming.is_empty() {
        components.push(format!("Upcoming: {upcoming}"));
    }
    components.push(format!(
        "Budget {} spent / {} allocated",
        format_currency(summary.budget.spent),
        format_currency(summary.budget.allocated)
    ));
    components.join("; ")
}

pub fn render_email(summaries: &[ProjectSummary], generated_at: DateTime<Utc>) -> String {
    let mut lines = vec![
        format!(
            "Weekly portfolio update — generated {}",
            format_timestamp(generated_at)
        ),
        String::new(),
    ];
    lines.extend(summaries.iter().map(email_digest_line));
    lines.join("\n") + "\n"
}

/// Plaintext weekly report for a single project.
pub fn render_weekly_text(report: &WeeklyReport) -> String {
    let generated = report.generated_at.format("%Y-%m-%d %H:%M");
    let mut lines = vec![
        format!("Weekly report for {} ({})", report.project_name, generated),
        String::new(),
        format!(
            "Completion: {}%",
            format_percent(report.completion_percentage)
        ),
        "Status breakdown:".to_string(),
    ];
    for (status, count) in report.status_breakdown.ranked() {
        lines.push(format!("  - {status}: {count}"));
    }
    for task in &report.upcoming_tasks {
        let due = task
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| NO_DATE.to_string());
        lines.push(format!("Upcoming: {} · {}", due, task.name));
    }
    lines.push(format!(
        "Budget: {} spent / {} allocated",
        format_currency(report.budget.spent),
        format_currency(report.budget.allocated)
    ));
    if let Some(notes) = report.notes.as_deref().filter(|n| !n.is_empty()) {
        lines.extend([String::new(), "Notes:".to_string(), notes.to_string()]);
    }
    lines.join("\n") + "\n"
}

fn id_or_placeholder(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string())
}
