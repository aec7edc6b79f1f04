use crate::calendar::{duration_months, months_between};
use crate::error::{ReportError, Result};
use crate::status::{is_active, is_completed, normalize_status};
use crate::types::{
    BudgetSummary, ManDayAllocation, ManDaySeries, Month, PortfolioReport, ProjectBudget,
    ProjectHealthBreakdown, ProjectProgressSummary, ProjectRecord, ProjectStats, ProjectSummary,
    ReportTask, StatusBreakdown, TaskRecord, TaskStatusBreakdown, WeeklyReport,
};
use crate::util::{percentage, round2};
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const DEFAULT_UPCOMING_LIMIT: usize = 5;

/// Man-day estimate assumed for a task that carries none, when ranking
/// projects by effort.
pub const FALLBACK_TASK_MAN_DAYS: f64 = 1.0;

/// Caller-supplied inputs that are not part of the record snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    /// Tasks due on or after this date count as upcoming.
    pub today: NaiveDate,
    pub upcoming_limit: usize,
}

impl ReportOptions {
    pub fn new(today: NaiveDate) -> Self {
        ReportOptions {
            today,
            upcoming_limit: DEFAULT_UPCOMING_LIMIT,
        }
    }
}

pub fn compute_status_breakdown(tasks: &[TaskRecord]) -> StatusBreakdown {
    tasks
        .iter()
        .map(|t| normalize_status(t.status.as_deref()))
        .collect()
}

pub fn completed_count(tasks: &[TaskRecord]) -> usize {
    tasks
        .iter()
        .filter(|t| is_completed(t.status.as_deref()))
        .count()
}

/// Share of completed tasks, two decimals; `0.0` for a project without tasks.
pub fn compute_completion_percentage(tasks: &[TaskRecord]) -> f64 {
    round2(percentage(completed_count(tasks) as f64, tasks.len() as f64))
}

pub fn budget_summary(project: &ProjectRecord) -> BudgetSummary {
    let allocated = project.budget_allocated.unwrap_or(0.0);
    let spent = project.budget_spent.unwrap_or(0.0);
    BudgetSummary {
        allocated: round2(allocated),
        spent: round2(spent),
        remaining: round2((allocated - spent).max(0.0)),
        utilisation: round2(percentage(spent, allocated)),
    }
}

/// Tasks due on or after `today`, soonest first. Equal due dates keep
/// their input order.
pub fn upcoming_tasks(tasks: &[TaskRecord], today: NaiveDate, limit: usize) -> Vec<ReportTask> {
    let mut upcoming: Vec<(NaiveDate, &TaskRecord)> = tasks
        .iter()
        .filter_map(|t| t.due_date.filter(|d| *d >= today).map(|d| (d, t)))
        .collect();
    upcoming.sort_by_key(|(due, _)| *due);
    upcoming
        .into_iter()
        .take(limit)
        .map(|(due, t)| ReportTask {
            id: t.id,
            name: t.name.clone(),
            owner: t.owner.clone(),
            status: normalize_status(t.status.as_deref()),
            due_date: Some(due),
        })
        .collect()
}

/// Duration in months, explicit man-days, and project plus task budgets.
pub fn project_stats(project: &ProjectRecord) -> ProjectStats {
    let duration = match (project.start_date, project.end_date) {
        (Some(start), Some(end)) => Some(duration_months(start, end)),
        _ => None,
    };
    let total_man_days: f64 = project.tasks.iter().filter_map(|t| t.man_days).sum();
    let task_budgets: f64 = project.tasks.iter().filter_map(|t| t.budget).sum();
    ProjectStats {
        duration_months: duration,
        total_man_days: round2(total_man_days),
        total_budget: round2(project.budget_allocated.unwrap_or(0.0) + task_budgets),
    }
}

pub fn summarise_project(project: &ProjectRecord, options: &ReportOptions) -> ProjectSummary {
    let tasks = &project.tasks;
    ProjectSummary {
        project_id: project.id,
        project_name: display_name(project),
        owner: project.owner.clone(),
        status: normalize_status(project.status.as_deref()),
        completion_percentage: compute_completion_percentage(tasks),
        total_tasks: tasks.len(),
        completed_tasks: completed_count(tasks),
        status_breakdown: compute_status_breakdown(tasks),
        budget: budget_summary(project),
        upcoming_tasks: upcoming_tasks(tasks, options.today, options.upcoming_limit),
        notes: project.notes.clone(),
        stats: project_stats(project),
    }
}

/// Summaries for every project, ordered by case-insensitive name.
pub fn summarise_portfolio(projects: &[ProjectRecord], options: &ReportOptions) -> Vec<ProjectSummary> {
    let mut summaries: Vec<ProjectSummary> = projects
        .iter()
        .map(|p| summarise_project(p, options))
        .collect();
    summaries.sort_by_cached_key(|s| s.project_name.to_lowercase());
    summaries
}

pub fn select_project(projects: &[ProjectRecord], project_id: i64) -> Result<&ProjectRecord> {
    projects
        .iter()
        .find(|p| p.id == Some(project_id))
        .ok_or_else(|| ReportError::project_not_found(project_id))
}

pub fn generate_weekly_report(
    projects: &[ProjectRecord],
    project_id: i64,
    options: &ReportOptions,
    generated_at: DateTime<Utc>,
) -> Result<WeeklyReport> {
    let project = select_project(projects, project_id)?;
    let summary = summarise_project(project, options);
    Ok(WeeklyReport {
        project_id,
        project_name: summary.project_name,
        generated_at,
        status_breakdown: summary.status_breakdown,
        completion_percentage: summary.completion_percentage,
        budget: ProjectBudget::from(summary.budget),
        upcoming_tasks: summary.upcoming_tasks,
        notes: summary.notes,
    })
}

/// Effort used to rank projects: the explicit estimate, or one man-day per
/// task that has none. Independent of the monthly split used for charts.
pub fn estimated_man_days(task: &TaskRecord) -> f64 {
    task.man_days.unwrap_or(FALLBACK_TASK_MAN_DAYS)
}

/// Running man-day totals keyed by month. A month enters at `0.0` the first
/// time a share is added to it.
#[derive(Debug, Default)]
struct MonthTotals(BTreeMap<Month, f64>);

impl MonthTotals {
    // Split the task's estimate evenly over the distinct months it touches.
    fn add_task(&mut self, task: &TaskRecord) {
        let months: BTreeSet<Month> = task.activities.iter().map(|a| a.month).collect();
        if months.is_empty() {
            return;
        }
        let share = task.man_days.unwrap_or(0.0) / months.len() as f64;
        for month in months {
            *self.0.entry(month).or_insert(0.0) += share;
        }
    }

    fn into_series(self) -> ManDaySeries {
        let (labels, values) = self
            .0
            .into_iter()
            .filter(|(_, total)| *total != 0.0)
            .map(|(month, total)| (month, round2(total)))
            .unzip();
        ManDaySeries { labels, values }
    }
}

pub fn project_man_day_series(project: &ProjectRecord) -> ManDaySeries {
    man_day_series(std::slice::from_ref(project))
}

pub fn man_day_series(projects: &[ProjectRecord]) -> ManDaySeries {
    let mut totals = MonthTotals::default();
    for task in projects.iter().flat_map(|p| p.tasks.iter()) {
        totals.add_task(task);
    }
    totals.into_series()
}

/// The same series on an unbroken month axis: months between the first and
/// last label that had no effort are filled in with `0.0`.
pub fn continuous_series(series: &ManDaySeries) -> ManDaySeries {
    let (Some(first), Some(last)) = (series.labels.first(), series.labels.last()) else {
        return ManDaySeries::default();
    };
    let known: BTreeMap<Month, f64> = series
        .labels
        .iter()
        .copied()
        .zip(series.values.iter().copied())
        .collect();
    let labels = months_between(*first, *last);
    let values = labels
        .iter()
        .map(|m| known.get(m).copied().unwrap_or(0.0))
        .collect();
    ManDaySeries { labels, values }
}

/// Portfolio budget sums, kept at full precision until the report is built.
#[derive(Debug, Default)]
struct BudgetTotals {
    allocated: f64,
    spent: f64,
}

impl BudgetTotals {
    fn add(&mut self, project: &ProjectRecord) {
        self.allocated += project.budget_allocated.unwrap_or(0.0);
        self.spent += project.budget_spent.unwrap_or(0.0);
    }

    fn summary(&self) -> BudgetSummary {
        BudgetSummary {
            allocated: round2(self.allocated),
            spent: round2(self.spent),
            remaining: round2((self.allocated - self.spent).max(0.0)),
            utilisation: round2(percentage(self.spent, self.allocated).min(100.0)),
        }
    }
}

pub fn compute_portfolio_report(projects: &[ProjectRecord]) -> PortfolioReport {
    let mut budget = BudgetTotals::default();
    let mut project_statuses = StatusBreakdown::default();
    let mut task_statuses = StatusBreakdown::default();
    let mut active_projects = 0usize;
    let mut total_tasks = 0usize;
    let mut progress: Vec<ProjectProgressSummary> = Vec::with_capacity(projects.len());
    let mut man_days: Vec<ManDayAllocation> = Vec::with_capacity(projects.len());

    for project in projects {
        let status = normalize_status(project.status.as_deref());
        if is_active(&status) {
            active_projects += 1;
        }
        project_statuses.add(status.clone());
        budget.add(project);

        let tasks = &project.tasks;
        total_tasks += tasks.len();
        for task in tasks {
            task_statuses.add(normalize_status(task.status.as_deref()));
        }

        let project_id = project.id.unwrap_or(0);
        let project_name = display_name(project);
        progress.push(ProjectProgressSummary {
            project_id,
            project_name: project_name.clone(),
            status,
            completion_percentage: compute_completion_percentage(tasks),
            total_tasks: tasks.len(),
            completed_tasks: completed_count(tasks),
        });
        man_days.push(ManDayAllocation {
            project_id,
            project_name,
            man_days: round2(tasks.iter().map(estimated_man_days).sum()),
        });
    }

    // stable: ties keep input order
    progress.sort_by(|a, b| {
        b.completion_percentage
            .partial_cmp(&a.completion_percentage)
            .unwrap_or(Ordering::Equal)
    });
    man_days.sort_by(|a, b| b.man_days.partial_cmp(&a.man_days).unwrap_or(Ordering::Equal));

    debug!(
        projects = projects.len(),
        active_projects, total_tasks, "computed portfolio report"
    );

    PortfolioReport {
        project_count: projects.len(),
        active_projects,
        total_tasks,
        budget: budget.summary(),
        project_health: project_statuses
            .ranked()
            .into_iter()
            .map(|(status, projects)| ProjectHealthBreakdown {
                status: status.to_string(),
                projects,
            })
            .collect(),
        task_status: task_statuses
            .ranked()
            .into_iter()
            .map(|(status, tasks)| TaskStatusBreakdown {
                status: status.to_string(),
                tasks,
            })
            .collect(),
        project_progress: progress,
        man_day_allocation: man_days,
    }
}

fn display_name(project: &ProjectRecord) -> String {
    if !project.name.trim().is_empty() {
        return project.name.clone();
    }
    match project.id {
        Some(id) => format!("Project #{id}"),
        None => "Project #?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskActivity;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: i64, status: &str) -> TaskRecord {
        TaskRecord {
            id: Some(id),
            name: format!("Task {id}"),
            status: Some(status.to_string()),
            ..TaskRecord::default()
        }
    }

    fn allocated(mut t: TaskRecord, man_days: f64, months: &[&str]) -> TaskRecord {
        t.man_days = Some(man_days);
        t.activities = months
            .iter()
            .map(|m| TaskActivity {
                task_id: t.id,
                month: Month::parse(m).unwrap(),
                activity: "Dev".into(),
            })
            .collect();
        t
    }

    fn project(id: i64, name: &str, status: &str, budget: (f64, f64), tasks: Vec<TaskRecord>) -> ProjectRecord {
        ProjectRecord {
            id: Some(id),
            name: name.to_string(),
            status: Some(status.to_string()),
            budget_allocated: Some(budget.0),
            budget_spent: Some(budget.1),
            tasks,
            ..ProjectRecord::default()
        }
    }

    #[test]
    fn completion_is_zero_without_tasks() {
        assert_eq!(compute_completion_percentage(&[]), 0.0);
        let tasks = [task(1, "completed"), task(2, "in_progress"), task(3, "COMPLETED")];
        assert_eq!(compute_completion_percentage(&tasks), 66.67);
    }

    #[test]
    fn exact_ties_round_half_to_even() {
        let mut tasks: Vec<TaskRecord> = (1..=32).map(|i| task(i, "Not Started")).collect();
        tasks[0].status = Some("Completed".into());
        assert_eq!(compute_completion_percentage(&tasks), 3.12);

        let tiny = project(1, "Tiny", "In Progress", (0.125, 0.0), vec![]);
        assert_eq!(compute_portfolio_report(&[tiny]).budget.allocated, 0.12);
    }

    #[test]
    fn budget_remaining_never_negative() {
        let over = project(1, "Over", "In Progress", (1000.0, 1500.0), vec![]);
        let summary = budget_summary(&over);
        assert_eq!(summary.remaining, 0.0);
        assert_eq!(summary.utilisation, 150.0);

        let empty = ProjectRecord::default();
        assert_eq!(budget_summary(&empty), BudgetSummary::default());
    }

    #[test]
    fn upcoming_filters_sorts_and_truncates() {
        let today = ymd(2025, 6, 10);
        let mut tasks: Vec<TaskRecord> = (1..=8).map(|i| task(i, "Not Started")).collect();
        tasks[0].due_date = Some(ymd(2025, 6, 9)); // overdue
        tasks[1].due_date = Some(ymd(2025, 7, 1));
        tasks[2].due_date = Some(ymd(2025, 6, 10));
        tasks[3].due_date = Some(ymd(2025, 6, 20));
        tasks[4].due_date = Some(ymd(2025, 6, 20));
        tasks[5].due_date = None;
        tasks[6].due_date = Some(ymd(2025, 8, 1));
        tasks[7].due_date = Some(ymd(2025, 9, 1));

        let ids: Vec<Option<i64>> = upcoming_tasks(&tasks, today, 5).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![Some(3), Some(4), Some(5), Some(2), Some(7)]);
    }

    #[test]
    fn man_days_split_evenly_across_distinct_months() {
        let p = project(
            1,
            "Alpha",
            "In Progress",
            (0.0, 0.0),
            vec![
                allocated(task(1, "Completed"), 6.0, &["2025-03", "2025-01", "2025-02", "2025-01"]),
                allocated(task(2, "Completed"), 3.0, &["2025-02"]),
                task(3, "Not Started"),
            ],
        );
        let series = project_man_day_series(&p);
        let labels: Vec<String> = series.labels.iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, ["2025-01", "2025-02", "2025-03"]);
        assert_eq!(series.values, vec![2.0, 5.0, 2.0]);
    }

    #[test]
    fn months_with_zero_effort_are_left_out() {
        let mut t = allocated(task(1, "Completed"), 0.0, &["2025-04"]);
        t.man_days = None;
        let p = project(1, "Alpha", "In Progress", (0.0, 0.0), vec![t]);
        assert_eq!(project_man_day_series(&p), ManDaySeries::default());
    }

    #[test]
    fn series_sums_across_projects() {
        let a = project(1, "A", "x", (0.0, 0.0), vec![allocated(task(1, "x"), 4.0, &["2025-01", "2025-02"])]);
        let b = project(2, "B", "x", (0.0, 0.0), vec![allocated(task(2, "x"), 1.5, &["2025-02"])]);
        let series = man_day_series(&[a, b]);
        assert_eq!(series.values, vec![2.0, 3.5]);
    }

    #[test]
    fn continuous_series_fills_empty_months() {
        let p = project(
            1,
            "A",
            "x",
            (0.0, 0.0),
            vec![
                allocated(task(1, "x"), 2.0, &["2024-11"]),
                allocated(task(2, "x"), 3.0, &["2025-02"]),
            ],
        );
        let series = continuous_series(&project_man_day_series(&p));
        let labels: Vec<String> = series.labels.iter().map(|m| m.to_string()).collect();
        assert_eq!(labels, ["2024-11", "2024-12", "2025-01", "2025-02"]);
        assert_eq!(series.values, vec![2.0, 0.0, 0.0, 3.0]);
        assert_eq!(continuous_series(&ManDaySeries::default()), ManDaySeries::default());
    }

    #[test]
    fn stats_cover_duration_effort_and_budget() {
        let mut p = project(
            1,
            "Alpha",
            "In Progress",
            (1000.0, 0.0),
            vec![allocated(task(1, "x"), 2.5, &["2025-01"]), task(2, "x")],
        );
        p.tasks[0].budget = Some(250.0);
        p.start_date = Some(ymd(2025, 1, 15));
        p.end_date = Some(ymd(2025, 4, 2));
        let stats = project_stats(&p);
        assert_eq!(stats.duration_months, Some(4));
        assert_eq!(stats.total_man_days, 2.5);
        assert_eq!(stats.total_budget, 1250.0);
    }

    #[test]
    fn portfolio_scenario() {
        let alpha = project(
            1,
            "Alpha",
            "In Progress",
            (100_000.0, 25_000.0),
            vec![task(101, "Completed"), task(102, "In Progress"), task(103, "Not Started")],
        );
        let beta = project(
            2,
            "Beta",
            "Completed",
            (50_000.0, 45_000.0),
            vec![task(201, "Completed"), task(202, "Completed")],
        );
        let report = compute_portfolio_report(&[alpha, beta]);

        assert_eq!(report.project_count, 2);
        assert_eq!(report.active_projects, 1);
        assert_eq!(report.total_tasks, 5);
        assert_eq!(
            report.budget,
            BudgetSummary {
                allocated: 150_000.0,
                spent: 70_000.0,
                remaining: 80_000.0,
                utilisation: 46.67,
            }
        );
        let progress: Vec<(&str, f64)> = report
            .project_progress
            .iter()
            .map(|p| (p.project_name.as_str(), p.completion_percentage))
            .collect();
        assert_eq!(progress, vec![("Beta", 100.0), ("Alpha", 33.33)]);
        let effort: Vec<(&str, f64)> = report
            .man_day_allocation
            .iter()
            .map(|m| (m.project_name.as_str(), m.man_days))
            .collect();
        assert_eq!(effort, vec![("Alpha", 3.0), ("Beta", 2.0)]);
        assert_eq!(
            report.task_status,
            vec![
                TaskStatusBreakdown { status: "Completed".into(), tasks: 3 },
                TaskStatusBreakdown { status: "In Progress".into(), tasks: 1 },
                TaskStatusBreakdown { status: "Not Started".into(), tasks: 1 },
            ]
        );
    }

    #[test]
    fn utilisation_is_capped_for_the_portfolio() {
        let over = project(1, "Over", "In Progress", (100.0, 250.0), vec![]);
        let report = compute_portfolio_report(&[over]);
        assert_eq!(report.budget.utilisation, 100.0);
        assert_eq!(report.budget.remaining, 0.0);
    }

    #[test]
    fn progress_ties_keep_input_order() {
        let projects: Vec<ProjectRecord> = ["Zeta", "Alpha", "Mid"]
            .iter()
            .enumerate()
            .map(|(i, name)| project(i as i64 + 1, name, "Planning", (0.0, 0.0), vec![]))
            .collect();
        let report = compute_portfolio_report(&projects);
        let names: Vec<&str> = report.project_progress.iter().map(|p| p.project_name.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn weekly_report_for_missing_project_is_not_found() {
        let options = ReportOptions::new(ymd(2025, 1, 1));
        let err = generate_weekly_report(&[], 99, &options, Utc::now()).unwrap_err();
        assert!(matches!(err, ReportError::NotFound { id: 99, .. }));
    }

    #[test]
    fn portfolio_summaries_sort_by_name_case_insensitively() {
        let options = ReportOptions::new(ymd(2025, 1, 1));
        let projects = vec![
            project(1, "delta", "x", (0.0, 0.0), vec![]),
            project(2, "Bravo", "x", (0.0, 0.0), vec![]),
            project(3, "charlie", "x", (0.0, 0.0), vec![]),
        ];
        let names: Vec<String> = summarise_portfolio(&projects, &options)
            .into_iter()
            .map(|s| s.project_name)
            .collect();
        assert_eq!(names, ["Bravo", "charlie", "delta"]);
    }
}
