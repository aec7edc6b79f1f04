use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::Tabled;

/// A calendar month (`YYYY-MM`). Field order makes the derived ordering
/// chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    pub(crate) year: i32,
    pub(crate) month: u32,
}

/// One (task, month, activity type) allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskActivity {
    pub task_id: Option<i64>,
    pub month: Month,
    pub activity: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Option<i64>,
    pub project_id: Option<i64>,
    pub name: String,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub man_days: Option<f64>,
    pub budget: Option<f64>,
    pub notes: Option<String>,
    pub activities: Vec<TaskActivity>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Option<i64>,
    pub name: String,
    pub owner: Option<String>,
    pub client: Option<String>,
    pub team: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget_allocated: Option<f64>,
    pub budget_spent: Option<f64>,
    pub notes: Option<String>,
    pub tasks: Vec<TaskRecord>,
}

/// Histogram of canonical status labels.
///
/// Stored sorted by label so JSON output is stable; documents use
/// [`StatusBreakdown::ranked`] for display order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct StatusBreakdown(BTreeMap<String, usize>);

impl StatusBreakdown {
    pub fn add(&mut self, label: String) {
        *self.0.entry(label).or_insert(0) += 1;
    }

    pub fn count(&self, label: &str) -> usize {
        self.0.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Descending count, then ascending label.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut rows: Vec<(&str, usize)> = self.0.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

impl FromIterator<String> for StatusBreakdown {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut breakdown = StatusBreakdown::default();
        for label in iter {
            breakdown.add(label);
        }
        breakdown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BudgetSummary {
    pub allocated: f64,
    pub spent: f64,
    pub remaining: f64,
    pub utilisation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectBudget {
    pub allocated: f64,
    pub spent: f64,
    pub remaining: f64,
}

impl From<BudgetSummary> for ProjectBudget {
    fn from(b: BudgetSummary) -> Self {
        ProjectBudget {
            allocated: b.allocated,
            spent: b.spent,
            remaining: b.remaining,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTask {
    pub id: Option<i64>,
    pub name: String,
    pub owner: Option<String>,
    pub status: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectStats {
    pub duration_months: Option<i32>,
    pub total_man_days: f64,
    pub total_budget: f64,
}

/// Everything the document renderers need about one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_id: Option<i64>,
    pub project_name: String,
    pub owner: Option<String>,
    pub status: String,
    pub completion_percentage: f64,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub status_breakdown: StatusBreakdown,
    pub budget: BudgetSummary,
    pub upcoming_tasks: Vec<ReportTask>,
    pub notes: Option<String>,
    pub stats: ProjectStats,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ProjectHealthBreakdown {
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Projects")]
    pub projects: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct TaskStatusBreakdown {
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Tasks")]
    pub tasks: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ProjectProgressSummary {
    #[tabled(rename = "ProjectId")]
    pub project_id: i64,
    #[tabled(rename = "Project")]
    pub project_name: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Completion%")]
    pub completion_percentage: f64,
    #[tabled(rename = "TotalTasks")]
    pub total_tasks: usize,
    #[tabled(rename = "CompletedTasks")]
    pub completed_tasks: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct ManDayAllocation {
    #[tabled(rename = "ProjectId")]
    pub project_id: i64,
    #[tabled(rename = "Project")]
    pub project_name: String,
    #[tabled(rename = "ManDays")]
    pub man_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReport {
    pub project_count: usize,
    pub active_projects: usize,
    pub total_tasks: usize,
    pub budget: BudgetSummary,
    pub project_health: Vec<ProjectHealthBreakdown>,
    pub task_status: Vec<TaskStatusBreakdown>,
    pub project_progress: Vec<ProjectProgressSummary>,
    pub man_day_allocation: Vec<ManDayAllocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub project_id: i64,
    pub project_name: String,
    pub generated_at: DateTime<Utc>,
    pub status_breakdown: StatusBreakdown,
    pub completion_percentage: f64,
    pub budget: ProjectBudget,
    pub upcoming_tasks: Vec<ReportTask>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttEntry {
    pub id: String,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<String>,
    #[serde(rename = "class")]
    pub css_class: String,
}

/// `values[i]` belongs to `labels[i]`; labels strictly ascending.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ManDaySeries {
    pub labels: Vec<Month>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPayload {
    pub project_id: Option<i64>,
    pub project_name: String,
    pub gantt: Vec<GanttEntry>,
    pub man_days: ManDaySeries,
    pub stats: ProjectStats,
}

/// Fixed column layout of the weekly CSV export.
#[derive(Debug, Serialize)]
pub struct WeeklyCsvRow {
    pub project_id: Option<i64>,
    pub project_name: String,
    pub owner: String,
    pub status: String,
    pub completion_percentage: f64,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub in_progress_tasks: usize,
    pub not_started_tasks: usize,
    pub budget_allocated: f64,
    pub budget_spent: f64,
    pub budget_remaining: f64,
    pub upcoming_tasks: String,
    pub notes: String,
}
