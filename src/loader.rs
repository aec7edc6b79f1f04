//! Normalization of raw project/task input into canonical records.
//!
//! Two source shapes are supported, each with a single boundary:
//! - JSON mappings as written by the dashboard export ([`project_from_value`],
//!   [`parse_export`], [`load_projects_from_export`])
//! - typed rows, e.g. rows read from a database ([`ProjectRow::into_record`])
//!
//! Unparsable optional fields never abort a load. They resolve to `None`, are
//! logged, and are counted in [`LoadReport::parse_errors`]. Only a payload
//! with the wrong top-level shape is rejected.

use crate::error::{ReportError, Result};
use crate::types::{Month, ProjectRecord, TaskActivity, TaskRecord};
use crate::util::{parse_date_safe, parse_f64_safe, parse_i64_safe};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

const OWNER_KEYS: &[&str] = &["owner", "project_manager", "client"];
const BUDGET_KEYS: &[&str] = &["budget_allocated", "budget"];
const MAN_DAY_KEYS: &[&str] = &[
    "man_days",
    "manday",
    "estimated_man_days",
    "estimate_days",
    "effort_days",
];
const DUE_KEYS: &[&str] = &["due_date", "end_date", "start_date"];
const MONTH_KEYS: &[&str] = &["month_id", "monthId", "month"];
const ACTIVITY_KEYS: &[&str] = &["activity_id", "activityId", "activity"];
const PROJECT_HINT_KEYS: &[&str] = &["project_name", "project"];

const UNNAMED_PROJECT: &str = "Unnamed project";
const UNNAMED_TASK: &str = "Unnamed task";
const UNSPECIFIED_ACTIVITY: &str = "Unspecified";

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_projects: usize,
    pub total_tasks: usize,
    /// Fields that could not be parsed and fell back to a default.
    pub parse_errors: usize,
    /// Entries that were not mappings at all.
    pub skipped_records: usize,
    /// Tasks from a separate task collection that matched no project.
    pub unmatched_tasks: Vec<TaskRecord>,
}

/// Project as an in-memory row with typed columns.
#[derive(Debug, Clone, Default)]
pub struct ProjectRow {
    pub id: i64,
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
    pub tasks: Vec<TaskRow>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskRow {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub man_days: Option<f64>,
    pub budget: Option<f64>,
    pub notes: Option<String>,
    pub activities: Vec<ActivityRow>,
}

/// A month/activity allocation row; the month is its `YYYY-MM` label.
#[derive(Debug, Clone, Default)]
pub struct ActivityRow {
    pub month: String,
    pub activity: String,
}

impl ProjectRow {
    pub fn into_record(self) -> ProjectRecord {
        Normalizer::default().project_row(self)
    }
}

impl TaskRow {
    pub fn into_record(self) -> TaskRecord {
        Normalizer::default().task_row(self, None)
    }
}

/// Normalize a single exported project mapping (with embedded tasks).
pub fn project_from_value(value: &Value) -> Result<ProjectRecord> {
    let obj = value
        .as_object()
        .ok_or_else(|| ReportError::Validation("project entry is not a mapping".into()))?;
    Ok(Normalizer::default().project(obj))
}

/// Normalize a single exported task mapping.
pub fn task_from_value(value: &Value) -> Result<TaskRecord> {
    let obj = value
        .as_object()
        .ok_or_else(|| ReportError::Validation("task entry is not a mapping".into()))?;
    Ok(Normalizer::default().task(obj, None))
}

/// Normalize a whole export payload.
///
/// Accepts either a list of projects with embedded tasks, or a mapping with
/// a `projects` list and an optional separate `tasks` list. Separate tasks
/// are attached by exact project id first, then by case-insensitive project
/// name; anything left is returned in [`LoadReport::unmatched_tasks`].
pub fn parse_export(value: &Value) -> Result<(Vec<ProjectRecord>, LoadReport)> {
    let (project_items, task_items) = match value {
        Value::Array(items) => (items.as_slice(), &[][..]),
        Value::Object(obj) => {
            let projects = match obj.get("projects") {
                Some(Value::Array(items)) => items.as_slice(),
                Some(_) => {
                    return Err(ReportError::Validation("`projects` must be a list".into()))
                }
                None => {
                    return Err(ReportError::Validation(
                        "export mapping has no `projects` list".into(),
                    ))
                }
            };
            let tasks = match obj.get("tasks") {
                Some(Value::Array(items)) => items.as_slice(),
                None | Some(Value::Null) => &[][..],
                Some(_) => return Err(ReportError::Validation("`tasks` must be a list".into())),
            };
            (projects, tasks)
        }
        _ => {
            return Err(ReportError::Validation(
                "expected a list of projects or a mapping with `projects`".into(),
            ))
        }
    };

    let mut norm = Normalizer::default();
    let mut projects: Vec<ProjectRecord> = Vec::with_capacity(project_items.len());
    for item in project_items {
        match item.as_object() {
            Some(obj) => projects.push(norm.project(obj)),
            None => {
                warn!(entry = %item, "skipping project entry that is not a mapping");
                norm.report.skipped_records += 1;
            }
        }
    }

    if !task_items.is_empty() {
        norm.attach_tasks(&mut projects, task_items);
    }

    norm.report.total_projects = projects.len();
    norm.report.total_tasks = projects.iter().map(|p| p.tasks.len()).sum();
    Ok((projects, norm.report))
}

/// Load a dashboard export file from disk.
pub fn load_projects_from_export(
    path: impl AsRef<Path>,
) -> Result<(Vec<ProjectRecord>, LoadReport)> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&text)?;
    let (projects, report) = parse_export(&payload)?;
    info!(
        path = %path.display(),
        projects = report.total_projects,
        tasks = report.total_tasks,
        parse_errors = report.parse_errors,
        unmatched = report.unmatched_tasks.len(),
        "loaded dashboard export"
    );
    Ok((projects, report))
}

#[derive(Default)]
struct Normalizer {
    report: LoadReport,
}

impl Normalizer {
    fn recover<T>(&mut self, result: Result<Option<T>>) -> Option<T> {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "recovered unparsable field with a default");
                self.report.parse_errors += 1;
                None
            }
        }
    }

    fn project(&mut self, obj: &Map<String, Value>) -> ProjectRecord {
        let id = self.recover(coerce_i64("project id", field(obj, &["id"])));
        let tasks: Vec<TaskRecord> = match field(obj, &["tasks"]) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item.as_object() {
                    Some(t) => Some(self.task(t, id)),
                    None => {
                        warn!(entry = %item, "skipping task entry that is not a mapping");
                        self.report.skipped_records += 1;
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        let record = ProjectRecord {
            id,
            name: text(field(obj, &["name"])).unwrap_or_else(|| UNNAMED_PROJECT.to_string()),
            owner: text(field(obj, OWNER_KEYS)),
            client: text(field(obj, &["client"])),
            team: text(field(obj, &["team"])),
            status: text(field(obj, &["status"])),
            start_date: self.recover(coerce_date("start_date", field(obj, &["start_date"]))),
            end_date: self.recover(coerce_date("end_date", field(obj, &["end_date"]))),
            budget_allocated: self.recover(coerce_f64("budget_allocated", field(obj, BUDGET_KEYS))),
            budget_spent: self.recover(coerce_f64("budget_spent", field(obj, &["budget_spent"]))),
            notes: text(field(obj, &["notes"])),
            tasks,
        };
        self.finish_project(record)
    }

    fn task(&mut self, obj: &Map<String, Value>, parent: Option<i64>) -> TaskRecord {
        let id = self.recover(coerce_i64("task id", field(obj, &["id"])));
        let project_id = self.recover(coerce_i64("project_id", field(obj, &["project_id"])));

        let mut labels = Vec::new();
        if let Some(Value::Array(items)) = field(obj, &["activities"]) {
            for item in items {
                let Some(entry) = item.as_object() else {
                    self.report.skipped_records += 1;
                    continue;
                };
                let month = month_text(field(entry, MONTH_KEYS));
                let activity = text(field(entry, ACTIVITY_KEYS));
                labels.push((month.unwrap_or_default(), activity));
            }
        }

        let record = TaskRecord {
            id,
            project_id: project_id.or(parent),
            name: text(field(obj, &["name"])).unwrap_or_else(|| UNNAMED_TASK.to_string()),
            owner: text(field(obj, &["owner", "assignee"])),
            status: text(field(obj, &["status"])),
            due_date: self.recover(coerce_date("due_date", field(obj, DUE_KEYS))),
            man_days: self.recover(coerce_f64("man_days", field(obj, MAN_DAY_KEYS))),
            budget: self.recover(coerce_f64("task budget", field(obj, &["budget"]))),
            notes: text(field(obj, &["notes"])),
            activities: Vec::new(),
        };
        self.finish_task(record, labels)
    }

    fn project_row(&mut self, row: ProjectRow) -> ProjectRecord {
        let id = Some(row.id);
        let tasks = row
            .tasks
            .into_iter()
            .map(|t| self.task_row(t, id))
            .collect();
        let record = ProjectRecord {
            id,
            name: non_blank(Some(row.name)).unwrap_or_else(|| UNNAMED_PROJECT.to_string()),
            owner: non_blank(row.owner.or(row.client.clone())),
            client: non_blank(row.client),
            team: non_blank(row.team),
            status: non_blank(row.status),
            start_date: row.start_date,
            end_date: row.end_date,
            budget_allocated: row.budget_allocated,
            budget_spent: row.budget_spent,
            notes: non_blank(row.notes),
            tasks,
        };
        self.finish_project(record)
    }

    // A zero `project_id` is an unset column; the enclosing project fills it.
    fn task_row(&mut self, row: TaskRow, parent: Option<i64>) -> TaskRecord {
        let labels = row
            .activities
            .into_iter()
            .map(|a| (a.month, non_blank(Some(a.activity))))
            .collect();
        let record = TaskRecord {
            id: Some(row.id),
            project_id: Some(row.project_id).filter(|id| *id != 0).or(parent),
            name: non_blank(Some(row.name)).unwrap_or_else(|| UNNAMED_TASK.to_string()),
            owner: non_blank(row.owner),
            status: non_blank(row.status),
            due_date: row.due_date,
            man_days: row.man_days,
            budget: row.budget,
            notes: non_blank(row.notes),
            activities: Vec::new(),
        };
        self.finish_task(record, labels)
    }

    // Invariants shared by both source shapes.
    fn finish_project(&mut self, mut record: ProjectRecord) -> ProjectRecord {
        if let (Some(start), Some(end)) = (record.start_date, record.end_date) {
            if start > end {
                let err = ReportError::parse("end_date", end.to_string());
                self.recover::<NaiveDate>(Err(err));
                record.end_date = None;
            }
        }
        record
    }

    fn finish_task(
        &mut self,
        mut record: TaskRecord,
        labels: Vec<(String, Option<String>)>,
    ) -> TaskRecord {
        if let Some(days) = record.man_days {
            if days < 0.0 {
                let err = ReportError::parse("man_days", days.to_string());
                self.recover::<f64>(Err(err));
                record.man_days = None;
            }
        }

        let mut seen: HashSet<(Month, String)> = HashSet::new();
        for (label, activity) in labels {
            let Some(month) = self.recover(Month::parse(&label).map(Some)) else {
                continue;
            };
            let activity = activity.unwrap_or_else(|| UNSPECIFIED_ACTIVITY.to_string());
            if !seen.insert((month, activity.clone())) {
                debug!(task = ?record.id, %month, %activity, "dropping duplicate allocation");
                continue;
            }
            record.activities.push(TaskActivity {
                task_id: record.id,
                month,
                activity,
            });
        }
        record
    }

    fn attach_tasks(&mut self, projects: &mut [ProjectRecord], task_items: &[Value]) {
        let mut by_id: HashMap<i64, usize> = HashMap::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (idx, project) in projects.iter().enumerate() {
            if let Some(id) = project.id {
                by_id.entry(id).or_insert(idx);
            }
            by_name.entry(project.name.to_lowercase()).or_insert(idx);
        }

        for item in task_items {
            let Some(obj) = item.as_object() else {
                warn!(entry = %item, "skipping task entry that is not a mapping");
                self.report.skipped_records += 1;
                continue;
            };
            let mut task = self.task(obj, None);
            let hint = text(field(obj, PROJECT_HINT_KEYS)).map(|n| n.to_lowercase());
            let target = task
                .project_id
                .and_then(|id| by_id.get(&id))
                .or_else(|| hint.as_ref().and_then(|n| by_name.get(n)))
                .copied();
            match target {
                Some(idx) => {
                    task.project_id = projects[idx].id;
                    projects[idx].tasks.push(task);
                }
                None => {
                    warn!(task = ?task.id, name = %task.name, "task matches no project");
                    self.report.unmatched_tasks.push(task);
                }
            }
        }
    }
}

// First non-null value among the given keys.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Text for a field; exported relations arrive as `{"name": ...}` objects.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_blank(Some(s.clone())),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(obj) => text(obj.get("name")),
        _ => None,
    }
}

fn month_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Object(obj) => text(field(obj, &["yyyy_mm", "label", "name"])),
        other => text(Some(other)),
    }
}

fn is_null_text(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s == "null"
}

fn coerce_f64(name: &'static str, value: Option<&Value>) -> Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if is_null_text(s) => Ok(None),
        Some(Value::String(s)) => parse_f64_safe(Some(s))
            .map(Some)
            .ok_or_else(|| ReportError::parse(name, s.as_str())),
        Some(other) => Err(ReportError::parse(name, other.to_string())),
    }
}

fn coerce_i64(name: &'static str, value: Option<&Value>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| ReportError::parse(name, n.to_string())),
        Some(Value::String(s)) if is_null_text(s) => Ok(None),
        Some(Value::String(s)) => parse_i64_safe(Some(s))
            .map(Some)
            .ok_or_else(|| ReportError::parse(name, s.as_str())),
        Some(other) => Err(ReportError::parse(name, other.to_string())),
    }
}

fn coerce_date(name: &'static str, value: Option<&Value>) -> Result<Option<NaiveDate>> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) if is_null_text(s) => Ok(None),
        Some(Value::String(s)) => parse_date_safe(Some(s))
            .map(Some)
            .ok_or_else(|| ReportError::parse(name, s.as_str())),
        Some(other) => Err(ReportError::parse(name, other.to_string())),
    }
}
