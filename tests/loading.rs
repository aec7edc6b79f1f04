use chrono::NaiveDate;
use portfolio_report::loader::{
    load_projects_from_export, parse_export, project_from_value, ActivityRow, ProjectRow, TaskRow,
};
use portfolio_report::ReportError;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn mapping_and_typed_row_normalize_to_the_same_record() {
    let from_json = project_from_value(&json!({
        "id": 5,
        "name": "Depot",
        "client": "Metro",
        "status": "planning",
        "start_date": "2025-04-01",
        "end_date": "2025-06-30",
        "budget_allocated": 8000,
        "budget_spent": 1000,
        "tasks": [{
            "id": 50,
            "name": "Survey",
            "status": "In Progress",
            "due_date": "2025-05-15",
            "man_days": 3,
            "activities": [
                {"month": "2025-04", "activity": "Field"},
                {"month": "2025-04", "activity": "Field"},
                {"month": "2025-05"}
            ]
        }]
    }))
    .unwrap();

    let from_row = ProjectRow {
        id: 5,
        name: "Depot".into(),
        client: Some("Metro".into()),
        status: Some("planning".into()),
        start_date: Some(ymd(2025, 4, 1)),
        end_date: Some(ymd(2025, 6, 30)),
        budget_allocated: Some(8000.0),
        budget_spent: Some(1000.0),
        tasks: vec![TaskRow {
            id: 50,
            project_id: 5,
            name: "Survey".into(),
            status: Some("In Progress".into()),
            due_date: Some(ymd(2025, 5, 15)),
            man_days: Some(3.0),
            activities: vec![
                ActivityRow {
                    month: "2025-04".into(),
                    activity: "Field".into(),
                },
                ActivityRow {
                    month: "2025-05".into(),
                    activity: String::new(),
                },
            ],
            ..TaskRow::default()
        }],
        ..ProjectRow::default()
    }
    .into_record();

    assert_eq!(from_json, from_row);
    let renormalized = project_from_value(&serde_json::to_value(&from_row).unwrap()).unwrap();
    assert_eq!(renormalized, from_row);
    assert_eq!(from_row.owner.as_deref(), Some("Metro"));
    assert_eq!(from_row.tasks[0].activities.len(), 2);
    assert_eq!(from_row.tasks[0].activities[1].activity, "Unspecified");
}

#[test]
fn blank_row_names_and_unset_task_project_match_the_mapping_path() {
    let from_row = ProjectRow {
        id: 7,
        tasks: vec![TaskRow {
            id: 70,
            name: "  ".into(),
            ..TaskRow::default()
        }],
        ..ProjectRow::default()
    }
    .into_record();

    assert_eq!(from_row.name, "Unnamed project");
    assert_eq!(from_row.tasks[0].name, "Unnamed task");
    assert_eq!(from_row.tasks[0].project_id, Some(7));

    let from_json = project_from_value(&json!({
        "id": 7,
        "name": "",
        "tasks": [{"id": 70, "name": "  "}]
    }))
    .unwrap();
    assert_eq!(from_json, from_row);

    let renormalized = project_from_value(&serde_json::to_value(&from_row).unwrap()).unwrap();
    assert_eq!(renormalized, from_row);
}

#[test]
fn standalone_task_row_keeps_its_own_project() {
    let task = TaskRow {
        id: 1,
        project_id: 3,
        name: "Audit".into(),
        ..TaskRow::default()
    }
    .into_record();
    assert_eq!(task.project_id, Some(3));

    let orphan = TaskRow {
        id: 2,
        name: "Loose".into(),
        ..TaskRow::default()
    }
    .into_record();
    assert_eq!(orphan.project_id, None);
}

#[test]
fn export_file_is_loaded_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        json!([
            {"id": 1, "name": "Alpha", "tasks": [{"id": 1, "name": "One", "man_days": "x"}]},
            "not a project"
        ])
    )
    .unwrap();

    let (projects, report) = load_projects_from_export(file.path()).unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(report.total_tasks, 1);
    assert_eq!(report.parse_errors, 1);
    assert_eq!(report.skipped_records, 1);
    assert_eq!(projects[0].tasks[0].man_days, None);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_projects_from_export(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ReportError::Io(_)));
}

#[test]
fn malformed_json_is_a_json_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"projects\": [").unwrap();
    let err = load_projects_from_export(file.path()).unwrap_err();
    assert!(matches!(err, ReportError::Json(_)));
}

#[test]
fn wrong_top_level_shape_is_rejected() {
    for payload in [json!("projects"), json!({"tasks": []}), json!({"projects": {}})] {
        let err = parse_export(&payload).unwrap_err();
        assert!(matches!(err, ReportError::Validation(_)), "{payload}");
    }
}

#[test]
fn empty_export_is_valid() {
    let (projects, report) = parse_export(&json!({"projects": []})).unwrap();
    assert!(projects.is_empty());
    assert_eq!(report.total_projects, 0);
    assert!(report.unmatched_tasks.is_empty());
}
