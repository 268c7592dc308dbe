use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;

use chrono::NaiveDate;
use gantry_core::backlog::BacklogApi;
use gantry_core::backlog::HttpBacklogClient;
use gantry_core::backlog::model::{
    Issue, IssueUpdate, Priority, Project, Resolution, Status, User,
};
use gantry_core::config::{Config, DevConfig};
use gantry_core::datetime::FixedClock;
use gantry_core::filter::Selection;
use gantry_core::sort::{SortColumn, SortDirection, SortState};
use gantry_core::timeline::Window;
use gantry_core::vocab::{StatusClass, StatusVocabulary};
use gantry_core::{EditOutcome, ErrorKind, GanttError, GanttState};
use gantry_shared::TaskPatch;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[derive(Default)]
struct FakeBacklog {
    projects: Vec<Project>,
    users: Vec<User>,
    resolutions: Vec<Resolution>,
    statuses: HashMap<u64, Vec<Status>>,
    issues: Vec<Issue>,
    failing_status_project: Option<u64>,
    fail_issues: bool,
    update_response: RefCell<Option<Result<Issue, GanttError>>>,
    updates: RefCell<Vec<(u64, IssueUpdate)>>,
}

impl BacklogApi for FakeBacklog {
    async fn list_projects(&self) -> Result<Vec<Project>, GanttError> {
        Ok(self.projects.clone())
    }

    async fn list_issues(&self) -> Result<Vec<Issue>, GanttError> {
        if self.fail_issues {
            return Err(GanttError::Api {
                status: 401,
                message: "Authentication failure.".to_string(),
            });
        }
        Ok(self.issues.clone())
    }

    async fn list_users(&self) -> Result<Vec<User>, GanttError> {
        Ok(self.users.clone())
    }

    async fn list_project_statuses(&self, project_id: u64) -> Result<Vec<Status>, GanttError> {
        if self.failing_status_project == Some(project_id) {
            return Err(GanttError::Network("connection reset".to_string()));
        }
        Ok(self.statuses.get(&project_id).cloned().unwrap_or_default())
    }

    async fn list_resolutions(&self) -> Result<Vec<Resolution>, GanttError> {
        Ok(self.resolutions.clone())
    }

    async fn update_issue(&self, issue_id: u64, update: &IssueUpdate) -> Result<Issue, GanttError> {
        self.updates.borrow_mut().push((issue_id, update.clone()));
        self.update_response
            .borrow_mut()
            .take()
            .unwrap_or_else(|| Err(GanttError::Unknown("no response queued".to_string())))
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn project(id: u64, key: &str) -> Project {
    Project {
        id,
        project_key: key.to_string(),
        name: format!("{key} project"),
        archived: false,
    }
}

fn user(id: u64, name: &str) -> User {
    User {
        id,
        user_id: None,
        name: name.to_string(),
    }
}

fn status(id: u64, project_id: u64, name: &str, order: i64) -> Status {
    Status {
        id,
        project_id: Some(project_id),
        name: name.to_string(),
        color: None,
        display_order: Some(order),
    }
}

fn issue(
    id: u64,
    project_id: u64,
    assignee: Option<&str>,
    status_name: &str,
    start: Option<&str>,
    due: Option<&str>,
) -> Issue {
    Issue {
        id,
        project_id,
        issue_key: format!("PROJ-{id}"),
        summary: format!("Task {id}"),
        description: None,
        resolution: None,
        priority: Some(Priority {
            id: 3,
            name: "中".to_string(),
        }),
        status: status(1, project_id, status_name, 1000),
        assignee: assignee.map(|name| user(10, name)),
        start_date: start.map(|s| format!("{s}T00:00:00Z")),
        due_date: due.map(|s| format!("{s}T00:00:00Z")),
    }
}

fn backlog() -> FakeBacklog {
    let mut statuses = HashMap::new();
    statuses.insert(
        1,
        vec![
            status(4, 1, "完了", 4000),
            status(1, 1, "未対応", 1000),
            status(2, 1, "処理中", 2000),
        ],
    );

    FakeBacklog {
        projects: vec![project(1, "PROJ"), project(2, "SIDE")],
        users: vec![user(10, "Alice"), user(11, "Bob")],
        resolutions: vec![Resolution {
            id: 0,
            name: "対応済み".to_string(),
        }],
        statuses,
        issues: vec![
            issue(1, 1, Some("Alice"), "未対応", Some("2023-12-20"), Some("2024-01-05")),
            issue(2, 2, Some("Bob"), "完了", Some("2023-11-01"), Some("2023-12-01")),
            issue(3, 1, None, "未対応", Some("2024-01-02"), Some("2024-01-03")),
            issue(4, 1, Some("Alice"), "処理中", None, Some("2024-02-10")),
        ],
        failing_status_project: Some(2),
        ..FakeBacklog::default()
    }
}

fn new_state() -> GanttState {
    GanttState::new(
        StatusVocabulary::default(),
        Window::new(day(2024, 1, 1), 3),
        DevConfig::default(),
    )
}

#[tokio::test]
async fn refresh_then_chart_places_clipped_bar() {
    let api = backlog();
    let mut state = new_state();
    state.refresh(&api).await.expect("refresh succeeds");

    assert_eq!(state.tasks().len(), 3);
    assert_eq!(
        state.selection().assignees.iter().cloned().collect::<Vec<_>>(),
        vec!["Alice".to_string()]
    );
    assert_eq!(
        state.selection().projects.iter().cloned().collect::<Vec<_>>(),
        vec!["PROJ".to_string()]
    );

    let chart = state.chart(&FixedClock(day(2024, 1, 2)));
    assert_eq!(chart.day_count, 92);
    assert_eq!(chart.window_end, "2024-04-01");

    let keys: Vec<&str> = chart.rows.iter().map(|r| r.issue_key.as_str()).collect();
    assert_eq!(keys, vec!["PROJ-1", "PROJ-4"]);

    let bar = chart.rows[0].bar.as_ref().expect("task A has a bar");
    assert_eq!(bar.left, 0.0);
    assert_eq!(bar.width, 5.0 / 92.0);
    assert!(bar.show_label);
    assert!(!bar.overdue);
    assert_eq!(bar.color, "#718096");
    assert!(chart.rows[1].bar.is_none());
}

#[tokio::test]
async fn failed_status_fetch_leaves_only_that_project_empty() {
    let api = backlog();
    let mut state = new_state();
    state.refresh(&api).await.expect("refresh succeeds");

    let proj_task = state.find_task("PROJ-1").expect("task 1").clone();
    assert_eq!(state.statuses_for(&proj_task), vec!["未対応", "処理中", "完了"]);

    let side_task = state.find_task("2").expect("task 2").clone();
    assert!(state.statuses_for(&side_task).is_empty());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_data() {
    let mut state = new_state();
    state.refresh(&backlog()).await.expect("first refresh");
    let before = state.tasks().to_vec();

    let broken = FakeBacklog {
        fail_issues: true,
        ..backlog()
    };
    let err = state.refresh(&broken).await.expect_err("issues fail");

    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.user_message(), "API error: Authentication failure.");
    assert_eq!(state.tasks(), before.as_slice());
}

#[tokio::test]
async fn edit_sends_only_mapped_fields_and_replaces_task() {
    let api = backlog();
    let mut state = new_state();
    state.refresh(&api).await.expect("refresh");

    let mut answer = issue(1, 1, Some("Alice"), "完了", Some("2023-12-20"), Some("2024-01-08"));
    answer.summary = "Task 1 (done)".to_string();
    *api.update_response.borrow_mut() = Some(Ok(answer));

    let patch = TaskPatch {
        assignee: Some("Nobody".to_string()),
        status: Some("完了".to_string()),
        end_date: Some(Some("2024-01-08".to_string())),
        comment: Some("closing".to_string()),
        ..TaskPatch::default()
    };
    let outcome = state
        .submit_edit(&api, "proj-1", &patch)
        .await
        .expect("edit succeeds");

    let updates = api.updates.borrow();
    assert_eq!(updates.len(), 1);
    let (id, sent) = &updates[0];
    assert_eq!(*id, 1);
    assert_eq!(sent.assignee_id, None);
    assert_eq!(sent.status_id, Some(4));
    assert_eq!(sent.due_date, Some(Some(day(2024, 1, 8))));
    assert_eq!(sent.encode_form(), "statusId=4&dueDate=2024-01-08&comment=closing");

    let EditOutcome::Updated(task) = outcome else {
        panic!("expected an updated task");
    };
    assert_eq!(task.status_class, StatusClass::Completed);
    assert_eq!(state.find_task("1").expect("still present").title, "Task 1 (done)");
    assert_eq!(state.tasks().len(), 3);
}

#[tokio::test]
async fn edit_that_unassigns_removes_task() {
    let api = backlog();
    let mut state = new_state();
    state.refresh(&api).await.expect("refresh");

    *api.update_response.borrow_mut() = Some(Ok(issue(
        4,
        1,
        None,
        "処理中",
        None,
        Some("2024-02-10"),
    )));
    let patch = TaskPatch {
        status: Some("処理中".to_string()),
        ..TaskPatch::default()
    };

    let outcome = state.submit_edit(&api, "4", &patch).await.expect("edit");
    assert_eq!(
        outcome,
        EditOutcome::Removed {
            id: 4,
            issue_key: "PROJ-4".to_string()
        }
    );
    assert!(state.find_task("PROJ-4").is_none());
}

#[tokio::test]
async fn failed_edit_changes_nothing() {
    let api = backlog();
    let mut state = new_state();
    state.refresh(&api).await.expect("refresh");
    let before = state.tasks().to_vec();

    *api.update_response.borrow_mut() = Some(Err(GanttError::Network("timed out".to_string())));
    let patch = TaskPatch {
        status: Some("完了".to_string()),
        ..TaskPatch::default()
    };

    let err = state
        .submit_edit(&api, "PROJ-1", &patch)
        .await
        .expect_err("edit fails");
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(state.tasks(), before.as_slice());
}

#[tokio::test]
async fn unmapped_only_edit_is_not_sent() {
    let api = backlog();
    let mut state = new_state();
    state.refresh(&api).await.expect("refresh");

    let patch = TaskPatch {
        priority: Some("Urgent".to_string()),
        ..TaskPatch::default()
    };
    let outcome = state.submit_edit(&api, "PROJ-1", &patch).await.expect("edit");

    assert_eq!(outcome, EditOutcome::Unchanged);
    assert!(api.updates.borrow().is_empty());
}

#[tokio::test]
async fn sorting_and_window_moves_rerun_the_pipeline() {
    let api = backlog();
    let mut state = new_state();
    state.refresh(&api).await.expect("refresh");

    state.set_sort(SortState::new(SortColumn::EndDate, SortDirection::Descending));
    let keys: Vec<&str> = state.visible().iter().map(|t| t.issue_key.as_str()).collect();
    assert_eq!(keys, vec!["PROJ-4", "PROJ-1"]);

    state.set_window_start(day(2023, 11, 15));
    assert_eq!(state.available_assignees(), vec!["Alice", "Bob"]);
    state.select_assignees(["Alice", "Bob"]);
    state.select_projects(["PROJ", "SIDE"]);
    assert_eq!(state.visible().len(), 3);

    let lines = state.issue_key_lines();
    assert_eq!(lines, "PROJ-4 Task 4\nPROJ-1 Task 1\nPROJ-2 Task 2");
}

#[test]
fn client_requires_configured_credentials() {
    let dir = tempdir().expect("tempdir");
    let rc = dir.path().join("gantryrc");
    fs::write(&rc, "backlog.space = acme\n").expect("write rc");

    let cfg = Config::load(Some(&rc)).expect("load config");
    let err = HttpBacklogClient::from_config(&cfg).expect_err("no api key");
    assert_eq!(err.kind(), ErrorKind::Validation);

    fs::write(&rc, "backlog.space = acme\nbacklog.api_key = k\nbacklog.domain = backlog.jp\n")
        .expect("write rc");
    let cfg = Config::load(Some(&rc)).expect("load config");
    let client = HttpBacklogClient::from_config(&cfg).expect("client");
    assert_eq!(client.base_url(), "https://acme.backlog.jp/api/v2");
}

#[tokio::test]
async fn header_clicks_cycle_sort_and_empty_selection_hides_everything() {
    let api = backlog();
    let mut state = new_state();
    state.refresh(&api).await.expect("refresh");

    state.toggle_sort(SortColumn::Title);
    state.toggle_sort(SortColumn::Title);
    assert_eq!(
        state.sort_state(),
        SortState::new(SortColumn::Title, SortDirection::Descending)
    );
    let chart = state.chart(&FixedClock(day(2024, 1, 2)));
    assert_eq!(chart.sort_column.as_deref(), Some("title"));
    assert_eq!(chart.sort_direction, "desc");
    let keys: Vec<&str> = chart.rows.iter().map(|r| r.issue_key.as_str()).collect();
    assert_eq!(keys, vec!["PROJ-4", "PROJ-1"]);

    state.toggle_sort(SortColumn::Title);
    assert_eq!(state.sort_state(), SortState::default());

    state.set_selection(Selection::default());
    assert!(state.visible().is_empty());
    assert!(state.issue_key_lines().is_empty());
}
