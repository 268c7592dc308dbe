use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use chrono::NaiveDate;
use futures::future::join_all;
use gantry_shared::{
    BarDto, ChartDto, FilterOptionsDto, ProjectOption, StatusClassDto, TaskPatch, TaskRowDto,
};
use tracing::{debug, info, instrument, warn};

use crate::backlog::BacklogApi;
use crate::backlog::model::{IssueUpdate, Project, Resolution, Status, User};
use crate::config::DevConfig;
use crate::datetime::{Clock, format_date};
use crate::error::GanttError;
use crate::filter::{Selection, is_stale_completed, visible_tasks};
use crate::normalize::{normalize_issue, normalize_issues, project_index};
use crate::sort::{SortColumn, SortState, sort_tasks};
use crate::task::Task;
use crate::timeline::{Window, geometry};
use crate::vocab::{StatusClass, StatusVocabulary};

/// What an edit did to the task set.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Updated(Task),
    /// The remote issue no longer qualifies as a task (e.g. unassigned).
    Removed { id: u64, issue_key: String },
    Unchanged,
}

/// Owns the task set, lookup tables and view state. Everything the chart
/// shows is derived from here on demand.
#[derive(Debug, Clone)]
pub struct GanttState {
    vocab: StatusVocabulary,
    dev: DevConfig,
    window: Window,
    selection: Selection,
    sort: SortState,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    users: Vec<User>,
    resolutions: Vec<Resolution>,
    project_statuses: HashMap<u64, Vec<Status>>,
}

impl GanttState {
    pub fn new(vocab: StatusVocabulary, window: Window, dev: DevConfig) -> Self {
        Self {
            vocab,
            dev,
            window,
            selection: Selection::default(),
            sort: SortState::default(),
            tasks: Vec::new(),
            projects: Vec::new(),
            users: Vec::new(),
            resolutions: Vec::new(),
            project_statuses: HashMap::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn find_task(&self, reference: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.matches_ref(reference))
    }

    /// Fetches everything and swaps it in only once every required call has
    /// succeeded. Status lists are best-effort per project.
    #[instrument(skip(self, api))]
    pub async fn refresh<A: BacklogApi>(&mut self, api: &A) -> Result<(), GanttError> {
        let started = Instant::now();

        let projects = api.list_projects().await?;
        debug!(projects = projects.len(), "fetched projects");

        let (users, resolutions) =
            futures::try_join!(api.list_users(), api.list_resolutions())?;
        let project_statuses = fetch_project_statuses(api, &projects).await;

        let issues = api.list_issues().await?;
        let tasks = normalize_issues(&issues, &projects, &self.vocab);

        self.tasks = tasks;
        self.projects = projects;
        self.users = users;
        self.resolutions = resolutions;
        self.project_statuses = project_statuses;
        self.selection = Selection::new(
            unique_sorted(self.tasks.iter().map(|t| t.assignee.as_str())),
            unique_sorted(self.tasks.iter().map(|t| t.project_key.as_str())),
        );
        self.reconcile_selection();

        self.dev.observe("refresh", started.elapsed());
        info!(
            tasks = self.tasks.len(),
            issues = issues.len(),
            "refreshed backlog data"
        );
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn select_assignees<I, S>(&mut self, assignees: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection.assignees = assignees.into_iter().map(Into::into).collect();
    }

    pub fn select_projects<I, S>(&mut self, projects: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection.projects = projects.into_iter().map(Into::into).collect();
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
    }

    pub fn toggle_sort(&mut self, column: SortColumn) {
        self.sort.toggle(column);
    }

    pub fn set_window_start(&mut self, start: NaiveDate) {
        self.window = Window::new(start, self.window.months);
        self.reconcile_selection();
    }

    /// Assignees that still own a task relevant to the window.
    pub fn available_assignees(&self) -> Vec<String> {
        unique_sorted(self.live_tasks().map(|t| t.assignee.as_str()))
    }

    pub fn available_projects(&self) -> Vec<ProjectOption> {
        let mut by_key: BTreeMap<&str, &str> = BTreeMap::new();
        for task in self.live_tasks() {
            by_key
                .entry(task.project_key.as_str())
                .or_insert(task.project_name.as_str());
        }
        by_key
            .into_iter()
            .map(|(key, name)| ProjectOption {
                key: key.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    pub fn edit_assignees(&self) -> Vec<String> {
        unique_sorted(self.tasks.iter().map(|t| t.assignee.as_str()))
    }

    /// Priority labels ordered by rank; labels never seen with a rank go last.
    pub fn priorities(&self) -> Vec<String> {
        let ranks = self.priority_ranks();
        let mut names: Vec<&str> = Vec::new();
        for task in &self.tasks {
            if !task.priority.is_empty() && !names.contains(&task.priority.as_str()) {
                names.push(task.priority.as_str());
            }
        }
        names.sort_by_key(|name| ranks.get(name).copied().unwrap_or(u64::MAX));
        names.into_iter().map(str::to_string).collect()
    }

    pub fn statuses_for(&self, task: &Task) -> Vec<String> {
        self.project_statuses
            .get(&task.project_id)
            .map(|statuses| statuses.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn resolution_names(&self) -> Vec<String> {
        self.resolutions.iter().map(|r| r.name.clone()).collect()
    }

    /// Filter, then sort. Re-derived on every call.
    pub fn visible(&self) -> Vec<&Task> {
        let started = Instant::now();
        let mut rows = visible_tasks(&self.tasks, &self.selection, self.window.start);
        sort_tasks(&mut rows, self.sort);
        self.dev.observe("filter_sort", started.elapsed());
        rows
    }

    pub fn chart(&self, clock: &impl Clock) -> ChartDto {
        let started = Instant::now();
        let today = clock.today();
        let rows = self
            .visible()
            .into_iter()
            .map(|task| task_row(task, &self.window, today))
            .collect();
        self.dev.observe("geometry", started.elapsed());

        ChartDto {
            window_start: self.window.start.format("%Y-%m-%d").to_string(),
            window_end: self.window.last_day().format("%Y-%m-%d").to_string(),
            day_count: self.window.day_count(),
            sort_column: self.sort.column.map(|c| c.as_str().to_string()),
            sort_direction: self.sort.direction.as_str().to_string(),
            rows,
        }
    }

    pub fn options(&self, task: Option<&Task>) -> FilterOptionsDto {
        FilterOptionsDto {
            assignees: self.available_assignees(),
            edit_assignees: self.edit_assignees(),
            projects: self.available_projects(),
            priorities: self.priorities(),
            resolutions: self.resolution_names(),
            statuses: task.map(|t| self.statuses_for(t)).unwrap_or_default(),
        }
    }

    /// One `KEY title` line per visible task.
    pub fn issue_key_lines(&self) -> String {
        self.visible()
            .into_iter()
            .map(|task| format!("{} {}", task.issue_key, task.title))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Maps display names to remote ids. Names with no match are left out
    /// of the update rather than rejected.
    pub fn build_update(&self, task: &Task, patch: &TaskPatch) -> Result<IssueUpdate, GanttError> {
        let mut update = IssueUpdate::default();

        if let Some(name) = non_blank(patch.assignee.as_deref()) {
            update.assignee_id = self.users.iter().find(|u| u.name == name).map(|u| u.id);
            if update.assignee_id.is_none() {
                debug!(assignee = name, "no user with that name; omitting");
            }
        }

        if let Some(name) = non_blank(patch.status.as_deref()) {
            update.status_id = self
                .project_statuses
                .get(&task.project_id)
                .and_then(|statuses| statuses.iter().find(|s| s.name == name))
                .map(|s| s.id);
            if update.status_id.is_none() {
                debug!(status = name, project_id = task.project_id, "unknown status; omitting");
            }
        }

        if let Some(name) = non_blank(patch.priority.as_deref()) {
            update.priority_id = self.priority_ranks().get(name).copied();
            if update.priority_id.is_none() {
                debug!(priority = name, "unknown priority; omitting");
            }
        }

        if let Some(name) = non_blank(patch.resolution.as_deref()) {
            update.resolution_id = self
                .resolutions
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.id);
            if update.resolution_id.is_none() {
                debug!(resolution = name, "unknown resolution; omitting");
            }
        }

        if let Some(value) = &patch.start_date {
            update.start_date = Some(parse_patch_date("start date", value.as_deref())?);
        }
        if let Some(value) = &patch.end_date {
            update.due_date = Some(parse_patch_date("due date", value.as_deref())?);
        }

        update.comment = non_blank(patch.comment.as_deref()).map(str::to_string);

        Ok(update)
    }

    /// Pushes an edit and folds the remote's answer back into the task set.
    /// Any failure leaves the state as it was.
    #[instrument(skip(self, api, patch))]
    pub async fn submit_edit<A: BacklogApi>(
        &mut self,
        api: &A,
        reference: &str,
        patch: &TaskPatch,
    ) -> Result<EditOutcome, GanttError> {
        let task = self
            .find_task(reference)
            .ok_or_else(|| GanttError::Validation(format!("no task matches {reference}")))?;
        let task_id = task.id;
        let update = self.build_update(task, patch)?;

        if update.is_empty() {
            info!(task_id, "nothing to update");
            return Ok(EditOutcome::Unchanged);
        }

        let issue = api.update_issue(task_id, &update).await?;
        let replacement = normalize_issue(&issue, &project_index(&self.projects), &self.vocab);
        let position = self.tasks.iter().position(|t| t.id == task_id);

        let outcome = match (position, replacement) {
            (Some(pos), Some(task)) => {
                self.tasks[pos] = task.clone();
                EditOutcome::Updated(task)
            }
            (Some(pos), None) => {
                let removed = self.tasks.remove(pos);
                warn!(issue = %removed.issue_key, "issue no longer has an assignee; dropped");
                EditOutcome::Removed {
                    id: removed.id,
                    issue_key: removed.issue_key,
                }
            }
            (None, Some(task)) => {
                self.tasks.push(task.clone());
                EditOutcome::Updated(task)
            }
            (None, None) => EditOutcome::Unchanged,
        };

        self.reconcile_selection();
        info!(task_id, "issue updated");
        Ok(outcome)
    }

    fn live_tasks(&self) -> impl Iterator<Item = &Task> {
        let start = self.window.start;
        self.tasks
            .iter()
            .filter(move |task| !is_stale_completed(task, start))
    }

    fn priority_ranks(&self) -> HashMap<&str, u64> {
        self.tasks
            .iter()
            .filter_map(|t| t.priority_rank.map(|rank| (t.priority.as_str(), rank)))
            .collect()
    }

    fn reconcile_selection(&mut self) {
        let assignees: BTreeSet<String> = self.available_assignees().into_iter().collect();
        if !self.selection.assignees.is_subset(&assignees) {
            debug!("selected assignee left the window; selecting all available");
            self.selection.assignees = assignees;
        }

        let projects: BTreeSet<String> = self
            .available_projects()
            .into_iter()
            .map(|p| p.key)
            .collect();
        self.selection.projects.retain(|key| projects.contains(key));
    }
}

pub fn task_row(task: &Task, window: &Window, today: NaiveDate) -> TaskRowDto {
    TaskRowDto {
        id: task.id,
        issue_key: task.issue_key.clone(),
        title: task.title.clone(),
        project_key: task.project_key.clone(),
        project_name: task.project_name.clone(),
        assignee: task.assignee.clone(),
        start_date: task.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
        end_date: task.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
        status: task.status.clone(),
        status_class: status_class_dto(task.status_class),
        priority: task.priority.clone(),
        resolution: task.resolution.clone(),
        progress_percent: task.progress_percent(),
        bar: geometry(task, window, today).map(|bar| BarDto {
            left: bar.left,
            width: bar.width,
            color: bar.color.hex().to_string(),
            overdue: bar.overdue,
            show_label: bar.show_label,
        }),
    }
}

/// One-line summary used by `edit` output.
pub fn describe_task(task: &Task) -> String {
    format!(
        "{} {} [{}] {} {} - {}",
        task.issue_key,
        task.title,
        task.status,
        task.assignee,
        format_date(task.start_date),
        format_date(task.end_date)
    )
}

async fn fetch_project_statuses<A: BacklogApi>(
    api: &A,
    projects: &[Project],
) -> HashMap<u64, Vec<Status>> {
    let results = join_all(projects.iter().map(|project| async move {
        (project.id, api.list_project_statuses(project.id).await)
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(project_id, result)| match result {
            Ok(mut statuses) => {
                statuses.sort_by_key(|s| s.display_order.unwrap_or(i64::MAX));
                Some((project_id, statuses))
            }
            Err(err) => {
                warn!(project_id, error = %err, "failed fetching project statuses");
                None
            }
        })
        .collect()
}

fn status_class_dto(class: StatusClass) -> StatusClassDto {
    match class {
        StatusClass::Completed => StatusClassDto::Completed,
        StatusClass::InProgress => StatusClassDto::InProgress,
        StatusClass::Open => StatusClassDto::Open,
        StatusClass::Other => StatusClassDto::Other,
    }
}

fn unique_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_patch_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, GanttError> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| GanttError::Validation(format!("{field} must be YYYY-MM-DD, got {raw}"))),
    }
}
