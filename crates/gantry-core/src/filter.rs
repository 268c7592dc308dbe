use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::trace;

use crate::task::Task;

/// Multi-select state for the two
/// filter dimensions. An empty set
/// selects nothing.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Selection {
  pub assignees: BTreeSet<String>,
  pub projects:  BTreeSet<String>
}

impl Selection {
  pub fn new<A, P>(
    assignees: A,
    projects: P
  ) -> Self
  where
    A: IntoIterator,
    A::Item: Into<String>,
    P: IntoIterator,
    P::Item: Into<String>
  {
    Self {
      assignees: assignees
        .into_iter()
        .map(Into::into)
        .collect(),
      projects:  projects
        .into_iter()
        .map(Into::into)
        .collect()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.assignees.is_empty()
      || self.projects.is_empty()
  }

  pub fn admits(
    &self,
    task: &Task
  ) -> bool {
    self
      .assignees
      .contains(&task.assignee)
      && self
        .projects
        .contains(&task.project_key)
  }
}

/// A completed task whose work ended
/// before the window, or never recorded
/// an end.
pub fn is_stale_completed(
  task: &Task,
  window_start: NaiveDate
) -> bool {
  if !task.is_completed() {
    return false;
  }
  match task.end_date {
    | None => true,
    | Some(end) => end < window_start
  }
}

pub fn is_visible(
  task: &Task,
  selection: &Selection,
  window_start: NaiveDate
) -> bool {
  selection.admits(task)
    && !is_stale_completed(
      task,
      window_start
    )
}

#[tracing::instrument(
  skip(tasks, selection),
  fields(total = tasks.len())
)]
pub fn visible_tasks<'a>(
  tasks: &'a [Task],
  selection: &Selection,
  window_start: NaiveDate
) -> Vec<&'a Task> {
  if selection.is_empty() {
    trace!("empty selection");
    return Vec::new();
  }

  tasks
    .iter()
    .filter(|task| {
      is_visible(
        task,
        selection,
        window_start
      )
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    Selection,
    is_stale_completed,
    visible_tasks
  };
  use crate::task::Task;
  use crate::vocab::StatusClass;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .unwrap()
  }

  fn task(
    id: u64,
    assignee: &str,
    project: &str,
    class: StatusClass,
    end: Option<NaiveDate>
  ) -> Task {
    Task {
      id,
      issue_key: format!(
        "{project}-{id}"
      ),
      title: format!("task {id}"),
      project_id: 1,
      project_key: project.to_string(),
      project_name: project.to_string(),
      assignee: assignee.to_string(),
      start_date: None,
      end_date: end,
      status: String::new(),
      status_class: class,
      status_order: None,
      priority: String::new(),
      priority_rank: None,
      resolution: None
    }
  }

  #[test]
  fn empty_selection_shows_nothing() {
    let tasks = vec![task(
      1,
      "Alice",
      "PROJ",
      StatusClass::Open,
      None
    )];
    let start = day(2024, 1, 1);

    let none = Selection::new(
      Vec::<String>::new(),
      ["PROJ"]
    );
    assert!(
      visible_tasks(
        &tasks, &none, start
      )
      .is_empty()
    );

    let no_projects = Selection::new(
      ["Alice"],
      Vec::<String>::new()
    );
    assert!(
      visible_tasks(
        &tasks,
        &no_projects,
        start
      )
      .is_empty()
    );
  }

  #[test]
  fn completed_boundaries() {
    let start = day(2024, 1, 1);
    let open_unset = task(
      1,
      "A",
      "P",
      StatusClass::Open,
      None
    );
    let done_unset = task(
      2,
      "A",
      "P",
      StatusClass::Completed,
      None
    );
    let done_day_before = task(
      3,
      "A",
      "P",
      StatusClass::Completed,
      Some(day(2023, 12, 31))
    );
    let done_on_start = task(
      4,
      "A",
      "P",
      StatusClass::Completed,
      Some(start)
    );
    let open_long_ago = task(
      5,
      "A",
      "P",
      StatusClass::InProgress,
      Some(day(2020, 1, 1))
    );

    assert!(!is_stale_completed(
      &open_unset,
      start
    ));
    assert!(is_stale_completed(
      &done_unset,
      start
    ));
    assert!(is_stale_completed(
      &done_day_before,
      start
    ));
    assert!(!is_stale_completed(
      &done_on_start,
      start
    ));
    assert!(!is_stale_completed(
      &open_long_ago,
      start
    ));
  }

  #[test]
  fn requires_both_dimensions_and_is_idempotent()
   {
    let start = day(2024, 1, 1);
    let tasks = vec![
      task(
        1,
        "Alice",
        "PROJ",
        StatusClass::Open,
        None
      ),
      task(
        2,
        "Bob",
        "PROJ",
        StatusClass::Open,
        None
      ),
      task(
        3,
        "Alice",
        "OTHER",
        StatusClass::Open,
        None
      ),
      task(
        4,
        "Alice",
        "PROJ",
        StatusClass::Completed,
        None
      ),
    ];
    let selection = Selection::new(
      ["Alice"],
      ["PROJ"]
    );

    let first: Vec<Task> =
      visible_tasks(
        &tasks, &selection, start
      )
      .into_iter()
      .cloned()
      .collect();
    assert_eq!(
      first
        .iter()
        .map(|t| t.id)
        .collect::<Vec<_>>(),
      vec![1]
    );

    let second: Vec<Task> =
      visible_tasks(
        &first, &selection, start
      )
      .into_iter()
      .cloned()
      .collect();
    assert_eq!(first, second);
  }
}
