use serde::{
  Deserialize,
  Deserializer,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "snake_case")]
pub enum StatusClassDto {
  Completed,
  InProgress,
  Open,
  Other
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct BarDto {
  pub left:       f64,
  pub width:      f64,
  pub color:      String,
  pub overdue:    bool,
  pub show_label: bool
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskRowDto {
  pub id:               u64,
  pub issue_key:        String,
  pub title:            String,
  pub project_key:      String,
  pub project_name:     String,
  pub assignee:         String,
  pub start_date:       Option<String>,
  pub end_date:         Option<String>,
  pub status:           String,
  pub status_class:     StatusClassDto,
  pub priority:         String,
  #[serde(default)]
  pub resolution:       Option<String>,
  pub progress_percent: u8,
  /// `None` when the task has no bar
  /// inside the current window.
  pub bar:              Option<BarDto>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct ChartDto {
  pub window_start: String,
  pub window_end:   String,
  pub day_count:    usize,
  pub sort_column:  Option<String>,
  pub sort_direction: String,
  pub rows:         Vec<TaskRowDto>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ProjectOption {
  pub key:  String,
  pub name: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct FilterOptionsDto {
  /// Assignees with at least one task
  /// still relevant to the window.
  pub assignees:   Vec<String>,
  /// Every assignee in the task set,
  /// offered by the edit form.
  #[serde(default)]
  pub edit_assignees: Vec<String>,
  pub projects:    Vec<ProjectOption>,
  pub priorities:  Vec<String>,
  pub resolutions: Vec<String>,
  #[serde(default)]
  pub statuses:    Vec<String>
}

/// Edit form payload. Date fields use a
/// double option: absent leaves the
/// date alone, `null` clears it.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct TaskPatch {
  #[serde(default)]
  pub assignee:   Option<String>,
  #[serde(default)]
  pub status:     Option<String>,
  #[serde(default)]
  pub priority:   Option<String>,
  #[serde(default)]
  pub resolution: Option<String>,
  #[serde(
    default,
    deserialize_with = "double_option"
  )]
  pub start_date:
    Option<Option<String>>,
  #[serde(
    default,
    deserialize_with = "double_option"
  )]
  pub end_date: Option<Option<String>>,
  #[serde(default)]
  pub comment:    Option<String>
}

impl TaskPatch {
  pub fn is_empty(&self) -> bool {
    self.assignee.is_none()
      && self.status.is_none()
      && self.priority.is_none()
      && self.resolution.is_none()
      && self.start_date.is_none()
      && self.end_date.is_none()
      && self
        .comment
        .as_deref()
        .map(str::is_empty)
        .unwrap_or(true)
  }
}

fn double_option<'de, D>(
  deserializer: D
) -> Result<Option<Option<String>>, D::Error>
where
  D: Deserializer<'de>
{
  Option::<String>::deserialize(
    deserializer
  )
  .map(Some)
}
