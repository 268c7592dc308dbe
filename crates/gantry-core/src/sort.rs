use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortColumn {
    Project,
    Title,
    Assignee,
    StartDate,
    EndDate,
    Status,
}

impl SortColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Title => "title",
            Self::Assignee => "assignee",
            Self::StartDate => "startDate",
            Self::EndDate => "endDate",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortColumn {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let column = match s.trim().to_ascii_lowercase().as_str() {
            "project" => Self::Project,
            "title" | "task" => Self::Title,
            "assignee" => Self::Assignee,
            "start" | "startdate" => Self::StartDate,
            "end" | "enddate" | "due" => Self::EndDate,
            "status" => Self::Status,
            other => return Err(anyhow!("unknown sort column: {other}")),
        };
        Ok(column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
    #[default]
    None,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    pub column: Option<SortColumn>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        if direction == SortDirection::None {
            return Self::default();
        }
        Self {
            column: Some(column),
            direction,
        }
    }

    /// Header-click cycle: asc, desc, then back to the default order.
    pub fn toggle(&mut self, column: SortColumn) {
        *self = if self.column == Some(column) {
            match self.direction {
                SortDirection::Ascending => Self::new(column, SortDirection::Descending),
                SortDirection::Descending => Self::default(),
                SortDirection::None => Self::new(column, SortDirection::Ascending),
            }
        } else {
            Self::new(column, SortDirection::Ascending)
        };
    }

    fn active(&self) -> Option<(SortColumn, bool)> {
        let column = self.column?;
        match self.direction {
            SortDirection::Ascending => Some((column, false)),
            SortDirection::Descending => Some((column, true)),
            SortDirection::None => None,
        }
    }
}

/// Stable sort of the visible rows.
pub fn sort_tasks(tasks: &mut [&Task], state: SortState) {
    match state.active() {
        Some((column, descending)) => {
            tasks.sort_by(|a, b| compare_on_column(a, b, column, descending));
        }
        None => tasks.sort_by(|a, b| cmp_dates_unset_last(a.start_date, b.start_date, false)),
    }
}

fn compare_on_column(a: &Task, b: &Task, column: SortColumn, descending: bool) -> Ordering {
    let text = |left: &str, right: &str| {
        let ordering = left.cmp(right);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    };

    match column {
        SortColumn::Project => text(&a.project_key, &b.project_key),
        SortColumn::Title => text(&a.title, &b.title),
        SortColumn::Assignee => text(&a.assignee, &b.assignee),
        SortColumn::Status => text(&a.status, &b.status),
        SortColumn::StartDate => cmp_dates_unset_last(a.start_date, b.start_date, descending),
        SortColumn::EndDate => cmp_dates_unset_last(a.end_date, b.end_date, descending),
    }
}

// Unset dates sink to the bottom regardless of direction.
fn cmp_dates_unset_last(
    left: Option<NaiveDate>,
    right: Option<NaiveDate>,
    descending: bool,
) -> Ordering {
    match (left, right) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
