use chrono::{Datelike, Months, NaiveDate};
use tracing::trace;

use crate::task::Task;
use crate::vocab::StatusClass;

/// Rolling date axis: every day from `start` through `start + months`,
/// both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub months: u32,
}

impl Window {
    pub fn new(start: NaiveDate, months: u32) -> Self {
        Self {
            start,
            months: months.max(1),
        }
    }

    pub fn last_day(&self) -> NaiveDate {
        self.start
            .checked_add_months(Months::new(self.months))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn day_count(&self) -> usize {
        ((self.last_day() - self.start).num_days() + 1).max(1) as usize
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        self.start.iter_days().take(self.day_count()).collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.last_day()
    }

    /// Moves the start by `delta` months and snaps it to the 1st.
    pub fn shift_months(&self, delta: i32) -> Self {
        let months = Months::new(delta.unsigned_abs());
        let moved = if delta < 0 {
            self.start.checked_sub_months(months)
        } else {
            self.start.checked_add_months(months)
        };
        let start = moved
            .and_then(|date| date.with_day(1))
            .unwrap_or(self.start);
        Self {
            start,
            months: self.months,
        }
    }

    fn index_of(&self, date: NaiveDate) -> i64 {
        (date - self.start).num_days()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarColor {
    Overdue,
    Completed,
    InProgress,
    Open,
    Default,
}

impl BarColor {
    pub fn for_status(class: StatusClass) -> Self {
        match class {
            StatusClass::Completed => Self::Completed,
            StatusClass::InProgress => Self::InProgress,
            StatusClass::Open => Self::Open,
            StatusClass::Other => Self::Default,
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            Self::Overdue => "#e53e3e",
            Self::Completed => "#38a169",
            Self::InProgress => "#3182ce",
            Self::Open | Self::Default => "#718096",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub start_index: usize,
    pub end_index: usize,
    pub left: f64,
    pub width: f64,
    pub color: BarColor,
    pub overdue: bool,
    pub show_label: bool,
}

pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    match task.end_date {
        Some(end) => end < today && !task.is_completed(),
        None => false,
    }
}

pub fn show_label(task: &Task, window: &Window) -> bool {
    task.end_date.is_some_and(|end| end >= window.start)
}

/// Places a task on the day grid. Tasks missing either date, or lying
/// wholly outside the window, have no bar.
pub fn geometry(task: &Task, window: &Window, today: NaiveDate) -> Option<BarGeometry> {
    let (start, end) = match (task.start_date, task.end_date) {
        (Some(start), Some(end)) => (start, end),
        _ => return None,
    };

    let last_day = window.last_day();
    if end < window.start || start > last_day {
        trace!(task = %task.issue_key, "outside window");
        return None;
    }

    let day_count = window.day_count() as i64;
    let start_index = if start < window.start {
        0
    } else {
        window.index_of(start)
    };
    let end_index = if end > last_day {
        day_count - 1
    } else {
        window.index_of(end)
    };

    let n = day_count as f64;
    let left = (start_index as f64 / n).max(0.0);
    let width = ((end_index - start_index + 1) as f64 / n).max(0.0);

    let overdue = is_overdue(task, today);
    let color = if overdue {
        BarColor::Overdue
    } else {
        BarColor::for_status(task.status_class)
    };

    Some(BarGeometry {
        start_index: start_index.max(0) as usize,
        end_index: end_index.max(0) as usize,
        left,
        width,
        color,
        overdue,
        show_label: show_label(task, window),
    })
}
