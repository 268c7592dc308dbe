use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::vocab::StatusClass;

pub const UNKNOWN_PROJECT_NAME: &str = "Unknown Project";
pub const UNKNOWN_PROJECT_KEY: &str = "UNKNOWN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,

    pub issue_key: String,

    pub title: String,

    pub project_id: u64,

    pub project_key: String,

    pub project_name: String,

    pub assignee: String,

    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    pub status: String,

    pub status_class: StatusClass,

    #[serde(default)]
    pub status_order: Option<i64>,

    pub priority: String,

    #[serde(default)]
    pub priority_rank: Option<u64>,

    #[serde(default)]
    pub resolution: Option<String>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status_class == StatusClass::Completed
    }

    /// Derived from the status class only.
    pub fn progress_percent(&self) -> u8 {
        self.status_class.progress_percent()
    }

    pub fn matches_ref(&self, reference: &str) -> bool {
        let reference = reference.trim();
        if let Ok(id) = reference.parse::<u64>() {
            return self.id == id;
        }
        self.issue_key.eq_ignore_ascii_case(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::Task;
    use crate::vocab::StatusClass;

    #[test]
    fn matches_numeric_id_or_issue_key() {
        let task = Task {
            id: 42,
            issue_key: "PROJ-7".to_string(),
            title: "Ship".to_string(),
            project_id: 1,
            project_key: "PROJ".to_string(),
            project_name: "Project".to_string(),
            assignee: "Alice".to_string(),
            start_date: None,
            end_date: None,
            status: "完了".to_string(),
            status_class: StatusClass::Completed,
            status_order: None,
            priority: String::new(),
            priority_rank: None,
            resolution: None,
        };

        assert!(task.matches_ref("42"));
        assert!(task.matches_ref(" proj-7 "));
        assert!(!task.matches_ref("7"));
        assert!(task.is_completed());
        assert_eq!(task.progress_percent(), 100);
    }
}
