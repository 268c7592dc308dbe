use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub project_key: String,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub id: u64,
    #[serde(default)]
    pub project_id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Priority {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: u64,
    pub project_id: u64,
    #[serde(default)]
    pub issue_key: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// Fields sent with `PATCH /issues/{id}`. `None` leaves a field untouched;
/// `Some(None)` on a date clears it remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueUpdate {
    pub assignee_id: Option<u64>,
    pub status_id: Option<u64>,
    pub priority_id: Option<u64>,
    pub resolution_id: Option<u64>,
    pub start_date: Option<Option<NaiveDate>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub comment: Option<String>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self.form_pairs().is_empty()
    }

    pub fn form_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(id) = self.assignee_id {
            pairs.push(("assigneeId", id.to_string()));
        }
        if let Some(id) = self.status_id {
            pairs.push(("statusId", id.to_string()));
        }
        if let Some(id) = self.priority_id {
            pairs.push(("priorityId", id.to_string()));
        }
        if let Some(id) = self.resolution_id {
            pairs.push(("resolutionId", id.to_string()));
        }
        if let Some(date) = self.start_date {
            pairs.push(("startDate", format_remote_date(date)));
        }
        if let Some(date) = self.due_date {
            pairs.push(("dueDate", format_remote_date(date)));
        }
        if let Some(comment) = self.comment.as_deref()
            && !comment.is_empty()
        {
            pairs.push(("comment", comment.to_string()));
        }

        pairs
    }

    pub fn encode_form(&self) -> String {
        self.form_pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(&value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn format_remote_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
