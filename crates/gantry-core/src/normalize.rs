use std::collections::HashMap;

use tracing::{debug, trace};

use crate::backlog::model::{Issue, Project};
use crate::datetime::parse_remote_date;
use crate::task::{Task, UNKNOWN_PROJECT_KEY, UNKNOWN_PROJECT_NAME};
use crate::vocab::StatusVocabulary;

/// Converts one remote issue into a task. Issues without an assignee yield
/// nothing; unparsable dates become unset.
pub fn normalize_issue(
    issue: &Issue,
    projects: &HashMap<u64, &Project>,
    vocab: &StatusVocabulary,
) -> Option<Task> {
    let Some(assignee) = issue.assignee.as_ref() else {
        trace!(issue = %issue.issue_key, "dropping unassigned issue");
        return None;
    };

    let (project_key, project_name) = match projects.get(&issue.project_id) {
        Some(project) => (project.project_key.clone(), project.name.clone()),
        None => (
            UNKNOWN_PROJECT_KEY.to_string(),
            UNKNOWN_PROJECT_NAME.to_string(),
        ),
    };

    let status = issue.status.name.clone();
    let status_class = vocab.classify(&status);

    Some(Task {
        id: issue.id,
        issue_key: issue.issue_key.clone(),
        title: issue.summary.clone(),
        project_id: issue.project_id,
        project_key,
        project_name,
        assignee: assignee.name.clone(),
        start_date: parse_remote_date(issue.start_date.as_deref()),
        end_date: parse_remote_date(issue.due_date.as_deref()),
        status,
        status_class,
        status_order: issue.status.display_order,
        priority: issue
            .priority
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_default(),
        priority_rank: issue.priority.as_ref().map(|p| p.id),
        resolution: issue.resolution.as_ref().map(|r| r.name.clone()),
    })
}

#[tracing::instrument(skip(issues, projects, vocab), fields(count = issues.len()))]
pub fn normalize_issues(
    issues: &[Issue],
    projects: &[Project],
    vocab: &StatusVocabulary,
) -> Vec<Task> {
    let index = project_index(projects);
    let tasks: Vec<Task> = issues
        .iter()
        .filter_map(|issue| normalize_issue(issue, &index, vocab))
        .collect();

    debug!(
        kept = tasks.len(),
        dropped = issues.len() - tasks.len(),
        "normalized issues"
    );
    tasks
}

pub fn project_index(projects: &[Project]) -> HashMap<u64, &Project> {
    projects.iter().map(|p| (p.id, p)).collect()
}
