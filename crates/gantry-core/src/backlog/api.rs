use std::future::Future;

use tracing::debug;

use super::model::{Issue, IssueUpdate, Project, Resolution, Status, User};
use crate::error::GanttError;

pub const ISSUE_PAGE_SIZE: usize = 100;
pub const ISSUE_FETCH_CAP: usize = 1000;

/// The slice of the Backlog REST API this tool consumes.
pub trait BacklogApi {
    fn list_projects(&self) -> impl Future<Output = Result<Vec<Project>, GanttError>>;

    fn list_issues(&self) -> impl Future<Output = Result<Vec<Issue>, GanttError>>;

    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, GanttError>>;

    fn list_project_statuses(
        &self,
        project_id: u64,
    ) -> impl Future<Output = Result<Vec<Status>, GanttError>>;

    fn list_resolutions(&self) -> impl Future<Output = Result<Vec<Resolution>, GanttError>>;

    fn update_issue(
        &self,
        issue_id: u64,
        update: &IssueUpdate,
    ) -> impl Future<Output = Result<Issue, GanttError>>;
}

/// Pulls newest-first pages until the cap is reached or the remote runs out.
pub async fn collect_issue_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<Issue>, GanttError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<Issue>, GanttError>>,
{
    let mut issues = Vec::new();
    let mut offset = 0;

    while offset < ISSUE_FETCH_CAP {
        let page = fetch_page(offset, ISSUE_PAGE_SIZE).await?;
        let fetched = page.len();
        debug!(offset, fetched, "fetched issue page");

        issues.extend(page);
        if fetched < ISSUE_PAGE_SIZE {
            break;
        }
        offset += ISSUE_PAGE_SIZE;
    }

    Ok(issues)
}
