use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::api::{BacklogApi, collect_issue_pages};
use super::model::{Issue, IssueUpdate, Project, Resolution, Status, User};
use crate::config::{Config, Credentials};
use crate::error::GanttError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpBacklogClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    message: String,
}

impl HttpBacklogClient {
    pub fn new(credentials: &Credentials) -> Result<Self, GanttError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GanttError::Unknown(format!("failed building HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url_for(credentials),
            api_key: credentials.api_key.clone(),
        })
    }

    /// Fails with a validation error before any request when the space id or
    /// API key is missing.
    pub fn from_config(cfg: &Config) -> Result<Self, GanttError> {
        let credentials = cfg.credentials()?;
        Self::new(&credentials)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<reqwest::Url, GanttError> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|err| GanttError::Validation(format!("invalid backlog URL: {err}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("apiKey", &self.api_key);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    #[instrument(skip(self, params))]
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GanttError> {
        let url = self.url(path, params)?;
        let response = self.client.get(url).send().await?;
        decode_response(response).await
    }

    async fn issues_page(&self, offset: usize, count: usize) -> Result<Vec<Issue>, GanttError> {
        self.get_json(
            "/issues",
            &[
                ("count", count.to_string()),
                ("offset", offset.to_string()),
                ("sort", "created".to_string()),
                ("order", "desc".to_string()),
            ],
        )
        .await
    }
}

impl BacklogApi for HttpBacklogClient {
    async fn list_projects(&self) -> Result<Vec<Project>, GanttError> {
        self.get_json("/projects", &[]).await
    }

    async fn list_issues(&self) -> Result<Vec<Issue>, GanttError> {
        collect_issue_pages(|offset, count| self.issues_page(offset, count)).await
    }

    async fn list_users(&self) -> Result<Vec<User>, GanttError> {
        self.get_json("/users", &[]).await
    }

    async fn list_project_statuses(&self, project_id: u64) -> Result<Vec<Status>, GanttError> {
        self.get_json(&format!("/projects/{project_id}/statuses"), &[])
            .await
    }

    async fn list_resolutions(&self) -> Result<Vec<Resolution>, GanttError> {
        self.get_json("/resolutions", &[]).await
    }

    #[instrument(skip(self, update))]
    async fn update_issue(&self, issue_id: u64, update: &IssueUpdate) -> Result<Issue, GanttError> {
        let url = self.url(&format!("/issues/{issue_id}"), &[])?;
        let body = update.encode_form();
        debug!(fields = update.form_pairs().len(), "sending issue update");

        let response = self
            .client
            .patch(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;
        decode_response(response).await
    }
}

pub fn base_url_for(credentials: &Credentials) -> String {
    format!(
        "https://{}.{}/api/v2",
        credentials.space.trim(),
        credentials.domain.trim().trim_start_matches('.')
    )
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GanttError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = api_error_message(&text).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
        warn!(status = status.as_u16(), %message, "backlog request failed");
        return Err(GanttError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_str(&text)?)
}

fn api_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let messages: Vec<String> = parsed
        .errors
        .into_iter()
        .map(|entry| entry.message)
        .filter(|msg| !msg.trim().is_empty())
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}
