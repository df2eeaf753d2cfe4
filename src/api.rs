use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{AdvancementEvent, AdvancementRow, Project, Record};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for action {action}")]
    Status {
        action: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("Please fill in all required fields.")]
    MissingFields,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectsPayload {
    #[serde(default, deserialize_with = "list_or_null")]
    projects: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdvancementPayload {
    #[serde(default, deserialize_with = "list_or_null")]
    advancement_events: Vec<Value>,
    #[serde(default, deserialize_with = "list_or_null")]
    advancements: Vec<Value>,
}

// The sheet script sends `null` for an empty tab.
fn list_or_null<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default)]
pub struct AdvancementData {
    pub events: Vec<AdvancementEvent>,
    pub rows: Vec<AdvancementRow>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub category: String,
    pub description: String,
    pub link: String,
}

impl NewProject {
    pub const INITIAL_STATUS: &'static str = "pending";

    /// Trims every field and rejects the submission if any is blank.
    pub fn validated(self) -> Result<Self, ApiError> {
        let project = Self {
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            description: self.description.trim().to_string(),
            link: self.link.trim().to_string(),
        };
        let fields = [&project.name, &project.category, &project.description, &project.link];
        if fields.iter().any(|field| field.is_empty()) {
            return Err(ApiError::MissingFields);
        }
        Ok(project)
    }
}

fn records(values: Vec<Value>) -> Vec<Record> {
    let total = values.len();
    let records: Vec<Record> = values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect();
    if records.len() != total {
        warn!(skipped = total - records.len(), "ignoring non-object rows");
    }
    records
}

pub struct SheetClient {
    http: reqwest::Client,
    base_url: String,
}

impl SheetClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("portfolio-activity/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    pub async fn fetch_projects(&self) -> Result<Vec<Arc<Project>>, ApiError> {
        let payload: ProjectsPayload = self
            .get("getProjects", &[("status", "approved")])
            .await?;
        let projects: Vec<Arc<Project>> = records(payload.projects)
            .into_iter()
            .map(|record| Arc::new(Project::from_record(record)))
            .collect();
        debug!(count = projects.len(), "fetched projects");
        Ok(projects)
    }

    pub async fn fetch_advancements(&self) -> Result<AdvancementData, ApiError> {
        let payload: AdvancementPayload = self.get("getAdvancements", &[]).await?;
        let data = AdvancementData {
            events: records(payload.advancement_events)
                .into_iter()
                .map(AdvancementEvent::from_record)
                .collect(),
            rows: records(payload.advancements)
                .into_iter()
                .map(AdvancementRow::from_record)
                .collect(),
        };
        debug!(
            events = data.events.len(),
            rows = data.rows.len(),
            "fetched advancement data"
        );
        Ok(data)
    }

    pub async fn submit_project(&self, project: NewProject) -> Result<(), ApiError> {
        let project = project.validated()?;
        let response = self
            .http
            .post(&self.base_url)
            .query(&[
                ("action", "addProject"),
                ("name", project.name.as_str()),
                ("category", project.category.as_str()),
                ("description", project.description.as_str()),
                ("link", project.link.as_str()),
                ("status", NewProject::INITIAL_STATUS),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                action: "addProject",
                status: response.status(),
            });
        }
        debug!(name = %project.name, "project submitted");
        Ok(())
    }

    async fn get<T>(&self, action: &'static str, params: &[(&str, &str)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Default,
    {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("action", action)])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                action,
                status: response.status(),
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        if !envelope.success {
            return Err(ApiError::Rejected(
                envelope
                    .error
                    .unwrap_or_else(|| format!("{action} was not successful")),
            ));
        }
        Ok(envelope.data.unwrap_or_default())
    }
}
