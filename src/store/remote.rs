use super::TodoStore;
use crate::errors::StoreError;
use crate::models::{DailyStat, Owner, Todo};
use crate::session::Session;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

const TODOS_TABLE: &str = "todos";
const STATS_TABLE: &str = "daily_tracking_stats";

/// Connection to a PostgREST-style backend. Cheap to clone.
#[derive(Clone)]
pub struct RemoteClient {
    base_url: String,
    anon_key: String,
    http: Client,
}

impl RemoteClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, StoreError> {
        let http = Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            http,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }
}

/// The remote store bound to one signed-in user.
#[derive(Clone)]
pub struct RemoteStore {
    client: RemoteClient,
    session: Session,
}

#[derive(Serialize)]
struct NewTodo<'a> {
    task: &'a str,
    completed: bool,
    user_id: &'a str,
    todo_date: NaiveDate,
}

#[derive(Serialize)]
struct TodoPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<&'a str>,
}

impl RemoteStore {
    pub fn new(client: RemoteClient, session: Session) -> Self {
        Self { client, session }
    }

    fn user_filter(&self) -> String {
        format!("eq.{}", self.session.user_id)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.client
            .http
            .request(method, self.client.table_url(table))
            .header("apikey", &self.client.anon_key)
            .bearer_auth(&self.session.access_token)
    }

    async fn fetch_todos(&self, date: NaiveDate) -> Result<Vec<Todo>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, TODOS_TABLE)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", self.user_filter()),
                ("todo_date", format!("eq.{date}")),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;
        decode(response).await
    }

    async fn patch(&self, id: &str, patch: TodoPatch<'_>) -> Result<Todo, StoreError> {
        let response = self
            .request(reqwest::Method::PATCH, TODOS_TABLE)
            .query(&[("id", format!("eq.{id}")), ("user_id", self.user_filter())])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        let rows: Vec<Todo> = decode(response).await?;
        let todo = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.sync_daily_stat(todo.todo_date).await;
        Ok(todo)
    }

    /// Re-reads the date and upserts its aggregate row. Failures are logged only.
    async fn sync_daily_stat(&self, date: NaiveDate) {
        let todos = match self.fetch_todos(date).await {
            Ok(todos) => todos,
            Err(err) => {
                warn!(date = %date, "skipping daily stat refresh: {err}");
                return;
            }
        };
        let stat = DailyStat::from_todos(self.owner(), date, &todos);
        let result = self
            .request(reqwest::Method::POST, STATS_TABLE)
            .query(&[("on_conflict", "user_id,date")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[stat])
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(date = %date, "daily stat upserted");
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(date = %date, "daily stat upsert returned {status}: {body}");
            }
            Err(err) => error!(date = %date, "daily stat upsert failed: {err}"),
        }
    }
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized,
        StatusCode::CONFLICT => StoreError::Conflict(message),
        _ => StoreError::Remote {
            status: status.as_u16(),
            message,
        },
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let bytes = check(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl TodoStore for RemoteStore {
    fn owner(&self) -> Owner {
        Owner::User(self.session.user_id.clone())
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Todo>, StoreError> {
        match self.fetch_todos(date).await {
            Err(StoreError::Unauthorized) => {
                warn!(date = %date, "remote refused the session; treating as empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn add(&self, date: NaiveDate, task: &str) -> Result<Todo, StoreError> {
        let row = NewTodo {
            task: task.trim(),
            completed: false,
            user_id: &self.session.user_id,
            todo_date: date,
        };
        let response = self
            .request(reqwest::Method::POST, TODOS_TABLE)
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let rows: Vec<Todo> = decode(response).await?;
        let todo = rows.into_iter().next().ok_or_else(|| StoreError::Remote {
            status: StatusCode::OK.as_u16(),
            message: "insert returned no row".to_string(),
        })?;
        self.sync_daily_stat(date).await;
        Ok(todo)
    }

    async fn set_completed(
        &self,
        _date: NaiveDate,
        id: &str,
        completed: bool,
    ) -> Result<Todo, StoreError> {
        self.patch(
            id,
            TodoPatch {
                completed: Some(completed),
                task: None,
            },
        )
        .await
    }

    async fn edit(&self, _date: NaiveDate, id: &str, task: &str) -> Result<Todo, StoreError> {
        self.patch(
            id,
            TodoPatch {
                completed: None,
                task: Some(task.trim()),
            },
        )
        .await
    }

    async fn delete(&self, _date: NaiveDate, id: &str) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::DELETE, TODOS_TABLE)
            .query(&[("id", format!("eq.{id}")), ("user_id", self.user_filter())])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<Todo> = decode(response).await?;
        let deleted = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.sync_daily_stat(deleted.todo_date).await;
        Ok(())
    }

    async fn daily_stats(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStat>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, STATS_TABLE)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", self.user_filter()),
                ("date", format!("gte.{start}")),
                ("date", format!("lte.{end}")),
                ("order", "date.asc".to_string()),
            ])
            .send()
            .await?;
        decode(response).await
    }

    /// Stats rows are left in place as analytics history.
    async fn clear_before(&self, date: NaiveDate) -> Result<usize, StoreError> {
        let response = self
            .request(reqwest::Method::DELETE, TODOS_TABLE)
            .query(&[("user_id", self.user_filter()), ("todo_date", format!("lt.{date}"))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<Todo> = decode(response).await?;
        Ok(rows.len())
    }
}
