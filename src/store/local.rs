use super::TodoStore;
use crate::errors::StoreError;
use crate::models::{DailyStat, Owner, Todo};
use crate::storage::{Entries, LocalStorage};
use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DAILY_STATS_KEY: &str = "dailyStats";
pub const TODO_KEY_PREFIX: &str = "todos_";
const DAILY_STATS_CAP: usize = 30;

pub fn todo_key(date: NaiveDate) -> String {
    format!("{TODO_KEY_PREFIX}{}", date.format("%Y-%m-%d"))
}

/// Fallback store for anonymous users: one `todos_<date>` entry per day plus a
/// shared `dailyStats` list.
#[derive(Clone)]
pub struct LocalStore {
    storage: LocalStorage,
}

impl LocalStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Dates that currently have a `todos_<date>` entry.
    pub async fn stored_dates(&self) -> Vec<NaiveDate> {
        self.storage
            .keys()
            .await
            .iter()
            .filter_map(|key| parse_todo_key(key))
            .collect()
    }

    pub async fn write_todos(&self, date: NaiveDate, todos: &[Todo]) -> Result<(), StoreError> {
        let payload = serde_json::to_string(todos)?;
        self.storage
            .update(|entries| {
                entries.insert(todo_key(date), payload);
                record_daily_stat(entries, date, todos);
            })
            .await?;
        Ok(())
    }

    async fn mutate<R>(
        &self,
        date: NaiveDate,
        f: impl FnOnce(&mut Vec<Todo>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let key = todo_key(date);
        self.storage
            .update(|entries| {
                let mut todos = decode_todos(&key, entries.get(&key).map(String::as_str));
                let result = f(&mut todos)?;
                entries.insert(key.clone(), serde_json::to_string(&todos)?);
                record_daily_stat(entries, date, &todos);
                Ok(result)
            })
            .await?
    }
}

fn parse_todo_key(key: &str) -> Option<NaiveDate> {
    let date = key.strip_prefix(TODO_KEY_PREFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn decode_todos(key: &str, raw: Option<&str>) -> Vec<Todo> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Option<Vec<Todo>>>(raw) {
        Ok(todos) => todos.unwrap_or_default(),
        Err(err) => {
            warn!("ignoring malformed {key}: {err}");
            Vec::new()
        }
    }
}

fn decode_stats(raw: Option<&str>) -> Vec<DailyStat> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<DailyStat>>(raw) {
        Ok(stats) => stats,
        Err(err) => {
            warn!("ignoring malformed {DAILY_STATS_KEY}: {err}");
            Vec::new()
        }
    }
}

/// Replaces the stat for `date` and keeps the most recent dates only.
fn record_daily_stat(entries: &mut Entries, date: NaiveDate, todos: &[Todo]) {
    let mut stats = decode_stats(entries.get(DAILY_STATS_KEY).map(String::as_str));
    stats.retain(|stat| stat.date != date);
    stats.push(DailyStat::from_todos(Owner::Local, date, todos));
    stats.sort_by(|a, b| b.date.cmp(&a.date));
    stats.truncate(DAILY_STATS_CAP);

    match serde_json::to_string(&stats) {
        Ok(payload) => {
            entries.insert(DAILY_STATS_KEY.to_string(), payload);
        }
        Err(err) => warn!("failed to encode {DAILY_STATS_KEY}: {err}"),
    }
}

fn find_mut<'a>(todos: &'a mut [Todo], id: &str) -> Result<&'a mut Todo, StoreError> {
    todos
        .iter_mut()
        .find(|todo| todo.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

impl TodoStore for LocalStore {
    fn owner(&self) -> Owner {
        Owner::Local
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Todo>, StoreError> {
        let key = todo_key(date);
        let raw = self.storage.get_item(&key).await;
        Ok(decode_todos(&key, raw.as_deref()))
    }

    async fn add(&self, date: NaiveDate, task: &str) -> Result<Todo, StoreError> {
        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            task: task.trim().to_string(),
            completed: false,
            created_at: Utc::now(),
            todo_date: date,
            owner: Owner::Local,
        };
        let created = todo.clone();
        self.mutate(date, move |todos| {
            todos.insert(0, todo);
            Ok(())
        })
        .await?;
        debug!(date = %date, id = %created.id, "local todo added");
        Ok(created)
    }

    async fn set_completed(
        &self,
        date: NaiveDate,
        id: &str,
        completed: bool,
    ) -> Result<Todo, StoreError> {
        self.mutate(date, |todos| {
            let todo = find_mut(todos, id)?;
            todo.completed = completed;
            Ok(todo.clone())
        })
        .await
    }

    async fn edit(&self, date: NaiveDate, id: &str, task: &str) -> Result<Todo, StoreError> {
        self.mutate(date, |todos| {
            let todo = find_mut(todos, id)?;
            todo.task = task.trim().to_string();
            Ok(todo.clone())
        })
        .await
    }

    async fn delete(&self, date: NaiveDate, id: &str) -> Result<(), StoreError> {
        self.mutate(date, |todos| {
            let before = todos.len();
            todos.retain(|todo| todo.id != id);
            if todos.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn daily_stats(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStat>, StoreError> {
        let raw = self.storage.get_item(DAILY_STATS_KEY).await;
        let mut stats: Vec<DailyStat> = decode_stats(raw.as_deref())
            .into_iter()
            .filter(|stat| stat.date >= start && stat.date <= end)
            .collect();
        stats.sort_by_key(|stat| stat.date);
        Ok(stats)
    }

    /// Removes todo entries only; `dailyStats` history is kept for analytics.
    async fn clear_before(&self, date: NaiveDate) -> Result<usize, StoreError> {
        let removed = self
            .storage
            .update(|entries| {
                let stale: Vec<String> = entries
                    .keys()
                    .filter(|key| parse_todo_key(key).is_some_and(|day| day < date))
                    .cloned()
                    .collect();
                for key in &stale {
                    entries.remove(key);
                }
                stale.len()
            })
            .await?;
        Ok(removed)
    }
}
