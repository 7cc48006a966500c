use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Who a todo belongs to. Serialized as the user id, or `"local"` for
/// entries kept in the local fallback store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Owner {
    User(String),
    #[default]
    Local,
}

impl Owner {
    pub fn is_local(&self) -> bool {
        matches!(self, Owner::Local)
    }
}

impl From<String> for Owner {
    fn from(value: String) -> Self {
        if value == "local" || value.is_empty() {
            Owner::Local
        } else {
            Owner::User(value)
        }
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        match owner {
            Owner::User(id) => id,
            Owner::Local => "local".to_string(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::User(id) => f.write_str(id),
            Owner::Local => f.write_str("local"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub task: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub todo_date: NaiveDate,
    #[serde(rename = "user_id", default)]
    pub owner: Owner,
}

impl Todo {
    pub fn is_pending_insert(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

pub const TEMP_ID_PREFIX: &str = "temp_";

/// Day buckets are calendar dates in UTC.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

// Backends hand out bigint ids; older local entries used millisecond stamps.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Int(value) => value.to_string(),
        RawId::Float(value) => format!("{value:.0}"),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub completed: u32,
    pub total: u32,
}

impl Progress {
    pub fn from_todos(todos: &[Todo]) -> Self {
        let completed = todos.iter().filter(|todo| todo.completed).count();
        Self {
            completed: completed as u32,
            total: todos.len() as u32,
        }
    }

    pub fn percentage(&self) -> u8 {
        completion_percentage(self.completed, self.total)
    }
}

/// `round(100 * completed / total)` with halves rounded up, 0 for an empty day.
pub fn completion_percentage(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = u64::from(completed.min(total));
    let total = u64::from(total);
    ((200 * completed + total) / (2 * total)) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    #[serde(rename = "user_id", default)]
    pub owner: Owner,
    pub date: NaiveDate,
    pub total_todos: u32,
    pub completed_todos: u32,
    pub completion_percentage: u8,
}

impl DailyStat {
    pub fn from_todos(owner: Owner, date: NaiveDate, todos: &[Todo]) -> Self {
        let progress = Progress::from_todos(todos);
        Self {
            owner,
            date,
            total_todos: progress.total,
            completed_todos: progress.completed,
            completion_percentage: progress.percentage(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Earliest,
    Recent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Toggle,
    Delete,
    Edit,
}

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub task: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct DayQuery {
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub date: NaiveDate,
    pub completed: u32,
    pub total: u32,
    pub percentage: u8,
}

impl ProgressResponse {
    pub fn new(date: NaiveDate, progress: Progress) -> Self {
        Self {
            date,
            completed: progress.completed,
            total: progress.total,
            percentage: progress.percentage(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DayResponse {
    pub date: NaiveDate,
    pub is_today: bool,
    pub owner: Owner,
    pub sort: SortOrder,
    pub todos: Vec<Todo>,
    pub progress: ProgressResponse,
}
