use crate::errors::StoreError;
use crate::events::TodoEvent;
use crate::models::{ChangeKind, Progress, SortOrder, TEMP_ID_PREFIX, Todo, today_utc};
use crate::state::ViewContext;
use crate::store::TodoStore;
use chrono::{NaiveDate, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

pub const VALIDATION_ERROR_TTL: Duration = Duration::from_secs(3);
pub const PERSIST_ERROR_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Please enter a todo task")]
    EmptyTask,
    #[error("todo {0} is not on this day")]
    Missing(String),
    #[error("{message}")]
    Persist {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Loading,
    Ready,
}

#[derive(Debug)]
struct TransientError {
    message: String,
    expires_at: Instant,
}

/// One date's todo list as a client sees it: a snapshot that changes before
/// the store confirms, and rolls back when it does not.
pub struct DayView<S> {
    date: NaiveDate,
    store: S,
    context: ViewContext,
    todos: Vec<Todo>,
    phase: ViewPhase,
    error: Option<TransientError>,
    sort: SortOrder,
}

impl<S> DayView<S>
where
    S: TodoStore + Clone + 'static,
{
    pub fn new(date: NaiveDate, store: S, context: ViewContext) -> Self {
        Self {
            date,
            store,
            context,
            todos: Vec::new(),
            phase: ViewPhase::Loading,
            error: None,
            sort: SortOrder::default(),
        }
    }

    /// Creates the view and loads its snapshot. A failed load leaves an empty,
    /// ready view with the error set.
    pub async fn open(date: NaiveDate, store: S, context: ViewContext) -> Self {
        let mut view = Self::new(date, store, context);
        if let Err(err) = view.load().await {
            warn!(date = %date, "day view opened without data: {err}");
        }
        view
    }

    pub async fn load(&mut self) -> Result<(), ViewError> {
        self.phase = ViewPhase::Loading;
        let result = self.store.list_by_date(self.date).await;
        self.phase = ViewPhase::Ready;
        match result {
            Ok(todos) => {
                self.todos = todos;
                Ok(())
            }
            Err(source) => {
                self.set_error("Failed to load todos", PERSIST_ERROR_TTL);
                Err(ViewError::Persist {
                    message: "Failed to load todos",
                    source,
                })
            }
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn is_today(&self) -> bool {
        self.date == today_utc()
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
    }

    /// The current error message, if it has not expired yet.
    pub fn error(&self) -> Option<&str> {
        self.error
            .as_ref()
            .filter(|err| Instant::now() < err.expires_at)
            .map(|err| err.message.as_str())
    }

    pub fn progress(&self) -> Progress {
        Progress::from_todos(&self.todos)
    }

    /// Snapshot ordered by creation time per the view's sort preference.
    pub fn todos(&self) -> Vec<Todo> {
        let mut todos = self.todos.clone();
        match self.sort {
            SortOrder::Earliest => todos.sort_by_key(|todo| todo.created_at),
            SortOrder::Recent => todos.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        todos
    }

    pub async fn add(&mut self, task: &str) -> Result<Todo, ViewError> {
        let task = self.validate(task)?;
        let previous = self.todos.clone();
        let placeholder = Todo {
            id: format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4()),
            task: task.clone(),
            completed: false,
            created_at: Utc::now(),
            todo_date: self.date,
            owner: self.store.owner(),
        };
        let placeholder_id = placeholder.id.clone();
        self.todos.insert(0, placeholder);
        self.announce_optimistic().await;

        let result = self.store.add(self.date, &task).await;
        let saved = self
            .settle(previous, ChangeKind::Add, "Failed to save todo. Please try again.", result)
            .await?;
        self.replace(&placeholder_id, saved.clone());
        Ok(saved)
    }

    pub async fn toggle(&mut self, id: &str) -> Result<Todo, ViewError> {
        let index = self.position(id)?;
        let previous = self.todos.clone();
        let completed = !self.todos[index].completed;
        self.todos[index].completed = completed;
        self.announce_optimistic().await;

        let result = self.store.set_completed(self.date, id, completed).await;
        let saved = self
            .settle(previous, ChangeKind::Toggle, "Failed to update todo", result)
            .await?;
        self.replace(id, saved.clone());
        Ok(saved)
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), ViewError> {
        self.position(id)?;
        let previous = self.todos.clone();
        self.todos.retain(|todo| todo.id != id);
        self.announce_optimistic().await;

        let result = self.store.delete(self.date, id).await;
        self.settle(previous, ChangeKind::Delete, "Failed to delete todo", result)
            .await
    }

    pub async fn edit(&mut self, id: &str, task: &str) -> Result<Todo, ViewError> {
        let task = self.validate(task)?;
        let index = self.position(id)?;
        if self.todos[index].task == task {
            return Ok(self.todos[index].clone());
        }
        let previous = self.todos.clone();
        self.todos[index].task = task.clone();

        let result = self.store.edit(self.date, id, &task).await;
        let saved = self
            .settle(previous, ChangeKind::Edit, "Failed to edit todo", result)
            .await?;
        self.replace(id, saved.clone());
        Ok(saved)
    }

    /// Reacts to a notification from another view of the same owner and date.
    pub async fn apply_event(&mut self, event: &TodoEvent) {
        if event.date() != self.date || *event.owner() != self.store.owner() {
            return;
        }
        match event {
            TodoEvent::UpdatedOptimistic { todos, .. } => self.todos = todos.clone(),
            TodoEvent::Updated { .. } => {
                if let Err(err) = self.load().await {
                    error!(date = %self.date, "reload after update failed: {err}");
                }
            }
        }
    }

    fn validate(&mut self, task: &str) -> Result<String, ViewError> {
        let task = task.trim();
        if task.is_empty() {
            self.set_error(&ViewError::EmptyTask.to_string(), VALIDATION_ERROR_TTL);
            return Err(ViewError::EmptyTask);
        }
        Ok(task.to_string())
    }

    fn position(&self, id: &str) -> Result<usize, ViewError> {
        self.todos
            .iter()
            .position(|todo| todo.id == id)
            .ok_or_else(|| ViewError::Missing(id.to_string()))
    }

    fn replace(&mut self, id: &str, todo: Todo) {
        if let Some(slot) = self.todos.iter_mut().find(|existing| existing.id == id) {
            *slot = todo;
        }
    }

    fn set_error(&mut self, message: &str, ttl: Duration) {
        self.error = Some(TransientError {
            message: message.to_string(),
            expires_at: Instant::now() + ttl,
        });
    }

    async fn announce_optimistic(&self) {
        self.context
            .progress
            .update_progress_optimistically(&self.store, self.date, &self.todos)
            .await;
        self.context.events.publish(TodoEvent::UpdatedOptimistic {
            owner: self.store.owner(),
            date: self.date,
            todos: self.todos.clone(),
        });
    }

    async fn settle<T>(
        &mut self,
        previous: Vec<Todo>,
        kind: ChangeKind,
        message: &'static str,
        result: Result<T, StoreError>,
    ) -> Result<T, ViewError> {
        match result {
            Ok(value) => {
                self.error = None;
                self.context.events.publish(TodoEvent::Updated {
                    owner: self.store.owner(),
                    date: self.date,
                    kind: Some(kind),
                });
                Ok(value)
            }
            Err(source) => {
                error!(date = %self.date, ?kind, "persisting change failed: {source}");
                self.rollback(previous).await;
                self.set_error(message, PERSIST_ERROR_TTL);
                Err(ViewError::Persist { message, source })
            }
        }
    }

    // Prefer the store's view of the day; keep the pre-change snapshot if the
    // store cannot be read either.
    async fn rollback(&mut self, previous: Vec<Todo>) {
        self.todos = match self.store.list_by_date(self.date).await {
            Ok(todos) => todos,
            Err(err) => {
                warn!(date = %self.date, "reload during rollback failed: {err}");
                previous
            }
        };
        let owner = self.store.owner();
        self.context.progress.discard_optimistic(&owner, self.date).await;
        self.context.progress.update_progress(&self.store, self.date).await;
        self.context.events.publish(TodoEvent::UpdatedOptimistic {
            owner,
            date: self.date,
            todos: self.todos.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Owner;
    use crate::progress::ProgressTracker;
    use crate::events::EventBus;
    use crate::storage::LocalStorage;
    use crate::store::LocalStore;
    use tokio::time::sleep;

    async fn local_view(name: &str, date: NaiveDate) -> (DayView<LocalStore>, ViewContext) {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "percent_done_view_{name}_{}_{nanos}.json",
            std::process::id()
        ));
        let store = LocalStore::new(LocalStorage::open(path).await);
        let context = ViewContext::new(ProgressTracker::new(), EventBus::new());
        (DayView::open(date, store, context.clone()).await, context)
    }

    #[tokio::test]
    async fn optimistic_add_shows_progress_immediately() {
        let today = today_utc();
        let (mut view, context) = local_view("add", today).await;
        assert_eq!(view.phase(), ViewPhase::Ready);

        let saved = view.add("Buy milk").await.unwrap();
        assert!(!saved.is_pending_insert());
        assert_eq!(
            context.progress.get_progress(view.store(), today).await,
            Progress { completed: 0, total: 1 }
        );

        sleep(Duration::from_millis(600)).await;
        assert_eq!(context.progress.optimistic(&Owner::Local, today).await, None);
        assert_eq!(
            context.progress.get_progress(view.store(), today).await,
            Progress { completed: 0, total: 1 }
        );
    }

    #[tokio::test]
    async fn empty_task_is_rejected_before_io() {
        let (mut view, _) = local_view("empty", today_utc()).await;
        let err = view.add("   ").await.unwrap_err();
        assert!(matches!(err, ViewError::EmptyTask));
        assert_eq!(view.error(), Some("Please enter a todo task"));
        assert!(view.todos().is_empty());
        assert!(view.store().list_by_date(view.date()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggling_twice_restores_state() {
        let (mut view, _) = local_view("toggle", today_utc()).await;
        let todo = view.add("stretch").await.unwrap();
        view.add("read").await.unwrap();
        let before = view.progress();

        assert!(view.toggle(&todo.id).await.unwrap().completed);
        assert_eq!(view.progress(), Progress { completed: 1, total: 2 });
        assert!(!view.toggle(&todo.id).await.unwrap().completed);
        assert_eq!(view.progress(), before);

        let stored = view.store().list_by_date(view.date()).await.unwrap();
        assert!(stored.iter().all(|todo| !todo.completed));
    }

    #[tokio::test]
    async fn deleting_last_todo_drives_progress_to_zero() {
        let day = NaiveDate::from_ymd_opt(2020, 2, 2).unwrap();
        let (mut view, context) = local_view("delete", day).await;
        let todo = view.add("only one").await.unwrap();
        view.delete(&todo.id).await.unwrap();

        let progress = context.progress.get_progress(view.store(), day).await;
        assert_eq!(progress, Progress::default());
        assert_eq!(progress.percentage(), 0);
    }

    #[tokio::test]
    async fn edit_trims_and_persists() {
        let (mut view, _) = local_view("edit", today_utc()).await;
        let todo = view.add("draft").await.unwrap();
        let edited = view.edit(&todo.id, "  final  ").await.unwrap();
        assert_eq!(edited.task, "final");
        let stored = view.store().list_by_date(view.date()).await.unwrap();
        assert_eq!(stored[0].task, "final");
    }

    #[tokio::test]
    async fn sort_order_is_per_view() {
        let (mut view, _) = local_view("sort", today_utc()).await;
        view.add("first").await.unwrap();
        sleep(Duration::from_millis(5)).await;
        view.add("second").await.unwrap();

        assert_eq!(view.todos()[0].task, "first");
        view.set_sort(SortOrder::Recent);
        assert_eq!(view.todos()[0].task, "second");
    }

    #[tokio::test]
    async fn other_views_follow_notifications() {
        let today = today_utc();
        let (mut writer, context) = local_view("events", today).await;
        let mut reader = DayView::open(today, writer.store().clone(), context.clone()).await;
        let mut rx = context.events.subscribe();

        writer.add("shared").await.unwrap();
        let optimistic = rx.recv().await.unwrap();
        reader.apply_event(&optimistic).await;
        assert_eq!(reader.todos().len(), 1);
        assert!(reader.todos()[0].is_pending_insert());

        let confirmed = rx.recv().await.unwrap();
        reader.apply_event(&confirmed).await;
        assert_eq!(reader.todos(), writer.todos());
    }

    #[tokio::test]
    async fn unknown_ids_fail_without_touching_the_list() {
        let (mut view, _) = local_view("unknown", today_utc()).await;
        view.add("kept").await.unwrap();
        assert!(matches!(view.toggle("ghost").await, Err(ViewError::Missing(_))));
        assert!(matches!(view.delete("ghost").await, Err(ViewError::Missing(_))));
        assert_eq!(view.todos().len(), 1);
    }

    #[tokio::test]
    async fn unwritable_local_storage_rolls_the_add_back() {
        let day = NaiveDate::from_ymd_opt(2031, 1, 15).unwrap();
        let path = std::env::temp_dir()
            .join(format!("percent_done_no_such_dir_{}", std::process::id()))
            .join("state.json");
        let store = LocalStore::new(LocalStorage::new(path, Default::default()));
        let context = ViewContext::new(ProgressTracker::new(), EventBus::new());
        let mut view = DayView::open(day, store, context.clone()).await;

        let err = view.add("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            ViewError::Persist {
                source: StoreError::Storage(_),
                ..
            }
        ));
        assert!(view.todos().is_empty());
        assert!(view.store().list_by_date(day).await.unwrap().is_empty());
        assert_eq!(view.error(), Some("Failed to save todo. Please try again."));
        assert_eq!(context.progress.optimistic(&Owner::Local, day).await, None);
        context.progress.shutdown().await;
    }
}
