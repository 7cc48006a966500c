use crate::models::{ChangeKind, Owner, Todo};
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 256;

/// Fire-and-forget notification that a date's todos changed.
#[derive(Debug, Clone, PartialEq)]
pub enum TodoEvent {
    Updated {
        owner: Owner,
        date: NaiveDate,
        kind: Option<ChangeKind>,
    },
    UpdatedOptimistic {
        owner: Owner,
        date: NaiveDate,
        todos: Vec<Todo>,
    },
}

impl TodoEvent {
    pub fn owner(&self) -> &Owner {
        match self {
            TodoEvent::Updated { owner, .. } | TodoEvent::UpdatedOptimistic { owner, .. } => owner,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            TodoEvent::Updated { date, .. } | TodoEvent::UpdatedOptimistic { date, .. } => *date,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TodoEvent::Updated { .. } => "todoUpdated",
            TodoEvent::UpdatedOptimistic { .. } => "todoUpdatedOptimistic",
        }
    }

    /// Wire payload without the owner.
    pub fn payload(&self) -> EventPayload<'_> {
        match self {
            TodoEvent::Updated { date, kind, .. } => EventPayload {
                date: *date,
                kind: *kind,
                todos: None,
            },
            TodoEvent::UpdatedOptimistic { date, todos, .. } => EventPayload {
                date: *date,
                kind: None,
                todos: Some(todos),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventPayload<'a> {
    pub date: NaiveDate,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChangeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todos: Option<&'a [Todo]>,
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TodoEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: TodoEvent) {
        if let Err(err) = self.tx.send(event) {
            trace!("no listeners for {}", err.0.name());
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TodoEvent> {
        self.tx.subscribe()
    }
}
