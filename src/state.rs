use crate::events::EventBus;
use crate::progress::ProgressTracker;
use crate::session::Session;
use crate::store::{Backend, StoreSelector};

/// Application-wide collaborators every day view works through.
#[derive(Clone)]
pub struct ViewContext {
    pub progress: ProgressTracker,
    pub events: EventBus,
}

impl ViewContext {
    pub fn new(progress: ProgressTracker, events: EventBus) -> Self {
        Self { progress, events }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub stores: StoreSelector,
    pub context: ViewContext,
}

impl AppState {
    pub fn new(stores: StoreSelector) -> Self {
        Self {
            stores,
            context: ViewContext::new(ProgressTracker::new(), EventBus::new()),
        }
    }

    pub fn backend(&self, session: Option<&Session>) -> Backend {
        self.stores.select(session)
    }

    pub async fn shutdown(&self) {
        self.context.progress.shutdown().await;
    }
}
