pub mod local;
pub mod remote;

use crate::errors::StoreError;
use crate::models::{DailyStat, Owner, Todo};
use crate::session::Session;
use chrono::NaiveDate;
use std::future::Future;

pub use local::LocalStore;
pub use remote::{RemoteClient, RemoteStore};

/// Authoritative persistence for one owner's todos.
pub trait TodoStore: Send + Sync {
    fn owner(&self) -> Owner;

    fn list_by_date(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Todo>, StoreError>> + Send;

    fn add(&self, date: NaiveDate, task: &str)
    -> impl Future<Output = Result<Todo, StoreError>> + Send;

    fn set_completed(
        &self,
        date: NaiveDate,
        id: &str,
        completed: bool,
    ) -> impl Future<Output = Result<Todo, StoreError>> + Send;

    fn edit(
        &self,
        date: NaiveDate,
        id: &str,
        task: &str,
    ) -> impl Future<Output = Result<Todo, StoreError>> + Send;

    fn delete(&self, date: NaiveDate, id: &str)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stored aggregate rows in `[start, end]`, ascending by date.
    fn daily_stats(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DailyStat>, StoreError>> + Send;

    /// Deletes todos dated before `date`; returns how many dates or rows went.
    fn clear_before(&self, date: NaiveDate)
    -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// The store an operation was routed to.
#[derive(Clone)]
pub enum Backend {
    Remote(RemoteStore),
    Local(LocalStore),
}

impl Backend {
    pub fn is_remote(&self) -> bool {
        matches!(self, Backend::Remote(_))
    }
}

impl TodoStore for Backend {
    fn owner(&self) -> Owner {
        match self {
            Backend::Remote(store) => store.owner(),
            Backend::Local(store) => store.owner(),
        }
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Todo>, StoreError> {
        match self {
            Backend::Remote(store) => store.list_by_date(date).await,
            Backend::Local(store) => store.list_by_date(date).await,
        }
    }

    async fn add(&self, date: NaiveDate, task: &str) -> Result<Todo, StoreError> {
        match self {
            Backend::Remote(store) => store.add(date, task).await,
            Backend::Local(store) => store.add(date, task).await,
        }
    }

    async fn set_completed(
        &self,
        date: NaiveDate,
        id: &str,
        completed: bool,
    ) -> Result<Todo, StoreError> {
        match self {
            Backend::Remote(store) => store.set_completed(date, id, completed).await,
            Backend::Local(store) => store.set_completed(date, id, completed).await,
        }
    }

    async fn edit(&self, date: NaiveDate, id: &str, task: &str) -> Result<Todo, StoreError> {
        match self {
            Backend::Remote(store) => store.edit(date, id, task).await,
            Backend::Local(store) => store.edit(date, id, task).await,
        }
    }

    async fn delete(&self, date: NaiveDate, id: &str) -> Result<(), StoreError> {
        match self {
            Backend::Remote(store) => store.delete(date, id).await,
            Backend::Local(store) => store.delete(date, id).await,
        }
    }

    async fn daily_stats(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStat>, StoreError> {
        match self {
            Backend::Remote(store) => store.daily_stats(start, end).await,
            Backend::Local(store) => store.daily_stats(start, end).await,
        }
    }

    async fn clear_before(&self, date: NaiveDate) -> Result<usize, StoreError> {
        match self {
            Backend::Remote(store) => store.clear_before(date).await,
            Backend::Local(store) => store.clear_before(date).await,
        }
    }
}

/// Routes each operation to the remote store when a session is present and a
/// remote endpoint is configured, and to the local store otherwise.
#[derive(Clone)]
pub struct StoreSelector {
    local: LocalStore,
    remote: Option<RemoteClient>,
}

impl StoreSelector {
    pub fn new(local: LocalStore, remote: Option<RemoteClient>) -> Self {
        Self { local, remote }
    }

    pub fn select(&self, session: Option<&Session>) -> Backend {
        match (&self.remote, session) {
            (Some(client), Some(session)) => {
                Backend::Remote(RemoteStore::new(client.clone(), session.clone()))
            }
            _ => Backend::Local(self.local.clone()),
        }
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }
}
