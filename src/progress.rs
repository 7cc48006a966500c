//! Per-date `{completed, total}` aggregation.
//!
//! Three layers answer `get_progress`: an optimistic entry written straight
//! from a caller's in-memory list, then a TTL cache filled from the
//! authoritative store, then `{0, 0}` while a refresh is scheduled. Timers are
//! keyed by (owner, date) and all of them are aborted by [`ProgressTracker::shutdown`].

use crate::models::{Owner, Progress, Todo, today_utc};
use crate::store::TodoStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

pub const TODAY_TTL: Duration = Duration::from_millis(500);
pub const OTHER_DAY_TTL: Duration = Duration::from_millis(5000);
pub const RECOMPUTE_DEBOUNCE: Duration = Duration::from_millis(100);
pub const TODAY_RECONCILE_DELAY: Duration = Duration::from_millis(300);
pub const OTHER_DAY_RECONCILE_DELAY: Duration = Duration::from_millis(500);
/// Cache entries not refreshed for this long are dropped on the next write.
pub const CACHE_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProgressKey {
    owner: Owner,
    date: NaiveDate,
}

impl ProgressKey {
    fn new(owner: Owner, date: NaiveDate) -> Self {
        Self { owner, date }
    }

    fn is_today(&self) -> bool {
        self.date == today_utc()
    }

    fn ttl(&self) -> Duration {
        if self.is_today() { TODAY_TTL } else { OTHER_DAY_TTL }
    }

    fn refresh_delay(&self) -> Duration {
        if self.is_today() { Duration::ZERO } else { RECOMPUTE_DEBOUNCE }
    }

    fn reconcile_delay(&self) -> Duration {
        if self.is_today() {
            TODAY_RECONCILE_DELAY
        } else {
            OTHER_DAY_RECONCILE_DELAY
        }
    }
}

struct CacheEntry {
    progress: Progress,
    stored_at: Instant,
}

struct OptimisticEntry {
    generation: u64,
    progress: Progress,
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

type Timers = Mutex<HashMap<ProgressKey, Timer>>;

// A finished task removes its own slot unless a newer timer replaced it.
async fn release(timers: &Timers, key: &ProgressKey, generation: u64) {
    let mut timers = timers.lock().await;
    if timers
        .get(key)
        .is_some_and(|timer| timer.generation == generation)
    {
        timers.remove(key);
    }
}

#[derive(Default)]
struct Inner {
    cache: Mutex<HashMap<ProgressKey, CacheEntry>>,
    optimistic: Mutex<HashMap<ProgressKey, OptimisticEntry>>,
    refreshes: Timers,
    reconciles: Timers,
    generation: AtomicU64,
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    async fn recompute<S: TodoStore>(&self, store: &S, key: &ProgressKey) -> Option<Progress> {
        match store.list_by_date(key.date).await {
            Ok(todos) => {
                let progress = Progress::from_todos(&todos);
                let mut cache = self.cache.lock().await;
                cache.retain(|_, entry| entry.stored_at.elapsed() < CACHE_RETENTION);
                cache.insert(
                    key.clone(),
                    CacheEntry {
                        progress,
                        stored_at: Instant::now(),
                    },
                );
                drop(cache);
                debug!(owner = %key.owner, date = %key.date, ?progress, "progress recomputed");
                Some(progress)
            }
            Err(err) => {
                warn!(owner = %key.owner, date = %key.date, "progress recompute failed: {err}");
                None
            }
        }
    }
}

/// Shared handle to the aggregator; clones see the same caches and timers.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never waits on the store. A missing or stale entry schedules a refresh.
    pub async fn get_progress<S>(&self, store: &S, date: NaiveDate) -> Progress
    where
        S: TodoStore + Clone + 'static,
    {
        let key = ProgressKey::new(store.owner(), date);
        if let Some(entry) = self.inner.optimistic.lock().await.get(&key) {
            return entry.progress;
        }

        let cached = self
            .inner
            .cache
            .lock()
            .await
            .get(&key)
            .map(|entry| (entry.progress, entry.stored_at.elapsed() < key.ttl()));

        match cached {
            Some((progress, true)) => progress,
            Some((progress, false)) => {
                self.schedule_refresh(store.clone(), key, false).await;
                progress
            }
            None => {
                self.schedule_refresh(store.clone(), key, false).await;
                Progress::default()
            }
        }
    }

    /// Today recomputes inline; other dates coalesce calls that land within
    /// [`RECOMPUTE_DEBOUNCE`] into one recompute.
    pub async fn update_progress<S>(&self, store: &S, date: NaiveDate)
    where
        S: TodoStore + Clone + 'static,
    {
        let key = ProgressKey::new(store.owner(), date);
        if key.is_today() {
            if let Some(pending) = self.inner.refreshes.lock().await.remove(&key) {
                pending.handle.abort();
            }
            self.inner.recompute(store, &key).await;
        } else {
            self.schedule_refresh(store.clone(), key, true).await;
        }
    }

    /// Records progress computed from `todos` ahead of the store catching up,
    /// then reconciles against the store after a short delay.
    pub async fn update_progress_optimistically<S>(
        &self,
        store: &S,
        date: NaiveDate,
        todos: &[Todo],
    ) -> Progress
    where
        S: TodoStore + Clone + 'static,
    {
        let key = ProgressKey::new(store.owner(), date);
        let progress = Progress::from_todos(todos);
        let generation = self.inner.next_generation();
        self.inner.optimistic.lock().await.insert(
            key.clone(),
            OptimisticEntry {
                generation,
                progress,
            },
        );

        let inner = Arc::clone(&self.inner);
        let store = store.clone();
        let task_key = key.clone();
        let delay = key.reconcile_delay();
        let mut reconciles = self.inner.reconciles.lock().await;
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            inner.recompute(&store, &task_key).await;
            {
                let mut optimistic = inner.optimistic.lock().await;
                if optimistic
                    .get(&task_key)
                    .is_some_and(|entry| entry.generation == generation)
                {
                    optimistic.remove(&task_key);
                }
            }
            release(&inner.reconciles, &task_key, generation).await;
        });

        if let Some(previous) = reconciles.insert(key, Timer { generation, handle }) {
            previous.handle.abort();
        }
        progress
    }

    /// Drops the optimistic entry and its pending reconcile.
    pub async fn discard_optimistic(&self, owner: &Owner, date: NaiveDate) {
        let key = ProgressKey::new(owner.clone(), date);
        self.inner.optimistic.lock().await.remove(&key);
        if let Some(pending) = self.inner.reconciles.lock().await.remove(&key) {
            pending.handle.abort();
        }
    }

    /// Forgets cached and optimistic entries of `owner` dated before `date`.
    pub async fn prune_before(&self, owner: &Owner, date: NaiveDate) {
        let keep = |key: &ProgressKey| key.owner != *owner || key.date >= date;
        self.inner.cache.lock().await.retain(|key, _| keep(key));
        self.inner.optimistic.lock().await.retain(|key, _| keep(key));
    }

    pub async fn cached(&self, owner: &Owner, date: NaiveDate) -> Option<Progress> {
        let key = ProgressKey::new(owner.clone(), date);
        self.inner.cache.lock().await.get(&key).map(|entry| entry.progress)
    }

    pub async fn optimistic(&self, owner: &Owner, date: NaiveDate) -> Option<Progress> {
        let key = ProgressKey::new(owner.clone(), date);
        self.inner
            .optimistic
            .lock()
            .await
            .get(&key)
            .map(|entry| entry.progress)
    }

    /// Aborts every pending refresh and reconcile timer.
    pub async fn shutdown(&self) {
        let mut aborted = 0usize;
        for (_, timer) in self.inner.refreshes.lock().await.drain() {
            timer.handle.abort();
            aborted += 1;
        }
        for (_, timer) in self.inner.reconciles.lock().await.drain() {
            timer.handle.abort();
            aborted += 1;
        }
        debug!(aborted, "progress timers stopped");
    }

    // `restart` re-arms a pending refresh (debounce); otherwise a pending
    // refresh is left to run so repeated reads cannot starve it.
    async fn schedule_refresh<S>(&self, store: S, key: ProgressKey, restart: bool)
    where
        S: TodoStore + Clone + 'static,
    {
        let mut refreshes = self.inner.refreshes.lock().await;
        if let Some(pending) = refreshes.get(&key) {
            if !pending.handle.is_finished() {
                if !restart {
                    return;
                }
                pending.handle.abort();
            }
        }

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let delay = key.refresh_delay();
        let generation = self.inner.next_generation();
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            inner.recompute(&store, &task_key).await;
            release(&inner.refreshes, &task_key, generation).await;
        });
        refreshes.insert(key, Timer { generation, handle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::models::DailyStat;
    use crate::storage::LocalStorage;
    use crate::store::LocalStore;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct CountingStore {
        inner: LocalStore,
        reads: Arc<AtomicUsize>,
    }

    impl CountingStore {
        async fn new(name: &str) -> Self {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos();
            let path = std::env::temp_dir().join(format!(
                "percent_done_progress_{name}_{}_{nanos}.json",
                std::process::id()
            ));
            Self {
                inner: LocalStore::new(LocalStorage::open(path).await),
                reads: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl TodoStore for CountingStore {
        fn owner(&self) -> Owner {
            Owner::Local
        }

        async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Todo>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.list_by_date(date).await
        }

        async fn add(&self, date: NaiveDate, task: &str) -> Result<Todo, StoreError> {
            self.inner.add(date, task).await
        }

        async fn set_completed(
            &self,
            date: NaiveDate,
            id: &str,
            completed: bool,
        ) -> Result<Todo, StoreError> {
            self.inner.set_completed(date, id, completed).await
        }

        async fn edit(&self, date: NaiveDate, id: &str, task: &str) -> Result<Todo, StoreError> {
            self.inner.edit(date, id, task).await
        }

        async fn delete(&self, date: NaiveDate, id: &str) -> Result<(), StoreError> {
            self.inner.delete(date, id).await
        }

        async fn daily_stats(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailyStat>, StoreError> {
            self.inner.daily_stats(start, end).await
        }

        async fn clear_before(&self, date: NaiveDate) -> Result<usize, StoreError> {
            self.inner.clear_before(date).await
        }
    }

    fn past_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
    }

    fn todo(task: &str, completed: bool, date: NaiveDate) -> Todo {
        Todo {
            id: format!("{task}-id"),
            task: task.to_string(),
            completed,
            created_at: Utc::now(),
            todo_date: date,
            owner: Owner::Local,
        }
    }

    #[tokio::test]
    async fn updates_within_debounce_window_recompute_once() {
        let store = CountingStore::new("debounce").await;
        let tracker = ProgressTracker::new();
        let date = past_day();
        store.add(date, "one").await.unwrap();

        tracker.update_progress(&store, date).await;
        sleep(Duration::from_millis(20)).await;
        tracker.update_progress(&store, date).await;
        sleep(Duration::from_millis(400)).await;

        assert_eq!(store.reads(), 1);
        assert_eq!(
            tracker.cached(&Owner::Local, date).await,
            Some(Progress { completed: 0, total: 1 })
        );
    }

    #[tokio::test]
    async fn today_recomputes_immediately() {
        let store = CountingStore::new("today").await;
        let tracker = ProgressTracker::new();
        let today = today_utc();
        let added = store.add(today, "one").await.unwrap();
        store.set_completed(today, &added.id, true).await.unwrap();

        tracker.update_progress(&store, today).await;
        assert_eq!(store.reads(), 1);
        assert_eq!(
            tracker.get_progress(&store, today).await,
            Progress { completed: 1, total: 1 }
        );
    }

    #[tokio::test]
    async fn missing_entry_reads_zero_then_fills_in() {
        let store = CountingStore::new("miss").await;
        let tracker = ProgressTracker::new();
        let date = past_day();
        store.add(date, "one").await.unwrap();
        store.add(date, "two").await.unwrap();

        assert_eq!(tracker.get_progress(&store, date).await, Progress::default());
        assert_eq!(tracker.get_progress(&store, date).await, Progress::default());
        sleep(Duration::from_millis(300)).await;

        assert_eq!(
            tracker.get_progress(&store, date).await,
            Progress { completed: 0, total: 2 }
        );
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn optimistic_entry_wins_until_reconciled() {
        let store = CountingStore::new("optimistic").await;
        let tracker = ProgressTracker::new();
        let today = today_utc();
        let pending = vec![todo("draft", false, today), todo("done", true, today)];

        let shown = tracker
            .update_progress_optimistically(&store, today, &pending)
            .await;
        assert_eq!(shown, Progress { completed: 1, total: 2 });
        assert_eq!(tracker.get_progress(&store, today).await, shown);

        sleep(Duration::from_millis(450)).await;
        assert_eq!(tracker.optimistic(&Owner::Local, today).await, None);
        // the store never saw those todos, so the authoritative value wins
        assert_eq!(tracker.get_progress(&store, today).await, Progress::default());
    }

    #[tokio::test]
    async fn discarded_optimistic_entry_never_reconciles() {
        let store = CountingStore::new("discard").await;
        let tracker = ProgressTracker::new();
        let date = past_day();
        tracker
            .update_progress_optimistically(&store, date, &[todo("a", false, date)])
            .await;
        tracker.discard_optimistic(&Owner::Local, date).await;

        sleep(Duration::from_millis(700)).await;
        assert_eq!(tracker.optimistic(&Owner::Local, date).await, None);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn finished_timers_release_their_slots() {
        let store = CountingStore::new("release").await;
        let tracker = ProgressTracker::new();
        let first = past_day();
        let dates: Vec<NaiveDate> = (0..50)
            .map(|offset| first + chrono::Duration::days(offset))
            .collect();

        for date in &dates {
            tracker.get_progress(&store, *date).await;
        }
        tracker
            .update_progress_optimistically(&store, first, &[todo("a", false, first)])
            .await;
        sleep(Duration::from_millis(800)).await;

        assert!(tracker.inner.refreshes.lock().await.is_empty());
        assert!(tracker.inner.reconciles.lock().await.is_empty());
        assert_eq!(tracker.inner.cache.lock().await.len(), dates.len());
    }

    #[tokio::test]
    async fn prune_before_forgets_earlier_days_of_one_owner() {
        let store = CountingStore::new("prune").await;
        let tracker = ProgressTracker::new();
        let today = today_utc();
        let other = ProgressKey::new(Owner::User("someone".into()), past_day());
        tracker.inner.cache.lock().await.insert(
            other.clone(),
            CacheEntry {
                progress: Progress::default(),
                stored_at: Instant::now(),
            },
        );

        tracker.update_progress(&store, today).await;
        tracker.get_progress(&store, past_day()).await;
        sleep(Duration::from_millis(300)).await;
        assert!(tracker.cached(&Owner::Local, past_day()).await.is_some());

        tracker.prune_before(&Owner::Local, today).await;
        assert!(tracker.cached(&Owner::Local, past_day()).await.is_none());
        assert!(tracker.cached(&Owner::Local, today).await.is_some());
        assert!(tracker.inner.cache.lock().await.contains_key(&other));
    }

    #[tokio::test(start_paused = true)]
    async fn long_idle_cache_entries_are_swept() {
        let path = std::env::temp_dir().join("percent_done_progress_sweep_unused.json");
        let store = LocalStore::new(LocalStorage::new(path, Default::default()));
        let tracker = ProgressTracker::new();
        let idle = ProgressKey::new(Owner::Local, past_day());
        tracker.inner.cache.lock().await.insert(
            idle.clone(),
            CacheEntry {
                progress: Progress::default(),
                stored_at: Instant::now(),
            },
        );

        tokio::time::advance(CACHE_RETENTION + Duration::from_secs(1)).await;
        tracker.update_progress(&store, today_utc()).await;

        let cache = tracker.inner.cache.lock().await;
        assert!(!cache.contains_key(&idle));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_timers() {
        let store = CountingStore::new("shutdown").await;
        let tracker = ProgressTracker::new();
        let date = past_day();

        tracker.update_progress(&store, date).await;
        tracker
            .update_progress_optimistically(&store, date, &[todo("a", false, date)])
            .await;
        tracker.shutdown().await;

        sleep(Duration::from_millis(700)).await;
        assert_eq!(store.reads(), 0);
    }
}
