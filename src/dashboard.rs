use crate::models::{Owner, ProgressResponse};
use crate::progress::ProgressTracker;
use crate::store::TodoStore;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// How many day columns fit the client's viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

impl Layout {
    pub fn day_count(self) -> usize {
        match self {
            Layout::Mobile => 7,
            Layout::Tablet => 3,
            Layout::Desktop => 5,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct DashboardQuery {
    #[serde(default)]
    pub layout: Layout,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub today: NaiveDate,
    pub layout: Layout,
    pub owner: Owner,
    pub dates: Vec<NaiveDate>,
    pub today_progress: ProgressResponse,
}

pub fn visible_dates(today: NaiveDate, layout: Layout) -> Vec<NaiveDate> {
    (0..layout.day_count() as i64)
        .map(|offset| today + Duration::days(offset))
        .collect()
}

pub async fn build_dashboard<S>(
    store: &S,
    progress: &ProgressTracker,
    today: NaiveDate,
    layout: Layout,
) -> DashboardResponse
where
    S: TodoStore + Clone + 'static,
{
    let today_progress = progress.get_progress(store, today).await;
    DashboardResponse {
        today,
        layout,
        owner: store.owner(),
        dates: visible_dates(today, layout),
        today_progress: ProgressResponse::new(today, today_progress),
    }
}

/// Drops todos from days before `today` and the tracker's entries for them.
/// Store failures are logged and reported as 0.
pub async fn clear_previous_days<S: TodoStore>(
    store: &S,
    progress: &ProgressTracker,
    today: NaiveDate,
) -> usize {
    progress.prune_before(&store.owner(), today).await;
    match store.clear_before(today).await {
        Ok(removed) => {
            if removed > 0 {
                info!(owner = %store.owner(), removed, "cleared previous days");
            }
            removed
        }
        Err(err) => {
            error!(owner = %store.owner(), "clearing previous days failed: {err}");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use crate::store::LocalStore;
    use tokio::time::sleep;

    #[test]
    fn layouts_show_three_five_or_seven_days() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();
        assert_eq!(visible_dates(today, Layout::Tablet).len(), 3);
        assert_eq!(visible_dates(today, Layout::Desktop).len(), 5);
        let mobile = visible_dates(today, Layout::Mobile);
        assert_eq!(mobile.len(), 7);
        assert_eq!(mobile[0], today);
        assert_eq!(mobile[2], NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[tokio::test]
    async fn housekeeping_clears_old_todos_and_their_progress() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "percent_done_housekeeping_{}_{nanos}.json",
            std::process::id()
        ));
        let store = LocalStore::new(LocalStorage::open(path.clone()).await);
        let tracker = ProgressTracker::new();
        let today = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();
        let yesterday = today - Duration::days(1);
        store.add(yesterday, "stale").await.unwrap();
        store.add(today, "fresh").await.unwrap();
        tracker.update_progress(&store, yesterday).await;
        sleep(std::time::Duration::from_millis(300)).await;
        assert!(tracker.cached(&Owner::Local, yesterday).await.is_some());

        assert_eq!(clear_previous_days(&store, &tracker, today).await, 1);
        assert!(tracker.cached(&Owner::Local, yesterday).await.is_none());
        assert!(store.list_by_date(yesterday).await.unwrap().is_empty());
        assert_eq!(store.list_by_date(today).await.unwrap().len(), 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn layout_parses_from_query() {
        let query: DashboardQuery = serde_json::from_str(r#"{"layout":"tablet"}"#).unwrap();
        assert_eq!(query.layout, Layout::Tablet);
        let query: DashboardQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.layout, Layout::Desktop);
    }
}
