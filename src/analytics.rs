use crate::errors::StoreError;
use crate::models::{DailyStat, completion_percentage, today_utc};
use crate::store::TodoStore;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub day_name: String,
    pub total_todos: u32,
    pub completed_todos: u32,
    pub completion_percentage: u8,
    pub is_today: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub active_days: u8,
    pub total_todos: u32,
    pub completed_todos: u32,
    pub average_completion: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyAnalytics {
    pub days: Vec<DayPoint>,
    pub summary: WeeklySummary,
}

pub async fn weekly_analytics<S: TodoStore>(store: &S) -> Result<WeeklyAnalytics, StoreError> {
    weekly_analytics_at(store, today_utc()).await
}

/// Stored rows fill the past six days; today is counted from the live list.
pub async fn weekly_analytics_at<S: TodoStore>(
    store: &S,
    today: NaiveDate,
) -> Result<WeeklyAnalytics, StoreError> {
    let start = today - Duration::days(WINDOW_DAYS - 1);
    let mut stats = store.daily_stats(start, today).await?;
    let todos = store.list_by_date(today).await?;
    stats.retain(|stat| stat.date != today);
    stats.push(DailyStat::from_todos(store.owner(), today, &todos));
    Ok(build_weekly_at(today, &stats))
}

pub fn build_weekly_at(today: NaiveDate, stats: &[DailyStat]) -> WeeklyAnalytics {
    let mut days = Vec::with_capacity(WINDOW_DAYS as usize);
    let mut summary = WeeklySummary::default();

    for offset in (0..WINDOW_DAYS).rev() {
        let date = today - Duration::days(offset);
        let (total, completed) = stats
            .iter()
            .find(|stat| stat.date == date)
            .map(|stat| (stat.total_todos, stat.completed_todos.min(stat.total_todos)))
            .unwrap_or_default();

        if total > 0 {
            summary.active_days += 1;
            summary.total_todos = summary.total_todos.saturating_add(total);
            summary.completed_todos = summary.completed_todos.saturating_add(completed);
        }

        days.push(DayPoint {
            date,
            day_name: date.format("%a").to_string(),
            total_todos: total,
            completed_todos: completed,
            completion_percentage: completion_percentage(completed, total),
            is_today: date == today,
        });
    }

    summary.average_completion = completion_percentage(summary.completed_todos, summary.total_todos);
    WeeklyAnalytics { days, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Owner;

    fn stat(date: NaiveDate, total: u32, completed: u32) -> DailyStat {
        DailyStat {
            owner: Owner::Local,
            date,
            total_todos: total,
            completed_todos: completed,
            completion_percentage: completion_percentage(completed, total),
        }
    }

    #[test]
    fn week_ends_today_in_ascending_order() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let week = build_weekly_at(today, &[]);
        assert_eq!(week.days.len(), 7);
        assert_eq!(week.days[0].date, today - Duration::days(6));
        assert_eq!(week.days[6].date, today);
        assert!(week.days[6].is_today);
        assert_eq!(week.days[6].day_name, "Mon");
        assert!(week.days.iter().all(|day| day.total_todos == 0 && day.completion_percentage == 0));
        assert_eq!(week.summary.average_completion, 0);
    }

    #[test]
    fn two_of_three_shows_sixty_seven_percent() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let day = today - Duration::days(2);
        let week = build_weekly_at(today, &[stat(day, 3, 2)]);
        let point = week.days.iter().find(|point| point.date == day).expect("missing day");
        assert_eq!(point.completion_percentage, 67);
        assert_eq!(point.completed_todos, 2);
    }

    #[test]
    fn summary_counts_active_days_only() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let stats = [
            stat(today, 4, 4),
            stat(today - Duration::days(1), 4, 0),
            stat(today - Duration::days(3), 0, 0),
            stat(today - Duration::days(30), 10, 10),
        ];
        let week = build_weekly_at(today, &stats);
        assert_eq!(week.summary.active_days, 2);
        assert_eq!(week.summary.total_todos, 8);
        assert_eq!(week.summary.completed_todos, 4);
        assert_eq!(week.summary.average_completion, 50);
    }
}
