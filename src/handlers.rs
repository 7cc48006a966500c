use crate::analytics::{WeeklyAnalytics, weekly_analytics};
use crate::dashboard::{DashboardQuery, DashboardResponse, build_dashboard, clear_previous_days};
use crate::day_view::DayView;
use crate::errors::AppError;
use crate::models::{
    DayQuery, DayResponse, ProgressResponse, SortOrder, TaskRequest, today_utc,
};
use crate::session::Session;
use crate::state::AppState;
use crate::store::{Backend, TodoStore};
use crate::ui::{render_analytics, render_index};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::NaiveDate;
use serde::Serialize;
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::warn;

pub async fn index() -> Html<String> {
    Html(render_index(today_utc()))
}

pub async fn analytics_page() -> Html<String> {
    Html(render_analytics(today_utc()))
}

pub async fn dashboard(
    State(state): State<AppState>,
    session: Option<Session>,
    Query(query): Query<DashboardQuery>,
) -> Json<DashboardResponse> {
    let backend = state.backend(session.as_ref());
    Json(build_dashboard(&backend, &state.context.progress, today_utc(), query.layout).await)
}

#[derive(Debug, Serialize)]
pub struct HousekeepingResponse {
    pub removed: usize,
}

pub async fn housekeeping(
    State(state): State<AppState>,
    session: Option<Session>,
) -> Json<HousekeepingResponse> {
    let backend = state.backend(session.as_ref());
    let removed = clear_previous_days(&backend, &state.context.progress, today_utc()).await;
    Json(HousekeepingResponse { removed })
}

pub async fn list_day(
    State(state): State<AppState>,
    session: Option<Session>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<DayQuery>,
) -> Result<Json<DayResponse>, AppError> {
    let view = open_view(&state, session.as_ref(), date, query.sort).await?;
    Ok(Json(day_response(&view)))
}

pub async fn add_todo(
    State(state): State<AppState>,
    session: Option<Session>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<DayQuery>,
    Json(payload): Json<TaskRequest>,
) -> Result<(StatusCode, Json<DayResponse>), AppError> {
    let mut view = open_view(&state, session.as_ref(), date, query.sort).await?;
    view.add(&payload.task).await?;
    Ok((StatusCode::CREATED, Json(day_response(&view))))
}

pub async fn toggle_todo(
    State(state): State<AppState>,
    session: Option<Session>,
    Path((date, id)): Path<(NaiveDate, String)>,
    Query(query): Query<DayQuery>,
) -> Result<Json<DayResponse>, AppError> {
    let mut view = open_view(&state, session.as_ref(), date, query.sort).await?;
    view.toggle(&id).await?;
    Ok(Json(day_response(&view)))
}

pub async fn edit_todo(
    State(state): State<AppState>,
    session: Option<Session>,
    Path((date, id)): Path<(NaiveDate, String)>,
    Query(query): Query<DayQuery>,
    Json(payload): Json<TaskRequest>,
) -> Result<Json<DayResponse>, AppError> {
    let mut view = open_view(&state, session.as_ref(), date, query.sort).await?;
    view.edit(&id, &payload.task).await?;
    Ok(Json(day_response(&view)))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    session: Option<Session>,
    Path((date, id)): Path<(NaiveDate, String)>,
    Query(query): Query<DayQuery>,
) -> Result<Json<DayResponse>, AppError> {
    let mut view = open_view(&state, session.as_ref(), date, query.sort).await?;
    view.delete(&id).await?;
    Ok(Json(day_response(&view)))
}

pub async fn get_progress(
    State(state): State<AppState>,
    session: Option<Session>,
    Path(date): Path<NaiveDate>,
) -> Json<ProgressResponse> {
    let backend = state.backend(session.as_ref());
    let progress = state.context.progress.get_progress(&backend, date).await;
    Json(ProgressResponse::new(date, progress))
}

pub async fn weekly(
    State(state): State<AppState>,
    session: Option<Session>,
) -> Result<Json<WeeklyAnalytics>, AppError> {
    let backend = state.backend(session.as_ref());
    Ok(Json(weekly_analytics(&backend).await?))
}

pub async fn events(
    State(state): State<AppState>,
    session: Option<Session>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner = state.backend(session.as_ref()).owner();
    let stream = BroadcastStream::new(state.context.events.subscribe()).filter_map(move |message| {
        match message {
            Ok(event) if *event.owner() == owner => Event::default()
                .event(event.name())
                .json_data(event.payload())
                .ok()
                .map(Ok),
            Ok(_) => None,
            Err(err) => {
                warn!("event stream fell behind: {err}");
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn open_view(
    state: &AppState,
    session: Option<&Session>,
    date: NaiveDate,
    sort: SortOrder,
) -> Result<DayView<Backend>, AppError> {
    let mut view = DayView::new(date, state.backend(session), state.context.clone());
    view.set_sort(sort);
    view.load().await?;
    Ok(view)
}

fn day_response(view: &DayView<Backend>) -> DayResponse {
    DayResponse {
        date: view.date(),
        is_today: view.is_today(),
        owner: view.store().owner(),
        sort: view.sort(),
        todos: view.todos(),
        progress: ProgressResponse::new(view.date(), view.progress()),
    }
}
