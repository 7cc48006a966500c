use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/analytics", get(handlers::analytics_page))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/housekeeping", post(handlers::housekeeping))
        .route(
            "/api/days/:date/todos",
            get(handlers::list_day).post(handlers::add_todo),
        )
        .route(
            "/api/days/:date/todos/:id",
            patch(handlers::edit_todo).delete(handlers::delete_todo),
        )
        .route("/api/days/:date/todos/:id/toggle", post(handlers::toggle_todo))
        .route("/api/progress/:date", get(handlers::get_progress))
        .route("/api/analytics/weekly", get(handlers::weekly))
        .route("/api/events", get(handlers::events))
        .with_state(state)
}
