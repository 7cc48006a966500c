pub mod analytics;
pub mod app;
pub mod config;
pub mod dashboard;
pub mod day_view;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod progress;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::{LocalStorage, load_data, resolve_data_path};
