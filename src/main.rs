use percent_done::{
    AppState, Config, LocalStorage, router,
    store::{LocalStore, RemoteClient, StoreSelector},
};
use std::net::SocketAddr;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;
    if let Some(parent) = config.data_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let storage = LocalStorage::open(config.data_path.clone()).await;
    let remote = match &config.remote {
        Some(remote) => {
            info!("remote store enabled at {}", remote.url);
            Some(RemoteClient::new(&remote.url, &remote.anon_key)?)
        }
        None => {
            warn!("no remote store configured; every request uses local storage");
            None
        }
    };
    let state = AppState::new(StoreSelector::new(LocalStore::new(storage), remote));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
