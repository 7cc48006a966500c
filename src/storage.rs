use std::{
    collections::BTreeMap,
    env,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::Mutex};
use tracing::error;

pub type Entries = BTreeMap<String, String>;

pub fn resolve_data_path() -> Result<PathBuf, std::io::Error> {
    if let Ok(path) = env::var("APP_DATA_PATH") {
        return Ok(PathBuf::from(path));
    }

    Ok(PathBuf::from("data/state.json"))
}

pub async fn load_data(path: &Path) -> Entries {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse data file: {err}");
                Entries::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Entries::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            Entries::default()
        }
    }
}

pub async fn persist_data(path: &Path, data: &Entries) -> Result<(), std::io::Error> {
    let payload = serde_json::to_vec_pretty(data).map_err(std::io::Error::other)?;
    fs::write(path, payload).await
}

/// String key/value storage backed by one JSON file, the server-side stand-in
/// for browser local storage. Every write rewrites the file under the lock.
#[derive(Clone)]
pub struct LocalStorage {
    path: PathBuf,
    entries: Arc<Mutex<Entries>>,
}

impl LocalStorage {
    pub fn new(path: PathBuf, entries: Entries) -> Self {
        Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    pub async fn open(path: PathBuf) -> Self {
        let entries = load_data(&path).await;
        Self::new(path, entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    pub async fn set_item(&self, key: &str, value: String) -> Result<(), std::io::Error> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
        .await
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), std::io::Error> {
        self.update(|entries| {
            entries.remove(key);
        })
        .await
    }

    /// Runs a read-modify-write over all entries and persists the result.
    /// The in-memory map only changes once the file write succeeds.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Entries) -> R) -> Result<R, std::io::Error> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        let result = f(&mut next);
        persist_data(&self.path, &next).await?;
        *entries = next;
        Ok(result)
    }
}
