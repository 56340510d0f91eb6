//! Persisted preferences: a small async key-value store and the home
//! location kept in it.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::StoreError, model::HomeLocation};

const HOME_LOCATION_NAME: &str = "home_location_name";
const HOME_LOCATION_LAT: &str = "home_location_lat";
const HOME_LOCATION_LON: &str = "home_location_lon";

#[async_trait]
pub trait PreferenceStore: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Writes all pairs. Stores that can do so apply them as one change.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_values<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> T {
        let mut guard = self
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.with_values(|v| v.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_values(|v| v.insert(key.to_string(), value.to_string()));
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        self.with_values(|v| {
            for (key, value) in entries {
                v.insert(key.to_string(), value.to_string());
            }
        });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.with_values(|v| v.remove(key));
        Ok(())
    }
}

/// JSON object on disk, rewritten through a temp file on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(values)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) + Send,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        f(&mut values);
        self.write_all(&values).await
    }
}

#[async_trait]
impl PreferenceStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|v| {
            v.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        self.update(|v| {
            for (key, value) in entries {
                v.insert(key.to_string(), value.to_string());
            }
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|v| {
            v.remove(key);
        })
        .await
    }
}

/// Home location persisted as three text preferences.
#[derive(Debug, Clone)]
pub struct HomeLocationStore {
    store: Arc<dyn PreferenceStore>,
}

impl HomeLocationStore {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// `None` if any of the three keys is missing.
    pub async fn load(&self) -> Result<Option<HomeLocation>, StoreError> {
        let name = self.store.get(HOME_LOCATION_NAME).await?;
        let lat = self.store.get(HOME_LOCATION_LAT).await?;
        let lon = self.store.get(HOME_LOCATION_LON).await?;

        Ok(match (name, lat, lon) {
            (Some(name), Some(lat), Some(lon)) => HomeLocation::new(name, lat, lon),
            _ => None,
        })
    }

    pub async fn save(&self, home: &HomeLocation) -> Result<(), StoreError> {
        self.store
            .set_many(&[
                (HOME_LOCATION_NAME, home.name.as_str()),
                (HOME_LOCATION_LAT, home.latitude.as_str()),
                (HOME_LOCATION_LON, home.longitude.as_str()),
            ])
            .await?;
        tracing::info!(name = %home.name, "saved home location");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        for key in [HOME_LOCATION_NAME, HOME_LOCATION_LAT, HOME_LOCATION_LON] {
            self.store.remove(key).await?;
        }
        Ok(())
    }
}
