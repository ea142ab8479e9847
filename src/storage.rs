use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

const STATS_FILE: &str = "stats.json";

/// Fallos de persistencia. Nunca detienen la reproducción.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage format error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Contadores de uso, persistidos como un único registro
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsCounters {
    pub total_tracks: u64,
    pub total_seconds: f64,
}

/// Almacenamiento basado en archivos JSON
#[derive(Debug, Clone)]
pub struct JsonStorage {
    data_dir: PathBuf,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self, PersistenceError> {
        fs::create_dir_all(&data_dir).await?;
        info!("📁 Storage inicializado en: {}", data_dir.display());
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn stats_path(&self) -> PathBuf {
        self.data_dir.join(STATS_FILE)
    }

    /// Lee los contadores. A missing file yields zeros.
    pub async fn load_stats(&self) -> Result<StatsCounters, PersistenceError> {
        match fs::read_to_string(self.stats_path()).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StatsCounters::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sobrescribe el registro completo.
    ///
    /// Goes through a temp file and a rename, so readers see either the old
    /// record or the new one, never a truncated file.
    pub async fn save_stats(&self, counters: &StatsCounters) -> Result<(), PersistenceError> {
        let path = self.stats_path();
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(counters)?;

        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
