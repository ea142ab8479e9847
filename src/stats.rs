use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    audio::track::Track,
    storage::{JsonStorage, StatsCounters},
};

/// Resumen para mostrar al usuario
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsReport {
    pub total_tracks: u64,
    /// Rounded to two decimals.
    pub total_hours: f64,
}

/// Contadores de uso del proceso.
///
/// The in-memory counters are authoritative. Every increment is followed by
/// a best-effort write of the whole record; a failed write is logged and the
/// next successful one catches up.
pub struct StatsAccumulator {
    counters: Mutex<StatsCounters>,
    storage: JsonStorage,
    writer: tokio::sync::Mutex<()>,
}

impl StatsAccumulator {
    /// Loads the persisted counters, starting from zero when the record is
    /// missing or unreadable.
    pub async fn load(storage: JsonStorage) -> Self {
        let counters = match storage.load_stats().await {
            Ok(counters) => {
                info!(
                    "📊 Estadísticas cargadas: {} tracks, {:.0}s",
                    counters.total_tracks, counters.total_seconds
                );
                counters
            }
            Err(e) => {
                warn!("⚠️ No se pudieron leer las estadísticas, empezando de cero: {}", e);
                StatsCounters::default()
            }
        };

        Self {
            counters: Mutex::new(counters),
            storage,
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Cuenta una reproducción y persiste el nuevo registro en segundo plano.
    ///
    /// The increment is visible as soon as this returns; the write follows it.
    pub fn record_play(self: &Arc<Self>, track: &Track) -> StatsCounters {
        let snapshot = {
            let mut counters = self.counters.lock();
            counters.total_tracks += 1;
            counters.total_seconds += track.duration().as_secs_f64();
            *counters
        };
        debug!("📊 {} tracks / {:.1}s", snapshot.total_tracks, snapshot.total_seconds);

        let this = Arc::clone(self);
        tokio::spawn(async move { this.flush().await });

        snapshot
    }

    /// Writes the latest counters.
    pub async fn flush(&self) {
        // Escrituras en serie; siempre se escribe el valor más reciente
        let _guard = self.writer.lock().await;
        let latest = *self.counters.lock();

        if let Err(e) = self.storage.save_stats(&latest).await {
            warn!("💾 No se pudieron guardar las estadísticas: {}", e);
        }
    }

    pub fn snapshot(&self) -> StatsCounters {
        *self.counters.lock()
    }

    pub fn report(&self) -> StatsReport {
        let counters = self.snapshot();
        StatsReport {
            total_tracks: counters.total_tracks,
            total_hours: round2(counters.total_seconds / 3600.0),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
