use crate::camera::{CameraSet, Pose};
use crate::config::AnalysisOptions;
use crate::core::polygon::PolygonWithId;
use crate::core::spatial::TileKey;
use crate::coverage::{TileResult, compute_tile};
use crate::loader::{TerrainCache, TerrainProvider};
use anyhow::{Error, anyhow};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::spawn_blocking;

/// Shared cancellation switch, checked before each tile is started.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one tile computation needs, owned so it can move to a worker.
pub struct TileTask {
    pub key: TileKey,
    pub polygons: Vec<PolygonWithId>,
    pub poses: Arc<[Pose]>,
    pub cameras: Arc<CameraSet>,
    pub options: Arc<AnalysisOptions>,
}

#[derive(Debug)]
pub enum TileOutcome {
    Computed(TileResult),
    /// The provider could not deliver terrain for the tile.
    Missing { key: TileKey, error: Error },
    /// Terrain arrived but the computation failed.
    Failed { key: TileKey, error: Error },
    /// Not started because the run was cancelled.
    Cancelled { key: TileKey },
}

impl TileTask {
    /// Blocking: fetches terrain through the cache and computes the tile.
    pub fn run(self, cache: &TerrainCache, provider: &dyn TerrainProvider) -> TileOutcome {
        let tile = match cache.get_or_fetch(self.key, provider) {
            Ok(tile) => tile,
            Err(error) => return TileOutcome::Missing { key: self.key, error },
        };

        match compute_tile(&tile, &self.polygons, &self.poses, &self.cameras, &self.options) {
            Ok(result) => TileOutcome::Computed(result),
            Err(error) => TileOutcome::Failed { key: self.key, error },
        }
    }
}

/// Runs `task` on the blocking pool unless `cancel` is already set.
pub async fn dispatch(
    task: TileTask,
    cache: Arc<TerrainCache>,
    provider: Arc<dyn TerrainProvider>,
    cancel: CancelFlag,
) -> TileOutcome {
    let key = task.key;
    if cancel.is_cancelled() {
        return TileOutcome::Cancelled { key };
    }

    spawn_blocking(move || task.run(&cache, provider.as_ref()))
        .await
        .unwrap_or_else(|e| TileOutcome::Failed {
            key,
            error: anyhow!("Tile worker panicked: {e}"),
        })
}
