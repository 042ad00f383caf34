//! Loading configuration and wiring the engine to file-backed storage.

use anyhow::{Context, Result};
use pixelplace_core::{
    CanvasEngine, CommandDispatcher, Config, FileEventLog, MemoryViewStore, TileRouter,
    ViewProjector,
};
use pixelplace_incremental::BatchPipeline;
use pixelplace_render::{FsRasterStore, RasterStore};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Resolved configuration for one invocation.
pub struct Settings {
    pub config: Config,
}

impl Settings {
    /// Read `config_path` if it exists, otherwise use defaults.
    pub fn load(config_path: &Path, data_dir: Option<&Path>) -> Result<Self> {
        let mut config = if config_path.exists() {
            Config::from_file(config_path)
                .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Config::default()
        };

        if let Some(dir) = data_dir {
            config.storage.data_dir = dir.to_path_buf();
        }
        Ok(Self { config })
    }

    pub fn raster_store(&self) -> Arc<FsRasterStore> {
        Arc::new(FsRasterStore::new(self.config.storage.raster_dir()))
    }

    /// Engine over the on-disk event log, with no listeners attached.
    pub fn open_engine(&self) -> Result<CanvasEngine> {
        let path = self.config.storage.event_log_path();
        let log = FileEventLog::open(&path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
        Ok(CanvasEngine::new(Arc::new(log), &self.config))
    }
}

/// Everything a write command needs: the engine, its listeners and the
/// command workers.
pub struct Session {
    pub engine: Arc<CanvasEngine>,
    pub views: Arc<MemoryViewStore>,
    pub store: Arc<FsRasterStore>,
    pipeline: Arc<BatchPipeline>,
    dispatcher: CommandDispatcher,
}

impl Session {
    pub fn open(settings: &Settings) -> Result<Self> {
        let config = &settings.config;
        let engine = Arc::new(settings.open_engine()?);
        let store = settings.raster_store();

        let views = Arc::new(MemoryViewStore::new());
        engine.subscribe(Arc::new(ViewProjector::new(views.clone())));

        let raster_store: Arc<dyn RasterStore> = store.clone();
        let pipeline = Arc::new(BatchPipeline::new(
            config.generation.clone(),
            engine.reconstructor().clone(),
            raster_store,
            Handle::current(),
        ));
        engine.subscribe(pipeline.clone());

        let dispatcher = CommandDispatcher::spawn(
            engine.clone(),
            TileRouter::new(config.generation.tile_size),
            config.commands.partitions,
        );

        Ok(Self {
            engine,
            views,
            store,
            pipeline,
            dispatcher,
        })
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Stop the command workers and flush every pending raster update.
    pub async fn close(self) {
        self.dispatcher.shutdown().await;
        self.pipeline.shutdown().await;
        debug!("Pipeline totals:\n{}", self.pipeline.stats().metrics);
    }
}
