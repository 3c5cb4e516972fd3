//! Engine-wide context passed explicitly to render passes.

use std::path::PathBuf;
use std::sync::Arc;

use worlds_core::AssetDb;
use worlds_jobs::{JobSystem, JobSystemConfig};
use worlds_resources::{HeadlessUploader, ResourceTables, TextureUploader};

/// Configuration for building an [`EngineContext`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Directory assets are read from. `None` means memory-only.
    pub asset_root: Option<PathBuf>,
    /// Job system settings.
    pub jobs: JobSystemConfig,
}

/// Shared engine services: the job system, asset database and slot tables.
#[derive(Clone, Debug)]
pub struct EngineContext {
    pub jobs: Arc<JobSystem>,
    pub assets: Arc<AssetDb>,
    pub resources: ResourceTables,
}

impl EngineContext {
    /// Build a context uploading through `uploader`.
    pub fn new(
        config: EngineConfig,
        uploader: Arc<dyn TextureUploader>,
    ) -> worlds_jobs::Result<Self> {
        let assets = Arc::new(
            config
                .asset_root
                .map_or_else(AssetDb::in_memory, AssetDb::new),
        );
        let jobs = Arc::new(JobSystem::new(config.jobs)?);
        let resources = ResourceTables::new(&assets, &jobs, &uploader);

        Ok(Self {
            jobs,
            assets,
            resources,
        })
    }

    /// Build a context with a [`HeadlessUploader`].
    pub fn headless(config: EngineConfig) -> worlds_jobs::Result<Self> {
        Self::new(config, Arc::new(HeadlessUploader::new()))
    }
}
