pub mod clean;
pub mod linker;
pub mod locations;
pub mod materialize;

pub use clean::CleanManager;
pub use materialize::{MaterializeSummary, Materializer};

use std::path::Path;

use loam_error::{MaterializeError, Result};
use loam_manifest::InstallContext;

/// Load the manifests from `project_dir` and run a full materialization.
pub fn materialize_project(project_dir: &str, host_pm: &str, debug: bool) -> Result<MaterializeSummary> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        MaterializeError::IoError(format!("Failed to create async runtime: {}", e))
    })?;

    rt.block_on(async {
        let ctx = InstallContext::load(Path::new(project_dir))?;
        let materializer = Materializer::new(ctx, host_pm, debug);
        materializer.run().await
    })
}

pub fn clean_store(project_dir: &str, debug: bool) -> Result<()> {
    let manager = CleanManager::new();
    manager.clean_store(project_dir, debug)
}

pub fn clean_node_modules(project_dir: &str, debug: bool) -> Result<()> {
    let manager = CleanManager::new();
    manager.clean_node_modules(project_dir, debug)
}
