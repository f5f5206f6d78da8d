use std::fs;
use std::path::{Path, PathBuf};

use loam_constants::DEPENDENCY_DIR;
use loam_error::{MaterializeError, Result};
use loam_store::PackageStore;

/// Removes materialization output without running a materialization: the
/// store directory, and optionally a project's dependency subtree.
pub struct CleanManager;

impl CleanManager {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn clean_store(&self, project_dir: &str, debug: bool) -> Result<()> {
        let store = PackageStore::new(&PathBuf::from(project_dir));
        let store_path = store.root();

        if !store_path.exists() {
            loam_logger::info("No package store found to clean.");
            return Ok(());
        }

        if debug {
            loam_logger::debug(&format!("Cleaning store at: {:?}", store_path), debug);
        }

        loam_logger::status("Cleaning package store...");

        let store_size = self.calculate_directory_size(store_path)?;

        fs::remove_dir_all(store_path)
            .map_err(|e| MaterializeError::IoError(format!("Failed to clean store: {}", e)))?;

        let size_mb = store_size as f64 / 1024.0 / 1024.0;
        loam_logger::finish(&format!("Cleaned {:.2} MB of stored packages", size_mb));

        Ok(())
    }

    pub fn clean_node_modules(&self, project_dir: &str, debug: bool) -> Result<()> {
        let project_path = PathBuf::from(project_dir);
        let node_modules_path = project_path.join(DEPENDENCY_DIR);

        if !node_modules_path.exists() {
            loam_logger::info("No node_modules directory found to clean.");
            return Ok(());
        }

        if debug {
            loam_logger::debug(
                &format!("Cleaning node_modules at: {:?}", node_modules_path),
                debug,
            );
        }

        loam_logger::status("Cleaning node_modules...");

        let modules_size = self.calculate_directory_size(&node_modules_path)?;

        fs::remove_dir_all(&node_modules_path).map_err(|e| {
            MaterializeError::IoError(format!("Failed to clean node_modules: {}", e))
        })?;

        let size_mb = modules_size as f64 / 1024.0 / 1024.0;
        loam_logger::finish(&format!("Cleaned {:.2} MB from node_modules", size_mb));

        Ok(())
    }

    fn calculate_directory_size(&self, dir: &Path) -> Result<u64> {
        let mut total_size = 0u64;

        if dir.is_dir() {
            for entry in fs::read_dir(dir).map_err(|e| {
                MaterializeError::IoError(format!("Failed to read directory: {}", e))
            })? {
                let entry = entry.map_err(|e| {
                    MaterializeError::IoError(format!("Failed to read directory entry: {}", e))
                })?;
                let path = entry.path();

                // Links into the store must not be followed; their targets
                // are counted (or already gone) on the store side.
                let metadata = fs::symlink_metadata(&path).map_err(|e| {
                    MaterializeError::IoError(format!("Failed to read file metadata: {}", e))
                })?;

                if metadata.file_type().is_symlink() {
                    continue;
                } else if metadata.is_dir() {
                    total_size += self.calculate_directory_size(&path)?;
                } else {
                    total_size += metadata.len();
                }
            }
        }

        Ok(total_size)
    }
}

impl Default for CleanManager {
    fn default() -> Self {
        Self::new()
    }
}
