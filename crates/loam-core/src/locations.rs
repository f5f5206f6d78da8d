//! Install-location resolution: one physical directory per graph node.

use std::io;
use std::path::{Path, PathBuf};

use loam_constants::{DEPENDENCY_DIR, DESCRIPTOR_NAME};
use loam_error::{MaterializeError, Result};
use loam_manifest::InstallContext;
use loam_store::PackageStore;
use loam_utils::package_key;

pub struct LocationResolver<'a> {
    ctx: &'a InstallContext,
    store: &'a PackageStore,
    debug: bool,
}

impl<'a> LocationResolver<'a> {
    #[must_use]
    pub fn new(ctx: &'a InstallContext, store: &'a PackageStore, debug: bool) -> Self {
        Self { ctx, store, debug }
    }

    /// Resolve the single physical directory that represents `node`.
    ///
    /// Calls are fully independent across nodes: a workspace package is used
    /// in place (after clearing any stale dependency subtree), anything else
    /// is copied into the store under its content hash.
    pub async fn resolve(&self, node: &str) -> Result<PathBuf> {
        let key = package_key(node);
        let raw_location = self.ctx.cache_location(key)?;
        let cache_dir = strip_descriptor_suffix(raw_location);

        if cache_dir.starts_with(self.ctx.project_dir()) {
            remove_dependency_subtree(&cache_dir).await?;
            loam_logger::debug(
                &format!("{} is a workspace package at {}", node, cache_dir.display()),
                self.debug,
            );
            return Ok(cache_dir);
        }

        // The hash is keyed by the full node id, not the package key: two
        // instances of one package can resolve to different contents.
        let hash = self.ctx.hash_for(node)?;
        self.store.ensure_copied(hash, &cache_dir, self.debug).await
    }
}

/// Cache locations point at the descriptor file; the install location is
/// its directory.
fn strip_descriptor_suffix(location: &str) -> PathBuf {
    let path = Path::new(location);
    if path.file_name().is_some_and(|name| name == DESCRIPTOR_NAME) {
        match path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => path.to_path_buf(),
        }
    } else {
        path.to_path_buf()
    }
}

/// Workspace packages keep whatever links a previous run left behind;
/// remove the subtree so the farm is rebuilt from the current graph.
async fn remove_dependency_subtree(install_dir: &Path) -> Result<()> {
    let subtree = install_dir.join(DEPENDENCY_DIR);
    match tokio::fs::remove_dir_all(&subtree).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MaterializeError::IoError(format!(
            "Failed to clear {}: {}",
            subtree.display(),
            e
        ))),
    }
}
