//! Content-addressable package store.
//!
//! One directory per distinct content hash, rooted under the project. The
//! store is destroyed and recreated at the start of every run; nothing in it
//! survives across runs.

use futures::future::join_all;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use walkdir::WalkDir;

use loam_constants::{CACHE_MARKER_PREFIX, STORE_DIR};
use loam_error::{MaterializeError, Result};

/// Hash strings can contain path separators (registry hashes sometimes
/// carry algorithm prefixes like `sha512/...`); flatten them so every hash
/// maps to a single store entry name.
#[must_use]
pub fn sanitize_hash(hash: &str) -> String {
    hash.replace(['/', '\\'], "_")
}

pub struct PackageStore {
    root: PathBuf,
    copies: Mutex<HashMap<String, Arc<OnceCell<PathBuf>>>>,
}

impl PackageStore {
    #[must_use]
    pub fn new(project_dir: &Path) -> Self {
        Self {
            root: project_dir.join(STORE_DIR),
            copies: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store directory for a hash, whether or not anything was copied there
    /// yet. A pure function of the hash.
    #[must_use]
    pub fn dir_for_hash(&self, hash: &str) -> PathBuf {
        self.root.join(sanitize_hash(hash))
    }

    /// Destroy and recreate the store root. Must complete before any other
    /// store operation; not safe to call concurrently with reads or writes.
    pub async fn reset(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(MaterializeError::StoreResetFailed(e.to_string())),
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| MaterializeError::StoreResetFailed(e.to_string()))?;

        self.copies.lock().await.clear();
        Ok(())
    }

    /// Copy `source_dir` into the store under the hash-derived path, once
    /// per hash: concurrent callers for the same hash await the first copy
    /// and share its result. A failed copy leaves the slot empty so a later
    /// caller can retry.
    pub async fn ensure_copied(
        &self,
        hash: &str,
        source_dir: &Path,
        debug: bool,
    ) -> Result<PathBuf> {
        let cell = {
            let mut copies = self.copies.lock().await;
            copies
                .entry(hash.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_try_init(|| async {
            let destination = self.dir_for_hash(hash);
            loam_logger::debug(
                &format!(
                    "Copying {} -> {}",
                    source_dir.display(),
                    destination.display()
                ),
                debug,
            );
            copy_tree(source_dir, &destination)
                .await
                .map_err(|e| MaterializeError::CopyFailed(hash.to_string(), e.to_string()))?;
            Ok(destination)
        })
        .await
        .cloned()
    }
}

/// Plain recursive file copy. Symlinks in the source are followed and their
/// contents rewritten as regular files; cache-marker files are skipped.
async fn copy_tree(source: &Path, destination: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(destination).await?;

    let files = collect_files(source).await?;

    let copy_tasks = files.into_iter().map(|rel| {
        let from = source.join(&rel);
        let to = destination.join(&rel);
        async move {
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&from, &to).await?;
            Ok::<(), io::Error>(())
        }
    });

    for result in join_all(copy_tasks).await {
        result?;
    }

    Ok(())
}

/// All copyable files under `source`, as paths relative to it.
async fn collect_files(source: &Path) -> io::Result<Vec<PathBuf>> {
    let source = source.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in WalkDir::new(&source).follow_links(true) {
            let entry = entry.map_err(io::Error::other)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with(CACHE_MARKER_PREFIX) {
                    continue;
                }
            }
            if let Ok(rel) = path.strip_prefix(&source) {
                files.push(rel.to_path_buf());
            }
        }
        Ok(files)
    })
    .await
    .map_err(io::Error::other)?
}
