//! Dependency-link creation under an install location.
//!
//! Every link is relative, so a materialized tree can be moved or mounted
//! elsewhere as long as the store moves with it. Creation is
//! create-if-absent: racing against an equivalent link is not an error.

use std::io;
use std::path::{Path, PathBuf};

use loam_constants::{DEPENDENCY_DIR, EXECUTABLE_DIR};
use loam_error::{MaterializeError, Result};
use loam_utils::{relative_from, scoped_package_path};

use super::create_dir_symlink;

/// Result of one idempotent link attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// This call created the link.
    Created,
    /// An equivalent entry already resolves to the same install location -
    /// duplicate edges collapsed by peer-dependency resolution.
    AlreadyLinked,
    /// An entry exists but resolves to a different install location: an
    /// unresolved naming collision. Tolerated, reported by the caller.
    Conflict,
}

/// Dependency-link directory (`node_modules`) of an install location.
#[must_use]
pub fn dependency_dir(install_dir: &Path) -> PathBuf {
    install_dir.join(DEPENDENCY_DIR)
}

/// Executable-link directory (`node_modules/.bin`) of an install location.
#[must_use]
pub fn executable_dir(install_dir: &Path) -> PathBuf {
    dependency_dir(install_dir).join(EXECUTABLE_DIR)
}

/// Destroy and recreate the executable-link directory so no command from a
/// previous run survives.
pub async fn reset_executable_dir(install_dir: &Path) -> Result<()> {
    let bin_dir = executable_dir(install_dir);

    match tokio::fs::remove_dir_all(&bin_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(link_error(&bin_dir, &e)),
    }

    tokio::fs::create_dir_all(&bin_dir)
        .await
        .map_err(|e| link_error(&bin_dir, &e))?;
    Ok(())
}

/// Ensure `install_dir/node_modules/<dep_name>` is a relative symlink to
/// `dep_dir`, creating it if absent.
pub async fn ensure_dep_link(
    install_dir: &Path,
    dep_dir: &Path,
    dep_name: &str,
) -> Result<LinkOutcome> {
    let destination = scoped_package_path(&dependency_dir(install_dir), dep_name);

    match tokio::fs::symlink_metadata(&destination).await {
        Ok(_) => classify_existing(&destination, dep_dir).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            attempt_create(&destination, dep_dir).await
        }
        Err(e) => Err(link_error(&destination, &e)),
    }
}

async fn attempt_create(destination: &Path, dep_dir: &Path) -> Result<LinkOutcome> {
    let parent = match destination.parent() {
        Some(parent) => parent,
        None => return Err(link_error(destination, &io::Error::other("no parent directory"))),
    };

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| link_error(destination, &e))?;

    let target = relative_from(dep_dir, parent);
    match create_dir_symlink(&target, destination).await {
        Ok(()) => Ok(LinkOutcome::Created),
        // Lost a creation race; decide what we lost to.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            classify_existing(destination, dep_dir).await
        }
        Err(e) => Err(link_error(destination, &e)),
    }
}

/// An entry already occupies the destination. It is equivalent exactly when
/// it resolves, through link traversal, to the dependency's install
/// location; anything else is a collision.
async fn classify_existing(destination: &Path, dep_dir: &Path) -> Result<LinkOutcome> {
    let resolved = tokio::fs::canonicalize(destination).await;
    let expected = tokio::fs::canonicalize(dep_dir).await;

    match (resolved, expected) {
        (Ok(resolved), Ok(expected)) if resolved == expected => Ok(LinkOutcome::AlreadyLinked),
        _ => Ok(LinkOutcome::Conflict),
    }
}

fn link_error(path: &Path, err: &io::Error) -> MaterializeError {
    MaterializeError::LinkFailed(path.display().to_string(), err.to_string())
}
