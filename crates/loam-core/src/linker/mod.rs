pub mod bins;
pub mod farm;

pub use farm::LinkOutcome;

use std::io;
use std::path::Path;

/// Symlink to a directory (symlink on Unix, directory symlink on Windows).
pub(crate) async fn create_dir_symlink(target: &Path, dest: &Path) -> io::Result<()> {
    #[cfg(target_family = "unix")]
    tokio::fs::symlink(target, dest).await?;

    #[cfg(target_family = "windows")]
    tokio::fs::symlink_dir(target, dest).await?;

    Ok(())
}

/// Symlink to a file, for executable links.
pub(crate) async fn create_file_symlink(target: &Path, dest: &Path) -> io::Result<()> {
    #[cfg(target_family = "unix")]
    tokio::fs::symlink(target, dest).await?;

    #[cfg(target_family = "windows")]
    tokio::fs::symlink_file(target, dest).await?;

    Ok(())
}
