//! Executable ("bin") links under a dependent's executable-link directory.

use std::io;
use std::path::Path;

use loam_error::{MaterializeError, Result};
use loam_project::read_descriptor;
use loam_utils::relative_from;

use super::create_file_symlink;
use super::farm::executable_dir;

/// Link every command exposed by the dependency at `dep_dir` into
/// `install_dir`'s executable-link directory, returning how many links this
/// call created.
///
/// Colliding command names are assumed equivalent or mutually forwarding
/// (jest and jest-cli both expose `jest`): the first attempt wins and later
/// ones are skipped without error, which also makes concurrent linking of
/// one node's dependencies safe.
pub async fn link_bins(
    install_dir: &Path,
    dep_dir: &Path,
    dep_name: &str,
    debug: bool,
) -> Result<usize> {
    let descriptor = read_descriptor(dep_dir).map_err(|e| {
        MaterializeError::DescriptorError(dep_dir.display().to_string(), e.to_string())
    })?;

    let bins = descriptor.normalized_bins(dep_name);
    if bins.is_empty() {
        return Ok(0);
    }

    let bin_dir = executable_dir(install_dir);
    let mut created = 0;

    for (command, script) in &bins {
        let destination = bin_dir.join(command);
        let target = relative_from(&dep_dir.join(script), &bin_dir);

        match create_file_symlink(&target, &destination).await {
            Ok(()) => created += 1,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                loam_logger::debug(
                    &format!(
                        "Command '{}' already provided, skipping the one from {}",
                        command, dep_name
                    ),
                    debug,
                );
            }
            Err(e) => {
                return Err(MaterializeError::LinkFailed(
                    destination.display().to_string(),
                    e.to_string(),
                ));
            }
        }
    }

    Ok(created)
}
