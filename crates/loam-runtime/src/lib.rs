//! Post-install hook execution via the host package manager.

use std::path::Path;
use tokio::process::Command;

use loam_constants::POSTINSTALL_HOOK;
use loam_project::try_read_descriptor;

/// What happened to a node's post-install hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostinstallOutcome {
    /// A hook was declared and exited zero.
    Completed,
    /// A hook was declared but exited non-zero or could not be spawned.
    /// Logged and contained; never aborts the run.
    Failed,
    /// No descriptor, no scripts, or no postinstall entry.
    Skipped,
}

/// Run a node's declared post-install hook, if any, by invoking the host
/// package manager with the install location as working directory.
///
/// One package's broken hook must not block the others, so every failure
/// path here resolves to an outcome instead of an error.
pub async fn run_postinstall(
    display_name: &str,
    install_dir: &Path,
    host_pm: &str,
    debug: bool,
) -> PostinstallOutcome {
    let descriptor = match try_read_descriptor(install_dir) {
        Ok(Some(descriptor)) => descriptor,
        Ok(None) => return PostinstallOutcome::Skipped,
        Err(e) => {
            loam_logger::warn(&format!(
                "Skipping postinstall for {}: {}",
                display_name, e
            ));
            return PostinstallOutcome::Skipped;
        }
    };

    if descriptor.postinstall().is_none() {
        return PostinstallOutcome::Skipped;
    }

    loam_logger::debug(
        &format!("Running '{} {}' for {}", host_pm, POSTINSTALL_HOOK, display_name),
        debug,
    );

    let status = Command::new(host_pm)
        .arg(POSTINSTALL_HOOK)
        .current_dir(install_dir)
        .status()
        .await;

    match status {
        Ok(exit) if exit.success() => {
            loam_logger::debug(
                &format!("Postinstall completed for {}", display_name),
                debug,
            );
            PostinstallOutcome::Completed
        }
        Ok(exit) => {
            loam_logger::warn(&format!(
                "Postinstall script failed for {} with exit code: {}",
                display_name,
                exit.code().unwrap_or(-1)
            ));
            PostinstallOutcome::Failed
        }
        Err(e) => {
            loam_logger::warn(&format!(
                "Failed to execute postinstall script for {}: {}",
                display_name, e
            ));
            PostinstallOutcome::Failed
        }
    }
}
