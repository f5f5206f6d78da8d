use std::path::{Component, Path, PathBuf};

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir_exists(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Destination for a package entry under a dependency-link directory,
/// handling scoped names (`@scope/name` nests under a scope directory).
pub fn scoped_package_path(base_path: &Path, package_name: &str) -> PathBuf {
    if package_name.starts_with('@') {
        if let Some(slash_pos) = package_name.find('/') {
            let scope = &package_name[..slash_pos]; // @types
            let name = &package_name[slash_pos + 1..]; // node
            let scope_dir = base_path.join(scope);
            scope_dir.join(name)
        } else {
            base_path.join(package_name)
        }
    } else {
        base_path.join(package_name)
    }
}

/// Relative path that reaches `target` from inside `base`, used as the link
/// value for relative symlinks. Both paths must be absolute; neither is
/// resolved against the filesystem.
pub fn relative_from(target: &Path, base: &Path) -> PathBuf {
    let target_components: Vec<Component> = target.components().collect();
    let base_components: Vec<Component> = base.components().collect();

    let mut common = 0;
    while common < target_components.len()
        && common < base_components.len()
        && target_components[common] == base_components[common]
    {
        common += 1;
    }

    let mut result = PathBuf::new();
    for _ in common..base_components.len() {
        result.push("..");
    }
    for component in &target_components[common..] {
        result.push(component);
    }

    if result.as_os_str().is_empty() {
        result.push(".");
    }

    result
}
