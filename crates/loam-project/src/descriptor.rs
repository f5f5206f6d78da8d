use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use loam_constants::DESCRIPTOR_NAME;
use loam_utils::short_name;

/// The `bin` field of a package descriptor: either one relative script path,
/// or a mapping from command name to relative script path.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum BinField {
    Single(String),
    Table(IndexMap<String, String>),
}

/// A package descriptor (`package.json`), read from an install location on
/// demand. Only `bin` and `scripts` drive materialization; everything else
/// is carried opaquely.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct PackageDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<BinField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<IndexMap<String, String>>,
    // Catch-all for other fields to preserve them
    #[serde(flatten)]
    pub other: IndexMap<String, serde_json::Value>,
}

impl PackageDescriptor {
    /// The declared post-install command, if any.
    #[must_use]
    pub fn postinstall(&self) -> Option<&str> {
        self.scripts
            .as_ref()
            .and_then(|scripts| scripts.get(loam_constants::POSTINSTALL_HOOK))
            .map(String::as_str)
    }

    /// Normalize the `bin` field into a command-name -> script-path mapping.
    ///
    /// A bare string exposes one command named after the package's unscoped
    /// short name (`@scope/tool` exposes `tool`); an absent field exposes
    /// nothing; a table is used as-is.
    #[must_use]
    pub fn normalized_bins(&self, package_name: &str) -> IndexMap<String, String> {
        match &self.bin {
            Some(BinField::Single(script)) => {
                let mut bins = IndexMap::new();
                bins.insert(short_name(package_name).to_string(), script.clone());
                bins
            }
            Some(BinField::Table(table)) => table.clone(),
            None => IndexMap::new(),
        }
    }
}

/// Read the descriptor that must exist inside `install_dir`.
pub fn read_descriptor(install_dir: &Path) -> anyhow::Result<PackageDescriptor> {
    let path = install_dir.join(DESCRIPTOR_NAME);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: PackageDescriptor = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(parsed)
}

/// Read the descriptor if present. A missing file is `Ok(None)`; anything
/// else that goes wrong is an error.
pub fn try_read_descriptor(install_dir: &Path) -> anyhow::Result<Option<PackageDescriptor>> {
    let path = install_dir.join(DESCRIPTOR_NAME);
    if !path.exists() {
        return Ok(None);
    }
    read_descriptor(install_dir).map(Some)
}
