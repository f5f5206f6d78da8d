//! Resolver-produced manifests and the read-only context built from them.
//!
//! Three files are read once from the project root at the start of a run and
//! are immutable for its duration. Everything downstream receives the
//! [`InstallContext`] explicitly; nothing here is process-global.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use loam_constants::{GRAPH_MANIFEST, HASH_MANIFEST, LOCATION_MANIFEST, ROOT_NODE};
use loam_error::{MaterializeError, Result};

/// One `(node, hash)` pair from `hash.json`.
#[derive(Deserialize, Debug, Clone)]
pub struct HashEntry {
    pub node: String,
    pub hash: String,
}

/// One directed `source -> target` dependency edge.
#[derive(Deserialize, Debug, Clone)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

/// The resolved graph from `resolved_graph.json`.
#[derive(Deserialize, Debug, Default)]
pub struct ResolvedGraph {
    pub nodes: Vec<String>,
    pub links: Vec<GraphLink>,
}

/// One `(name, version, location)` triple from `map.json`; `location` points
/// at the package's descriptor file inside the cache.
#[derive(Deserialize, Debug, Clone)]
pub struct LocationEntry {
    pub name: String,
    pub version: String,
    pub location: String,
}

/// Immutable lookup state for one materialization run.
pub struct InstallContext {
    project_dir: PathBuf,
    nodes: Vec<String>,
    hashes: HashMap<String, String>,
    dependencies: HashMap<String, Vec<String>>,
    locations: HashMap<String, String>,
}

impl InstallContext {
    /// Read the three manifests from `project_dir` and build the context.
    /// The project directory is canonicalized so descendant checks against
    /// cache locations compare real paths.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let project_dir = fs::canonicalize(project_dir)
            .map_err(|e| MaterializeError::IoError(format!(
                "Cannot resolve project directory {}: {}",
                project_dir.display(),
                e
            )))?;

        let hash_entries: Vec<HashEntry> = read_manifest(&project_dir, HASH_MANIFEST)?;
        let graph: ResolvedGraph = read_manifest(&project_dir, GRAPH_MANIFEST)?;
        let location_entries: Vec<LocationEntry> = read_manifest(&project_dir, LOCATION_MANIFEST)?;

        Ok(Self::from_parts(
            &project_dir,
            hash_entries,
            graph,
            location_entries,
        ))
    }

    /// Build a context from already-parsed manifests.
    pub fn from_parts(
        project_dir: &Path,
        hash_entries: Vec<HashEntry>,
        graph: ResolvedGraph,
        location_entries: Vec<LocationEntry>,
    ) -> Self {
        let hashes = hash_entries
            .into_iter()
            .map(|entry| (entry.node, entry.hash))
            .collect();

        let mut dependencies: HashMap<String, Vec<String>> = graph
            .nodes
            .iter()
            .map(|node| (node.clone(), Vec::new()))
            .collect();
        for link in graph.links {
            // Edges whose source is not a declared node are resolver noise.
            if let Some(targets) = dependencies.get_mut(&link.source) {
                targets.push(link.target);
            }
        }

        let locations = location_entries
            .into_iter()
            .map(|entry| {
                let key = format!("{}@{}", entry.name, entry.version);
                (key, entry.location)
            })
            .collect();

        Self {
            project_dir: project_dir.to_path_buf(),
            nodes: graph.nodes,
            hashes,
            dependencies,
            locations,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// All graph nodes except the reserved root, which is never materialized.
    pub fn package_nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .map(String::as_str)
            .filter(|node| *node != ROOT_NODE)
    }

    pub fn package_node_count(&self) -> usize {
        self.package_nodes().count()
    }

    /// Content hash for a node, keyed by the full node identifier: duplicate
    /// instances of one package key can carry different hashes.
    pub fn hash_for(&self, node: &str) -> Result<&str> {
        self.hashes
            .get(node)
            .map(String::as_str)
            .ok_or_else(|| MaterializeError::MissingHash(node.to_string()))
    }

    /// Direct dependencies of a node. Nodes without outgoing edges yield an
    /// empty slice.
    pub fn dependencies_of(&self, node: &str) -> &[String] {
        self.dependencies
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Cache location for a package key (`name@version`).
    pub fn cache_location(&self, package_key: &str) -> Result<&str> {
        self.locations
            .get(package_key)
            .map(String::as_str)
            .ok_or_else(|| MaterializeError::MissingLocation(package_key.to_string()))
    }
}

fn read_manifest<T: DeserializeOwned>(project_dir: &Path, name: &str) -> Result<T> {
    let path = project_dir.join(name);
    let content = fs::read_to_string(&path)
        .map_err(|e| MaterializeError::ManifestError(name.to_string(), e.to_string()))?;
    serde_json::from_str(&content)
        .map_err(|e| MaterializeError::ManifestError(name.to_string(), e.to_string()))
}
