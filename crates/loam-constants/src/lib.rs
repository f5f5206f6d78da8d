pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = "Materializes a resolved dependency graph into a node_modules tree";
pub const BIN_NAME: &str = "loam";

/// Content-addressable store directory, created under the project root and
/// rebuilt from scratch on every run.
pub const STORE_DIR: &str = ".loam-store";

// Manifest files produced by the upstream resolver, read from the project root.
pub const HASH_MANIFEST: &str = "hash.json";
pub const GRAPH_MANIFEST: &str = "resolved_graph.json";
pub const LOCATION_MANIFEST: &str = "map.json";

/// Package descriptor file name; cache locations in the location manifest
/// point at this file inside each cached package.
pub const DESCRIPTOR_NAME: &str = "package.json";

/// Dependency-link directory created under every install location.
pub const DEPENDENCY_DIR: &str = "node_modules";

/// Executable-link directory, nested under the dependency-link directory.
pub const EXECUTABLE_DIR: &str = ".bin";

/// Files with this name prefix are cache bookkeeping, never package content,
/// and are skipped when copying a package into the store.
pub const CACHE_MARKER_PREFIX: &str = ".yarn-";

/// Reserved graph node naming the project itself. Never materialized.
pub const ROOT_NODE: &str = "root";

/// Separator between a node's package key and the disambiguation suffix
/// appended by peer-dependency resolution.
pub const NODE_SUFFIX_DELIMITER: char = '+';

/// Package manager invoked for post-install hooks unless overridden.
pub const DEFAULT_HOST_PM: &str = "yarn";

/// Hook name passed to the host package manager after a node is linked.
pub const POSTINSTALL_HOOK: &str = "postinstall";
