//! Two-phase materialization driver.
//!
//! Phase 1 resolves every node's install location (copying into the store
//! where needed); phase 2 rebuilds each node's dependency links, executable
//! links, and runs its post-install hook. Phase 2 never starts before all of
//! phase 1 has finished: any node's dependency may be materialized by any
//! resolution call.

use futures::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

use loam_error::{MaterializeError, Result};
use loam_manifest::InstallContext;
use loam_runtime::PostinstallOutcome;
use loam_store::PackageStore;
use loam_symcap::SystemCapabilities;
use loam_utils::display_name;

use crate::linker::farm::LinkOutcome;
use crate::linker::{bins, farm};
use crate::locations::LocationResolver;

/// Aggregated outcome of one run, for the final log line and for tests.
#[derive(Debug, Default, Clone)]
pub struct MaterializeSummary {
    pub nodes: usize,
    pub links_created: usize,
    pub links_reused: usize,
    pub link_conflicts: usize,
    pub bins_linked: usize,
    pub hooks_completed: usize,
    pub hooks_failed: usize,
}

#[derive(Debug, Default)]
struct LinkStats {
    created: usize,
    reused: usize,
    conflicts: usize,
    bins: usize,
}

impl LinkStats {
    fn absorb(&mut self, other: &LinkStats) {
        self.created += other.created;
        self.reused += other.reused;
        self.conflicts += other.conflicts;
        self.bins += other.bins;
    }
}

pub struct Materializer {
    ctx: InstallContext,
    store: PackageStore,
    host_pm: String,
    debug: bool,
}

impl Materializer {
    #[must_use]
    pub fn new(ctx: InstallContext, host_pm: &str, debug: bool) -> Self {
        let store = PackageStore::new(ctx.project_dir());
        Self {
            ctx,
            store,
            host_pm: host_pm.to_string(),
            debug,
        }
    }

    pub async fn run(&self) -> Result<MaterializeSummary> {
        // The store is rebuilt from scratch on every run, even an empty one:
        // a failed run is recovered by simply running again.
        self.store.reset().await?;

        let node_count = self.ctx.package_node_count();
        if node_count == 0 {
            loam_logger::finish("Nothing to materialize");
            return Ok(MaterializeSummary::default());
        }

        loam_logger::status(&format!(
            "Resolving install locations for {} packages...",
            node_count
        ));
        let locations = self.resolve_install_locations().await?;

        loam_logger::status(&format!("Linking {} packages...", node_count));
        let summary = self.link_all(&locations).await?;

        if summary.hooks_failed > 0 {
            loam_logger::warn(&format!(
                "{} postinstall script(s) failed; their packages are linked but may be unusable",
                summary.hooks_failed
            ));
        }
        loam_logger::finish(&format!(
            "Materialized {} packages ({} links, {} commands)",
            summary.nodes,
            summary.links_created + summary.links_reused,
            summary.bins_linked
        ));

        Ok(summary)
    }

    /// Phase 1. Nodes are fully independent; the store path is a pure
    /// function of the content hash and same-hash copies are single-flight.
    async fn resolve_install_locations(&self) -> Result<HashMap<String, PathBuf>> {
        let caps = SystemCapabilities::get();
        let semaphore = Arc::new(Semaphore::new(
            caps.copy_limit_for(self.ctx.package_node_count()),
        ));
        let locations = Arc::new(Mutex::new(HashMap::new()));
        let resolver = LocationResolver::new(&self.ctx, &self.store, self.debug);

        let tasks: Vec<_> = self
            .ctx
            .package_nodes()
            .map(|node| {
                let semaphore = Arc::clone(&semaphore);
                let locations = Arc::clone(&locations);
                let resolver = &resolver;
                async move {
                    let _permit = semaphore.acquire().await.unwrap();
                    let location = resolver.resolve(node).await?;
                    locations.lock().await.insert(node.to_string(), location);
                    Ok::<(), MaterializeError>(())
                }
            })
            .collect();

        for result in join_all(tasks).await {
            result?;
        }

        let locations = locations.lock().await;
        Ok(locations.clone())
    }

    /// Phase 2. Nodes are mutually independent; each fans out over its own
    /// dependency list. Hook processes get their own, smaller budget.
    async fn link_all(&self, locations: &HashMap<String, PathBuf>) -> Result<MaterializeSummary> {
        let caps = SystemCapabilities::get();
        let semaphore = Arc::new(Semaphore::new(caps.link_limit_for(locations.len())));
        let hook_semaphore = Arc::new(Semaphore::new(caps.optimal_parallel_hooks));

        // Executable-link directories are reset once per distinct install
        // location before any linking starts. Duplicate nodes collapsed onto
        // one location would otherwise race their reset against another
        // instance's already-created command links.
        let unique_dirs: std::collections::HashSet<&PathBuf> = locations.values().collect();
        let reset_tasks: Vec<_> = unique_dirs
            .into_iter()
            .map(|dir| farm::reset_executable_dir(dir))
            .collect();
        for result in join_all(reset_tasks).await {
            result?;
        }

        let tasks: Vec<_> = self
            .ctx
            .package_nodes()
            .map(|node| {
                let semaphore = Arc::clone(&semaphore);
                let hook_semaphore = Arc::clone(&hook_semaphore);
                async move {
                    let _permit = semaphore.acquire().await.unwrap();
                    self.link_node(node, locations, &hook_semaphore).await
                }
            })
            .collect();

        let mut summary = MaterializeSummary::default();
        for result in join_all(tasks).await {
            let (stats, hook) = result?;
            summary.nodes += 1;
            summary.links_created += stats.created;
            summary.links_reused += stats.reused;
            summary.link_conflicts += stats.conflicts;
            summary.bins_linked += stats.bins;
            match hook {
                PostinstallOutcome::Completed => summary.hooks_completed += 1,
                PostinstallOutcome::Failed => summary.hooks_failed += 1,
                PostinstallOutcome::Skipped => {}
            }
        }

        Ok(summary)
    }

    async fn link_node(
        &self,
        node: &str,
        locations: &HashMap<String, PathBuf>,
        hook_semaphore: &Semaphore,
    ) -> Result<(LinkStats, PostinstallOutcome)> {
        let install_dir = locations
            .get(node)
            .ok_or_else(|| MaterializeError::UnknownNode(node.to_string()))?;

        // Direct dependencies plus the node itself: a package's own
        // executables belong in its own executable-link directory.
        let mut targets: Vec<&str> = self
            .ctx
            .dependencies_of(node)
            .iter()
            .map(String::as_str)
            .collect();
        targets.push(node);

        let dep_tasks: Vec<_> = targets
            .into_iter()
            .map(|dep| async move { self.link_dependency(dep, install_dir, locations).await })
            .collect();

        let mut stats = LinkStats::default();
        for result in join_all(dep_tasks).await {
            stats.absorb(&result?);
        }

        let hook = {
            let _permit = hook_semaphore.acquire().await.unwrap();
            loam_runtime::run_postinstall(
                display_name(node),
                install_dir,
                &self.host_pm,
                self.debug,
            )
            .await
        };

        Ok((stats, hook))
    }

    async fn link_dependency(
        &self,
        dep: &str,
        install_dir: &Path,
        locations: &HashMap<String, PathBuf>,
    ) -> Result<LinkStats> {
        let dep_dir = locations
            .get(dep)
            .ok_or_else(|| MaterializeError::UnknownNode(dep.to_string()))?;
        let dep_name = display_name(dep);

        let mut stats = LinkStats::default();
        match farm::ensure_dep_link(install_dir, dep_dir, dep_name).await? {
            LinkOutcome::Created => {
                stats.created = 1;
                stats.bins = bins::link_bins(install_dir, dep_dir, dep_name, self.debug).await?;
            }
            LinkOutcome::AlreadyLinked => {
                // Duplicate edge collapsed onto one target; the first link
                // already brought its bins along.
                stats.reused = 1;
            }
            LinkOutcome::Conflict => {
                // Upstream peer-dependency resolution should have prevented
                // two different targets from sharing one name.
                loam_logger::warn(&format!(
                    "'{}' already points at a different package under {}, skipping {}",
                    dep_name,
                    install_dir.display(),
                    dep
                ));
                stats.conflicts = 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_constants::{GRAPH_MANIFEST, HASH_MANIFEST, LOCATION_MANIFEST};
    use serde_json::json;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _project: TempDir,
        _cache: TempDir,
        project_dir: PathBuf,
        cache_dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let project = tempdir().unwrap();
            let cache = tempdir().unwrap();
            let project_dir = fs::canonicalize(project.path()).unwrap();
            let cache_dir = fs::canonicalize(cache.path()).unwrap();
            Self {
                _project: project,
                _cache: cache,
                project_dir,
                cache_dir,
            }
        }

        fn seed_cached(&self, dir_name: &str, descriptor: &str) -> PathBuf {
            let dir = self.cache_dir.join(dir_name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("package.json"), descriptor).unwrap();
            dir
        }

        fn seed_local(&self, dir_name: &str, descriptor: &str) -> PathBuf {
            let dir = self.project_dir.join(dir_name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("package.json"), descriptor).unwrap();
            dir
        }

        fn write_manifests(
            &self,
            hashes: &[(&str, &str)],
            nodes: &[&str],
            edges: &[(&str, &str)],
            locations: &[(&str, &str, &Path)],
        ) {
            let hash_json: Vec<_> = hashes
                .iter()
                .map(|(node, hash)| json!({"node": node, "hash": hash}))
                .collect();
            let graph_json = json!({
                "nodes": nodes,
                "links": edges
                    .iter()
                    .map(|(source, target)| json!({"source": source, "target": target}))
                    .collect::<Vec<_>>(),
            });
            let map_json: Vec<_> = locations
                .iter()
                .map(|(name, version, dir)| {
                    json!({
                        "name": name,
                        "version": version,
                        "location": dir.join("package.json").to_string_lossy(),
                    })
                })
                .collect();

            fs::write(
                self.project_dir.join(HASH_MANIFEST),
                serde_json::to_string(&hash_json).unwrap(),
            )
            .unwrap();
            fs::write(
                self.project_dir.join(GRAPH_MANIFEST),
                serde_json::to_string(&graph_json).unwrap(),
            )
            .unwrap();
            fs::write(
                self.project_dir.join(LOCATION_MANIFEST),
                serde_json::to_string(&map_json).unwrap(),
            )
            .unwrap();
        }

        async fn run(&self, host_pm: &str) -> Result<MaterializeSummary> {
            let ctx = InstallContext::load(&self.project_dir).unwrap();
            Materializer::new(ctx, host_pm, false).run().await
        }

        fn store_dir(&self, hash: &str) -> PathBuf {
            PackageStore::new(&self.project_dir).dir_for_hash(hash)
        }
    }

    #[cfg(unix)]
    fn fake_pm(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-pm");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_two_package_chain() {
        let fx = Fixture::new();
        let a = fx.seed_cached("a", r#"{"name": "a", "version": "1.0.0"}"#);
        let b = fx.seed_cached("b", r#"{"name": "b", "version": "2.0.0"}"#);
        fx.write_manifests(
            &[("a@1.0.0", "h1"), ("b@2.0.0", "h2")],
            &["root", "a@1.0.0", "b@2.0.0"],
            &[("root", "a@1.0.0"), ("a@1.0.0", "b@2.0.0")],
            &[("a", "1.0.0", &a), ("b", "2.0.0", &b)],
        );

        let summary = fx.run("true").await.unwrap();

        assert_eq!(summary.nodes, 2);
        // Both cache locations are outside the project, so both live in the
        // store under their sanitized hashes.
        let a_store = fx.store_dir("h1");
        let b_store = fx.store_dir("h2");
        assert!(a_store.join("package.json").is_file());
        assert!(b_store.join("package.json").is_file());

        // A links its dependency and itself; both resolve through the farm.
        let a_modules = a_store.join("node_modules");
        assert_eq!(fs::canonicalize(a_modules.join("b")).unwrap(), b_store);
        assert_eq!(fs::canonicalize(a_modules.join("a")).unwrap(), a_store);
        assert!(a_modules.join(".bin").is_dir());

        // B got its self-link too.
        assert_eq!(
            fs::canonicalize(b_store.join("node_modules/b")).unwrap(),
            b_store
        );
        // a->b, a->a, b->b
        assert_eq!(summary.links_created, 3);
    }

    #[tokio::test]
    async fn test_workspace_package_is_not_copied() {
        let fx = Fixture::new();
        let w = fx.seed_local("packages/w", r#"{"name": "w", "version": "1.0.0"}"#);
        fs::create_dir_all(w.join("node_modules/stale")).unwrap();
        let dep = fx.seed_cached("dep", r#"{"name": "dep", "version": "1.0.0"}"#);
        fx.write_manifests(
            &[("w@1.0.0", "hw"), ("dep@1.0.0", "hd")],
            &["root", "w@1.0.0", "dep@1.0.0"],
            &[("root", "w@1.0.0"), ("w@1.0.0", "dep@1.0.0")],
            &[("w", "1.0.0", &w), ("dep", "1.0.0", &dep)],
        );

        fx.run("true").await.unwrap();

        // The workspace package was materialized in place: no store entry
        // for its hash, stale links gone, fresh links present.
        assert!(!fx.store_dir("hw").exists());
        assert!(!w.join("node_modules/stale").exists());
        assert_eq!(
            fs::canonicalize(w.join("node_modules/dep")).unwrap(),
            fx.store_dir("hd")
        );
        assert_eq!(fs::canonicalize(w.join("node_modules/w")).unwrap(), w);
    }

    #[tokio::test]
    async fn test_duplicate_nodes_share_one_store_copy() {
        let fx = Fixture::new();
        let c = fx.seed_cached("c", r#"{"name": "@scope/c", "version": "1.0.0", "bin": "run"}"#);
        fs::write(c.join("run"), "#!/usr/bin/env node\n").unwrap();
        let app = fx.seed_cached("app", r#"{"name": "app", "version": "1.0.0"}"#);
        // Peer-dependency resolution produced two instances of @scope/c with
        // identical contents; both edges collapse onto one target.
        fx.write_manifests(
            &[
                ("app@1.0.0", "ha"),
                ("@scope/c@1.0.0+x@1.0.0", "hc"),
                ("@scope/c@1.0.0+y@1.0.0", "hc"),
            ],
            &[
                "root",
                "app@1.0.0",
                "@scope/c@1.0.0+x@1.0.0",
                "@scope/c@1.0.0+y@1.0.0",
            ],
            &[
                ("root", "app@1.0.0"),
                ("app@1.0.0", "@scope/c@1.0.0+x@1.0.0"),
                ("app@1.0.0", "@scope/c@1.0.0+y@1.0.0"),
            ],
            &[("app", "1.0.0", &app), ("@scope/c", "1.0.0", &c)],
        );

        let summary = fx.run("true").await.unwrap();

        // One store directory for the shared hash, one surviving link, no
        // failure from the second attempt.
        let c_store = fx.store_dir("hc");
        let app_modules = fx.store_dir("ha").join("node_modules");
        assert_eq!(
            fs::canonicalize(app_modules.join("@scope/c")).unwrap(),
            c_store
        );
        assert_eq!(summary.link_conflicts, 0);
        assert!(summary.links_reused >= 1);

        // The string bin landed under the unscoped short name.
        assert_eq!(
            fs::canonicalize(app_modules.join(".bin/c")).unwrap(),
            c_store.join("run")
        );
    }

    #[tokio::test]
    async fn test_bin_name_collision_keeps_one_link() {
        let fx = Fixture::new();
        let jest = fx.seed_cached(
            "jest",
            r#"{"name": "jest", "version": "1.0.0", "bin": {"jest": "bin/jest.js"}}"#,
        );
        fs::create_dir_all(jest.join("bin")).unwrap();
        fs::write(jest.join("bin/jest.js"), "").unwrap();
        let jest_cli = fx.seed_cached(
            "jest-cli",
            r#"{"name": "jest-cli", "version": "1.0.0", "bin": {"jest": "bin/cli.js"}}"#,
        );
        fs::create_dir_all(jest_cli.join("bin")).unwrap();
        fs::write(jest_cli.join("bin/cli.js"), "").unwrap();
        let app = fx.seed_cached("app", r#"{"name": "app", "version": "1.0.0"}"#);
        fx.write_manifests(
            &[
                ("app@1.0.0", "ha"),
                ("jest@1.0.0", "hj"),
                ("jest-cli@1.0.0", "hjc"),
            ],
            &["root", "app@1.0.0", "jest@1.0.0", "jest-cli@1.0.0"],
            &[
                ("root", "app@1.0.0"),
                ("app@1.0.0", "jest@1.0.0"),
                ("app@1.0.0", "jest-cli@1.0.0"),
            ],
            &[
                ("app", "1.0.0", &app),
                ("jest", "1.0.0", &jest),
                ("jest-cli", "1.0.0", &jest_cli),
            ],
        );

        let summary = fx.run("true").await.unwrap();

        // Exactly one `jest` command survives; the run does not fail.
        let bin_dir = fx.store_dir("ha").join("node_modules/.bin");
        let commands: Vec<_> = fs::read_dir(&bin_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0], "jest");
        assert!(summary.bins_linked >= 1);
    }

    #[tokio::test]
    async fn test_peer_name_collision_is_tolerated() {
        let fx = Fixture::new();
        let x1 = fx.seed_cached("x1", r#"{"name": "x", "version": "1.0.0"}"#);
        let x2 = fx.seed_cached("x2", r#"{"name": "x", "version": "2.0.0"}"#);
        let app = fx.seed_cached("app", r#"{"name": "app", "version": "1.0.0"}"#);
        // Two different versions of `x` aimed at the same dependent: the
        // second link attempt finds the name taken by a different target.
        fx.write_manifests(
            &[
                ("app@1.0.0", "ha"),
                ("x@1.0.0", "h1"),
                ("x@2.0.0", "h2"),
            ],
            &["root", "app@1.0.0", "x@1.0.0", "x@2.0.0"],
            &[
                ("root", "app@1.0.0"),
                ("app@1.0.0", "x@1.0.0"),
                ("app@1.0.0", "x@2.0.0"),
            ],
            &[
                ("app", "1.0.0", &app),
                ("x", "1.0.0", &x1),
                ("x", "2.0.0", &x2),
            ],
        );

        let summary = fx.run("true").await.unwrap();

        assert_eq!(summary.link_conflicts, 1);
        let app_modules = fx.store_dir("ha").join("node_modules");
        let x_link = fs::canonicalize(app_modules.join("x")).unwrap();
        assert!(x_link == fx.store_dir("h1") || x_link == fx.store_dir("h2"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_postinstall_runs_in_install_location() {
        let fx = Fixture::new();
        let a = fx.seed_cached(
            "a",
            r#"{"name": "a", "version": "1.0.0", "scripts": {"postinstall": "node setup.js"}}"#,
        );
        fx.write_manifests(
            &[("a@1.0.0", "h1")],
            &["root", "a@1.0.0"],
            &[("root", "a@1.0.0")],
            &[("a", "1.0.0", &a)],
        );
        let pm = fake_pm(&fx.cache_dir, "pwd > ran-from.txt");

        let summary = fx.run(&pm).await.unwrap();

        assert_eq!(summary.hooks_completed, 1);
        let ran_from = fs::read_to_string(fx.store_dir("h1").join("ran-from.txt")).unwrap();
        assert_eq!(
            fs::canonicalize(ran_from.trim()).unwrap(),
            fs::canonicalize(fx.store_dir("h1")).unwrap()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_postinstall_does_not_abort_run() {
        let fx = Fixture::new();
        let bad = fx.seed_cached(
            "bad",
            r#"{"name": "bad", "version": "1.0.0", "scripts": {"postinstall": "exit 1"}}"#,
        );
        let good = fx.seed_cached("good", r#"{"name": "good", "version": "1.0.0"}"#);
        fx.write_manifests(
            &[("bad@1.0.0", "hb"), ("good@1.0.0", "hg")],
            &["root", "bad@1.0.0", "good@1.0.0"],
            &[("root", "bad@1.0.0"), ("root", "good@1.0.0")],
            &[("bad", "1.0.0", &bad), ("good", "1.0.0", &good)],
        );
        let pm = fake_pm(&fx.cache_dir, "exit 1");

        let summary = fx.run(&pm).await.unwrap();

        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.hooks_failed, 1);
        // The other package was fully materialized regardless.
        assert!(fx.store_dir("hg").join("node_modules/good").exists());
    }

    #[tokio::test]
    async fn test_missing_hash_aborts_the_run() {
        let fx = Fixture::new();
        let a = fx.seed_cached("a", r#"{"name": "a", "version": "1.0.0"}"#);
        fx.write_manifests(
            &[],
            &["root", "a@1.0.0"],
            &[("root", "a@1.0.0")],
            &[("a", "1.0.0", &a)],
        );

        let result = fx.run("true").await;

        assert!(matches!(result, Err(MaterializeError::MissingHash(_))));
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let fx = Fixture::new();
        let a = fx.seed_cached("a", r#"{"name": "a", "version": "1.0.0"}"#);
        let b = fx.seed_cached("b", r#"{"name": "b", "version": "2.0.0"}"#);
        fx.write_manifests(
            &[("a@1.0.0", "h1"), ("b@2.0.0", "h2")],
            &["root", "a@1.0.0", "b@2.0.0"],
            &[("root", "a@1.0.0"), ("a@1.0.0", "b@2.0.0")],
            &[("a", "1.0.0", &a), ("b", "2.0.0", &b)],
        );

        let first = fx.run("true").await.unwrap();
        let second = fx.run("true").await.unwrap();

        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.links_created, second.links_created);
        let a_modules = fx.store_dir("h1").join("node_modules");
        assert_eq!(
            fs::canonicalize(a_modules.join("b")).unwrap(),
            fx.store_dir("h2")
        );
    }

    #[tokio::test]
    async fn test_empty_graph_is_a_noop() {
        let fx = Fixture::new();
        fx.write_manifests(&[], &["root"], &[], &[]);

        let summary = fx.run("true").await.unwrap();

        assert_eq!(summary.nodes, 0);
        // The store root is still rebuilt, but holds nothing.
        let store = PackageStore::new(&fx.project_dir);
        assert!(store.root().is_dir());
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
    }
}
