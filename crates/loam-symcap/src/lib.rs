use std::sync::OnceLock;

/// Probed machine capabilities, used to size the materializer's fan-out.
///
/// The link and copy phases are I/O bound and tolerate wide fan-out, but an
/// unbounded one exhausts file descriptors on large graphs; hook processes
/// are full child processes and get a much smaller budget.
#[derive(Debug, Clone)]
pub struct SystemCapabilities {
    pub cpu_cores: usize,
    pub logical_cores: usize,
    pub available_memory_gb: f64,
    pub optimal_parallel_copies: usize,
    pub optimal_parallel_links: usize,
    pub optimal_parallel_hooks: usize,
}

static SYSTEM_CAPS: OnceLock<SystemCapabilities> = OnceLock::new();

impl SystemCapabilities {
    pub fn get() -> &'static SystemCapabilities {
        SYSTEM_CAPS.get_or_init(|| {
            let cpu_cores = num_cpus::get_physical();
            let logical_cores = num_cpus::get();

            let available_memory_gb = Self::get_available_memory();

            let optimal_parallel_copies = (logical_cores * 4).min(32).max(8);
            let optimal_parallel_links = (logical_cores * 8).min(64).max(16);
            let optimal_parallel_hooks = cpu_cores.min(8).max(2);

            SystemCapabilities {
                cpu_cores,
                logical_cores,
                available_memory_gb,
                optimal_parallel_copies,
                optimal_parallel_links,
                optimal_parallel_hooks,
            }
        })
    }

    fn get_available_memory() -> f64 {
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
                for line in meminfo.lines() {
                    if line.starts_with("MemAvailable:") {
                        if let Some(kb_str) = line.split_whitespace().nth(1) {
                            if let Ok(kb) = kb_str.parse::<u64>() {
                                let gb = (kb as f64) / (1024.0 * 1024.0);
                                return (gb * 0.5).max(2.0).min(32.0);
                            }
                        }
                    }
                }
            }
            4.0 // Fallback for Unix
        }
        #[cfg(target_os = "windows")]
        {
            8.0 // Fallback for Windows
        }
    }

    /// Copy fan-out shrinks on memory-starved machines; each in-flight copy
    /// holds open file handles and kernel buffers.
    pub fn copy_limit_for(&self, package_count: usize) -> usize {
        let limit = if self.available_memory_gb > 8.0 {
            self.optimal_parallel_copies
        } else {
            self.optimal_parallel_copies / 2
        };
        limit.max(1).min(package_count.max(1))
    }

    pub fn link_limit_for(&self, node_count: usize) -> usize {
        self.optimal_parallel_links.max(1).min(node_count.max(1))
    }
}
