use anyhow::Result;

pub struct CleanHandler;

impl CleanHandler {
    pub fn run(dir: &str, links: bool, debug: bool) -> Result<()> {
        loam_core::clean_store(dir, debug).map_err(|e| anyhow::anyhow!(e))?;

        if links {
            loam_core::clean_node_modules(dir, debug).map_err(|e| anyhow::anyhow!(e))?;
        }

        Ok(())
    }
}
