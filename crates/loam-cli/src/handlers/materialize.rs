use anyhow::Result;
use owo_colors::OwoColorize;

pub struct MaterializeHandler;

impl MaterializeHandler {
    pub fn run(dir: &str, pm: &str, debug: bool) -> Result<()> {
        println!(
            "{} {}",
            "loam".bright_cyan().bold(),
            "materialize".bright_white()
        );
        println!();

        loam_core::materialize_project(dir, pm, debug).map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    }
}
