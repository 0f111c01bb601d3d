//! List available scenarios.

use clap::Args;
use color_eyre::eyre::Result;
use color_print::cprintln;

use agentprobe::Scenarios;

use super::ScenarioArgs;

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Only list scenarios for this tool.
    pub tool: Option<String>,

    #[command(flatten)]
    pub scenarios: ScenarioArgs,
}

pub fn main(config: Config) -> Result<()> {
    let scenarios = Scenarios::new(&config.scenarios.dir);
    let ids = scenarios.list(config.tool.as_deref());
    if ids.is_empty() {
        cprintln!("<dim>No scenarios found in {}</dim>", scenarios.root().display());
        return Ok(());
    }

    for id in ids {
        println!("{id}");
    }
    Ok(())
}
