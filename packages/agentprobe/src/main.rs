//! AgentProbe tests how well AI agents work with CLI tools.

use color_eyre::{Result, Section};
use tracing::level_filters::LevelFilter;

mod cmd;

use clap::{Parser, Subcommand};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Test how well AI agents interact with CLI tools.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario against a CLI tool and analyze the result.
    Test(cmd::test::Config),

    /// Analyze a previously saved run.
    Analyze(cmd::analyze::Config),

    /// List available scenarios.
    Scenarios(cmd::scenarios::Config),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Logs go to stderr and default to warnings only, so that reports on
    // stdout stay clean. Use `AGENTPROBE_LOG` directives to see more.
    //
    // Examples:
    // - `AGENTPROBE_LOG=debug` to log every event as it is folded
    // - `AGENTPROBE_LOG=agentprobe::runtime=trace` to log raw stream-json lines
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .pretty(),
        )
        .with(
            EnvFilter::builder()
                .with_env_var("AGENTPROBE_LOG")
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    match cli.command {
        Commands::Test(config) => cmd::test::main(config).await,
        Commands::Analyze(config) => cmd::analyze::main(config).await,
        Commands::Scenarios(config) => cmd::scenarios::main(config),
    }
    .suggestion("Set `AGENTPROBE_LOG=debug` to see what the agent and judge were doing.")
}
