//! jarjar CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use jarjar_cli::cmd;
use jarjar_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { build, out } => cmd::plan::plan(&build, out.as_deref()),
        Commands::Pack {
            build,
            input,
            output,
        } => cmd::pack::pack(&build, input.as_deref(), &output),
        Commands::Inspect { jar, json } => cmd::inspect::inspect(&jar, json),
        Commands::Select { jars, policy, json } => cmd::select::select(&jars, policy, json),
        Commands::Extract {
            jars,
            cache,
            policy,
        } => cmd::extract::extract(&jars, cache, policy).await,
    }
}
