mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "symbol_graph=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Order {
            root,
            config,
            format,
        } => {
            cli::print_order(&root, config.as_ref(), format)?;
        }
        Commands::Show {
            root,
            name,
            language,
            config,
        } => {
            cli::show_symbol(&root, &name, language.as_deref(), config.as_ref())?;
        }
        Commands::Map { root, config } => {
            cli::print_map(&root, config.as_ref())?;
        }
        Commands::Stats { root, config } => {
            cli::print_stats(&root, config.as_ref())?;
        }
    }

    Ok(())
}
