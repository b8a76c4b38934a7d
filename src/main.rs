use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use harvester::app::AppContext;
use harvester::cli::{commands, Cli, Commands};
use harvester::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("harvester=info")))
        .init();

    let cli = Cli::parse();

    // Stop doesn't need a config or a database
    if let Commands::Stop = cli.command {
        commands::stop()?;
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Run => {
            commands::run(ctx).await?;
        }
        Commands::Status => {
            commands::status(&ctx).await?;
        }
        Commands::Auth { code } => {
            commands::auth(&ctx, &code).await?;
        }
        Commands::Poll => {
            commands::poll(&ctx).await?;
        }
        Commands::List { page, per_page } => {
            commands::list(&ctx, page, per_page)?;
        }
        Commands::Stop => {}
    }

    Ok(())
}
