pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Adaptive channel harvester", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/harvester/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the harvester until interrupted
    Run,
    /// Stop the running harvester
    Stop,
    /// Show process, session and storage status
    Status,
    /// Complete authentication with the code delivered to the account
    Auth {
        /// Verification code
        code: String,
    },
    /// Run a single ingestion cycle from the stored cursor
    Poll,
    /// List stored messages, newest first
    List {
        /// Page number (starting at 1)
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Messages per page
        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_defaults() {
        let cli = Cli::try_parse_from(["harvester", "list"]).unwrap();
        assert!(cli.config.is_none());
        assert!(matches!(cli.command, Commands::List { page: 1, per_page: 20 }));
    }

    #[test]
    fn test_parse_global_config_and_auth() {
        let cli =
            Cli::try_parse_from(["harvester", "auth", "12345", "--config", "/tmp/h.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
        match cli.command {
            Commands::Auth { code } => assert_eq!(code, "12345"),
            _ => panic!("expected auth"),
        }
    }

    #[test]
    fn test_auth_requires_code() {
        assert!(Cli::try_parse_from(["harvester", "auth"]).is_err());
    }
}
