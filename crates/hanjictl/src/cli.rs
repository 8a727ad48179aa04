use clap::{Parser, Subcommand};

use crate::commands;

/// Hanji CLI - run the 憨吉 LINE webhook bot
#[derive(Parser, Debug)]
#[command(name = "hanjictl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the webhook server
    Serve {
        /// Configuration file (YAML)
        #[arg(short, long, env = "HANJI_CONFIG")]
        config: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: commands::completion::Shell,
    },
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Serve { config, port, host } => {
                commands::serve::execute(config.as_deref(), port, host.as_deref()).await
            }
            Commands::Completion { shell } => commands::completion::execute(shell),
        }
    }
}
