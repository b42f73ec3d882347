pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "moderator-jsonapi")]
#[command(about = "JSON:API resource server and tools for moderator fixture data")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Serve the JSON:API routes backed by fixture data")]
    Serve(commands::server::ServeArgs),

    #[command(about = "Validate a fixture file and print record counts per type")]
    Check(commands::fixture::CheckArgs),

    #[command(about = "Run a list query against fixture data and print the document")]
    Query(commands::data::QueryArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve(args) => commands::server::handle(args).await,
        Commands::Check(args) => commands::fixture::handle(args, output_format).await,
        Commands::Query(args) => commands::data::handle(args).await,
    }
}
