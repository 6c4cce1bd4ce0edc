use std::error::Error;

use clap::{Parser, Subcommand};

use genebin::utils::cli::storeinfo::{storeinfo, StoreInfoArgs};
use genebin::utils::cli::storequery::{storequery, StoreQueryArgs};

#[derive(Clone, Debug, PartialEq, Subcommand)]
#[command(version)]
enum SubCommands {
    #[command(name = "info", version)]
    Info {
        #[command(flatten)]
        args: StoreInfoArgs,
    },
    #[command(name = "query", version)]
    Query {
        #[command(flatten)]
        args: StoreQueryArgs,
    },
}

#[derive(Debug, Parser)]
#[command(about = "Genebin", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: SubCommands,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        SubCommands::Info { args } => storeinfo(args),
        SubCommands::Query { args } => storequery(args),
    }
}
