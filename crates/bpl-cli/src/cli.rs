use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bpl",
    about = "Binary property-list writer and share-destination generator",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a share-destination file that launches an app with the exported project
    Destination(DestinationArgs),
    /// Print the trailer and object table of a binary property list
    Inspect(InspectArgs),
    /// Check that re-encoding a file reproduces it byte for byte
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct DestinationArgs {
    /// TOML file with a [destination] section
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Name shown in the Share menu
    #[arg(long)]
    pub name: Option<String>,
    /// Path of the app bundle to open
    #[arg(long)]
    pub app: Option<String>,
    /// Destination UUID; a random one is generated when omitted
    #[arg(long)]
    pub uuid: Option<String>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct InspectArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub file: PathBuf,
}
