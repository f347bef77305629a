use clap::{Parser, Subcommand};
use mediashift_common::ConversionDirection;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediashift")]
#[command(author, version, about = "Media storage migration tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert the media of the given items to another storage
    Convert {
        /// Target storage: "external" or "inline"
        #[arg(long)]
        to: ConversionDirection,

        /// Also convert every descendant of each item
        #[arg(short, long)]
        recursive: bool,

        /// Database the items live in
        #[arg(long, default_value = "master")]
        database: String,

        /// Account to run the conversion as
        #[arg(long, default_value = "admin")]
        principal: String,

        /// Print the batch summary as JSON
        #[arg(long)]
        json: bool,

        /// Item ids to convert
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Show how media content is currently stored
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove stored blobs no media field references
    CleanBlobs,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
