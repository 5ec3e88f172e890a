use clap::{Parser, Subcommand};
use magnetcast::config::DeliveryOrder;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "magnetcast")]
#[command(author, version, about = "Live segment feed publisher and ordered player")]
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
    /// Publish a live playlist as a feed of content identifiers
    Publish {
        /// Playlist file, or a directory to wait for one in
        #[arg(required = true)]
        path: PathBuf,

        /// Gateway host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Gateway port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Publish interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Maximum number of artifacts seeded at once
        #[arg(long)]
        max_sessions: Option<usize>,
    },

    /// Follow a feed and append its segments to a file in order
    Play {
        /// Feed URL or local feed file
        #[arg(required = true)]
        feed: String,

        /// Swarm gateway base URL (defaults to the feed URL's origin)
        #[arg(long)]
        gateway: Option<String>,

        /// Output file for the reconstructed stream
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Order in which retrieved segments are appended
        #[arg(long, value_enum)]
        order: Option<DeliveryOrder>,

        /// Extra attempts per failed retrieval
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Parse a playlist and show the segments it references
    Inspect {
        /// Playlist file to inspect
        #[arg(required = true)]
        playlist: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
