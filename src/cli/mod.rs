//! CLI module for Earshot.

mod app;
pub mod commands;
mod output;
pub mod preflight;

pub use app::App;
pub use output::Output;

use clap::{Parser, Subcommand};

/// Earshot - ask questions about long-form spoken content
///
/// Transcribes a video or recording locally, indexes the transcript, and
/// answers questions from the most relevant excerpts.
#[derive(Parser, Debug)]
#[command(name = "earshot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "EARSHOT_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Acquire, transcribe and index content into the cache
    Ingest {
        /// YouTube URL/ID, or local audio/video file path
        input: String,
    },

    /// Ask a question about one piece of content
    Ask {
        /// YouTube URL/ID, or local audio/video file path
        input: String,

        /// The question to ask
        question: String,

        /// Number of excerpts to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Search one piece of content for relevant excerpts
    Search {
        /// YouTube URL/ID, or local audio/video file path
        input: String,

        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "5")]
        limit: usize,
    },

    /// Start an interactive question session
    Chat {
        /// Content to load before the first question
        input: Option<String>,
    },

    /// List cached content
    List,

    /// Remove cached transcript and index for a content id
    Forget {
        /// Content id as shown by `earshot list`
        content_id: String,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
