pub mod commands;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "recipe-import")]
#[command(about = "Recipe import and search service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long, env = "HOST")]
        host: Option<String>,
    },

    /// Run database migrations
    Migrate,

    /// Submit a repository for import
    Import {
        /// GitHub repository, `owner/repo`, recipe document URL or local path
        repository_url: String,

        /// Recorded as the batch creator
        #[arg(long)]
        created_by: Option<String>,

        /// Poll until the batch completes or fails
        #[arg(short, long)]
        wait: bool,
    },

    /// Show the status of an import batch
    Status {
        /// Batch ID
        batch_id: Uuid,

        /// Keep polling until the batch completes or fails
        #[arg(short, long)]
        watch: bool,

        /// Seconds between polls
        #[arg(long, default_value_t = 2)]
        interval: u64,
    },

    /// Search recipes
    Search {
        /// Search term (omit to browse by rating)
        query: Option<String>,

        /// Comma-separated tags, a recipe needs at least one
        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long, default_value_t = 1)]
        page: i64,
    },

    /// Rebuild the search index from the database (server must be stopped)
    Reindex,
}
