use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tourney-saves-to-sqlite")]
#[command(version, about = "Parse tournament 4X game saves into a SQLite analytics database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import save archives into the analytics database
    Import {
        /// Directory containing save .zip archives
        save_dir: PathBuf,

        /// Output SQLite database path
        output_db: PathBuf,

        /// Delete and reload matches that were already imported
        #[arg(short, long)]
        force: bool,

        /// Directory with override documents (winners.json, names.json,
        /// pick_orders.json, storage.json)
        #[arg(long)]
        overrides_dir: Option<PathBuf>,

        /// Bracket feed JSON (participants and matches)
        #[arg(long)]
        bracket: Option<PathBuf>,

        /// Pick-order feed JSON (draft sheet rows)
        #[arg(long)]
        picks: Option<PathBuf>,

        /// Parser worker threads
        #[arg(short, long, default_value_t = 4)]
        jobs: usize,
    },

    /// List all table names in the schema
    ListTables,

    /// Run post-hoc data-quality checks against a database
    Validate {
        /// SQLite database path
        db: PathBuf,
    },

    /// Print summary aggregations from a database
    Report {
        /// SQLite database path
        db: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
