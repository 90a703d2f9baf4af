use clap::{Args, Subcommand};
use engine_core::fetcher::CursorPolicy;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one incremental sync over every dataset in the catalog
    Sync(SyncArgs),

    /// Show the stored cursor of every dataset
    Cursors {
        #[arg(long, help = "Print the cursors as JSON instead of a table")]
        json: bool,
    },

    /// Drop a dataset's cursor so the next run starts from the beginning
    Reset {
        /// Dataset key, `<namespace>.<collection>`
        dataset: String,
    },

    /// Merge a cursor file written by an older release into the cursor store
    ImportSnapshot {
        /// Path to the legacy `snapshot.json`
        file: PathBuf,
    },

    /// Check that the document store is reachable
    Ping,
}

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    #[arg(long, help = "Exit with a non-zero status when any dataset failed")]
    pub strict: bool,

    #[arg(long, help = "Print the run report as JSON instead of a table")]
    pub json: bool,

    #[arg(long, help = "Overrides CURSOR_POLICY (identifier | freshness)")]
    pub cursor_policy: Option<CursorPolicy>,

    #[arg(long, help = "Overrides MAX_CONCURRENCY; 0 means unbounded")]
    pub max_concurrency: Option<usize>,

    #[arg(long, help = "Overrides STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,
}
