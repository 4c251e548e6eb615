//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::derive::SelectionFallback;

/// Default API root; the crime routes live under `/crimes`.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Parser)]
#[command(name = "crime-dashboard", version, about = "Crime aggregations by neighborhood")]
pub struct Cli {
    /// Base URL of the crime API.
    #[arg(long, env = "CRIME_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Per-request timeout in seconds. Unset uses the transport default.
    #[arg(long, env = "CRIME_API_TIMEOUT_SECS", global = true)]
    pub timeout_secs: Option<u64>,

    /// Which bairro to select when the selected one disappears after a refresh.
    #[arg(long, value_enum, default_value_t = SelectionFallback::FetchOrder, global = true)]
    pub selection_fallback: SelectionFallback,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive terminal dashboard (default).
    Dashboard {
        /// GeoJSON file with boundaries drawn under the markers.
        #[arg(long)]
        basemap: Option<PathBuf>,

        /// CSV file preselected for upload.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the ranked neighborhood list.
    List {
        /// Only show bairros whose name contains this text.
        #[arg(long, short)]
        search: Option<String>,

        /// Maximum number of rows.
        #[arg(long, short)]
        limit: Option<usize>,
    },
    /// Print the summary cards.
    Stats,
    /// Print one neighborhood.
    Show {
        bairro: String,
    },
    /// Upload a CSV file, then print the refreshed totals.
    Upload {
        file: PathBuf,
    },
    /// Delete all aggregated data on the server.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Check that the API is reachable.
    Health,
}

impl Cli {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
