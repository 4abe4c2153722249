//! CLI argument definitions using clap derive macros.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ipums_extract::api::constants::DEFAULT_HISTORY_LIMIT;

/// Define, submit, track and download IPUMS microdata extracts.
#[derive(Parser)]
#[command(name = "ipums-extract")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// API key (overrides IPUMS_API_KEY and the config file)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// API endpoint (overrides IPUMS_BASE_URL and the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

// Hand-written so the API key never reaches the logs.
impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("command", &self.command)
            .finish()
    }
}

/// Extract operations.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit the extract(s) defined in a JSON or YAML file
    Submit {
        /// Definition file (.json, .yml or .yaml)
        definition: PathBuf,

        /// Wait for each extract to complete
        #[arg(long)]
        wait: bool,

        /// Download completed files into this directory (implies --wait)
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },

    /// Print the status of an extract ("not found" if unknown)
    Status {
        /// Collection, e.g. usa
        collection: String,
        /// Extract number
        extract_id: u64,
    },

    /// Wait until an extract completes
    Wait {
        /// Collection, e.g. usa
        collection: String,
        /// Extract number
        extract_id: u64,

        /// Give up after this many seconds (default from config, else 3 hours)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_secs: Option<u64>,
    },

    /// Download the files of a completed extract
    Download {
        /// Collection, e.g. usa
        collection: String,
        /// Extract number
        extract_id: u64,

        /// Target directory (default from config, else the current directory)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Also download the Stata command file
        #[arg(long)]
        stata: bool,

        /// Also download the SPSS command file
        #[arg(long)]
        spss: bool,

        /// Also download the SAS command file
        #[arg(long)]
        sas: bool,

        /// Also download the R command file
        #[arg(long = "r")]
        r: bool,
    },

    /// List recent extracts of a collection, newest first
    History {
        /// Collection, e.g. usa
        collection: String,

        /// Number of extracts to list (1-500)
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT as u64, value_parser = clap::value_parser!(u64).range(1..=500))]
        limit: u64,
    },

    /// Report whether an extract's files have been purged
    Purged {
        /// Collection, e.g. usa
        collection: String,
        /// Extract number
        extract_id: u64,
    },

    /// Submit a fresh copy of a (purged) extract
    Resubmit {
        /// Collection, e.g. usa
        collection: String,
        /// Extract number
        extract_id: u64,
    },

    /// Rebuild an extract definition from a DDI codebook
    FromDdi {
        /// DDI codebook (.xml)
        codebook: PathBuf,

        /// Write the definition here instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

impl Command {
    /// Subcommand name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::Status { .. } => "status",
            Self::Wait { .. } => "wait",
            Self::Download { .. } => "download",
            Self::History { .. } => "history",
            Self::Purged { .. } => "purged",
            Self::Resubmit { .. } => "resubmit",
            Self::FromDdi { .. } => "from-ddi",
        }
    }
}
