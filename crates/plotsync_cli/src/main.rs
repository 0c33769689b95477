//! plotsync CLI
//!
//! Command-line tools for plotsync plot files.
//!
//! # Commands
//!
//! - `validate` - Check a plot and list every violation
//! - `apply` - Feed JSON-lines request envelopes through the command service
//! - `inspect` - Summarize a plot's slices and features

mod commands;

use clap::{Parser, Subcommand};
use plotsync_core::{Rules, TimePolicy};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// plotsync command-line plot tools.
#[derive(Parser)]
#[command(name = "plotsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Require the current time to lie within the plot period
    #[arg(global = true, long)]
    strict_time: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a plot file and list every violation
    Validate {
        /// Plot file (GeoJSON FeatureCollection)
        plot: PathBuf,
    },

    /// Apply request envelopes to a plot
    Apply {
        /// Plot file (GeoJSON FeatureCollection)
        plot: PathBuf,

        /// Requests, one JSON envelope per line
        requests: PathBuf,

        /// Where to save the result (defaults to overwriting the plot)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Summarize a plot file
    Inspect {
        /// Plot file (GeoJSON FeatureCollection)
        plot: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let rules = if cli.strict_time {
        Rules::with_time_policy(TimePolicy::CurrentWithinRange)
    } else {
        Rules::default()
    };
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Validate { plot } => {
            commands::validate::run(&plot, &rules, &mut stdout)?;
        }
        Commands::Apply {
            plot,
            requests,
            out,
        } => {
            let out = out.unwrap_or_else(|| plot.clone());
            commands::apply::run(&plot, &requests, &out, &rules, &mut stdout)?;
        }
        Commands::Inspect { plot, format } => {
            commands::inspect::run(&plot, &format, &rules, &mut stdout)?;
        }
        Commands::Version => {
            println!("plotsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("plotsync Store v{}", plotsync_store::VERSION);
        }
    }

    Ok(())
}
