//! Command-line arguments.

use std::time::Duration;

use clap::{Parser, Subcommand};

/// Query the search/answer service from the terminal.
#[derive(Parser, Debug)]
#[command(name = "searchlink", version)]
pub struct Args {
    /// Service base URL (defaults to the public endpoint)
    #[arg(long, global = true, env = "SEARCHLINK_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-call timeout in seconds, covering the whole stream
    #[arg(long, global = true, value_parser = parse_timeout)]
    pub timeout_secs: Option<Duration>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a search and print the JSON result
    Search {
        query: String,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        max_results: Option<u32>,
    },
    /// Ask a question
    Answer {
        query: String,

        /// Print the answer as it streams in
        #[arg(long)]
        stream: bool,

        /// Ask the service to include sources
        #[arg(long)]
        sources: bool,
    },
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of seconds"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err("timeout must be a positive number of seconds".to_string());
    }
    Ok(Duration::from_secs_f64(secs))
}
