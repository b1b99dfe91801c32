//! `searchlink` command-line client.

mod args;
mod output;

use std::process::ExitCode;

use clap::Parser as _;
use searchlink::prelude::*;

use crate::args::{Args, Command};
use crate::output::{CliError, write_json, write_stream};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    searchlink::observability::init_observability("warn");

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error [{}]: {err}", err.label());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let mut builder = Client::builder();
    if let Some(base_url) = args.base_url {
        builder = builder.base_url(base_url);
    }
    if let Some(timeout) = args.timeout_secs {
        builder = builder.timeout(timeout);
    }
    let client = builder.build()?;

    match args.command {
        Command::Search { query, max_results } => {
            let mut request = SearchRequest::new(query);
            if let Some(max_results) = max_results {
                request = request.max_results(max_results);
            }
            let results = client.search(&request).await?;
            write_json(&mut std::io::stdout().lock(), &results)?;
        }
        Command::Answer {
            query,
            stream,
            sources,
        } => {
            let request = AnswerRequest::new(query).include_sources(sources);
            if stream {
                let mut stream = client.answer_stream(&request).await?;
                let abort = stream.abort_handle();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        abort.abort();
                    }
                });
                write_stream(&mut stream, &mut std::io::stdout()).await?;
            } else {
                let answer = client.answer(&request).await?;
                write_json(&mut std::io::stdout().lock(), &answer)?;
            }
        }
    }
    Ok(())
}
