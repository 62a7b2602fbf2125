// src/main.rs

use std::process::ExitCode;

use clap::Parser;

use pipedag::cli::CliArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(err) = pipedag::logging::init_logging(args.log_level) {
        eprintln!("pipedag: could not initialise logging: {err}");
        return ExitCode::FAILURE;
    }

    match pipedag::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Details (failed functions, log-file paths, missing values)
            // have already been logged; leave a one-line trailer.
            eprintln!("pipedag: {err:#}");
            ExitCode::FAILURE
        }
    }
}
