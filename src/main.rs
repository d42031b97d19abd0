use clap::Parser;
use colored::*;
use std::process;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use tubegrab_lib::cli::Args;
use tubegrab_lib::console;
use tubegrab_lib::error::AppError;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let result = tokio::select! {
        result = tubegrab_lib::run(args) => result.map(|_| ()),
        _ = tokio::signal::ctrl_c() => Err(AppError::Interrupted),
    };

    match result {
        Ok(()) => {}
        Err(AppError::Interrupted) => {
            println!("\n{}", "Exited by user. Goodbye!".red());
        }
        Err(AppError::NoUrl) => {
            console::error("No URL provided. Exiting.");
        }
        Err(AppError::Download(e)) if e.is_timeout() => {
            error!("{}", e);
            console::error(&format!("Error: {}. Raise --info-timeout to wait longer.", e));
            process::exit(1);
        }
        Err(e) => {
            error!("Application error: {}", e);
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}
