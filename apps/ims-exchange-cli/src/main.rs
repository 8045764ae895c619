//! IMS JWT exchange command-line tool
//!
//! # Usage
//!
//! ```bash
//! # Exchange the integration in integration.json for an access token
//! ims-exchange exchange integration.json
//!
//! # Log request and response bodies (client secret redacted) to stderr
//! ims-exchange --verbose exchange integration.json
//!
//! # Structured logs
//! ims-exchange --log-format json exchange integration.json
//! ```
//!
//! The token response is printed to stdout as pretty JSON. Logs go to
//! stderr so stdout stays machine-readable.

// CLI tools are expected to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod exchange;
mod logging;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "ims-exchange")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log request and response bodies and lower the log level to debug
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Exchange an integration document for an access token
    Exchange(exchange::ExchangeArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose);

    match cli.command {
        Commands::Exchange(args) => match args.run(cli.verbose).await {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("Failed to exchange for access token: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}
