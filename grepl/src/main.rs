//! # Grepl CLI Entry Point
//!
//! The main executable for the Grepl tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and merges them into
//!    the session configuration.
//! 2. **Bootstrap**: Builds the client and the descriptor source, then resolves the default
//!    package and service via `grepl_core`.
//! 3. **Execution**: Runs the subcommand against the bootstrapped [`session::Session`].
//! 4. **Presentation**: Formats and prints the resulting data or error status to standard output/error.
mod cli;
mod formatter;
mod logging;
mod session;

use clap::Parser;
use cli::{Cli, Commands, ListCommands};
use formatter::{Defaults, FormattedString, PackageList, ServiceList};
use grepl_core::config::SessionConfig;
use session::{CallOutput, Session};
use std::process;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    if let Err(err) = logging::init(args.verbose) {
        eprintln!("{}", FormattedString::from(err));
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => exit_with(err),
    };

    let mut session = match Session::bootstrap(config).await {
        Ok(session) => session,
        Err(err) => exit_with(err),
    };

    match args.command {
        Commands::Defaults => {
            println!("{}", FormattedString::from(Defaults(&session.config.default)))
        }
        Commands::List { sub } => match sub {
            ListCommands::Packages => match session.list_packages().await {
                Ok(packages) => println!("{}", FormattedString::from(PackageList(packages))),
                Err(err) => exit_with(err),
            },
            ListCommands::Services => match session.list_services().await {
                Ok(services) => println!("{}", FormattedString::from(ServiceList(services))),
                Err(err) => exit_with(err),
            },
        },
        Commands::Call { rpc, body } => match session.call(&rpc, body).await {
            Ok(CallOutput::Unary(Ok(value))) => println!("{}", FormattedString::from(value)),
            Ok(CallOutput::Unary(Err(status))) => println!("{}", FormattedString::from(status)),
            Ok(CallOutput::Streaming(Ok(values))) => print_stream(values),
            Ok(CallOutput::Streaming(Err(status))) => {
                println!("{}", FormattedString::from(status))
            }
            Err(err) => exit_with(err),
        },
    }
}

fn load_config(args: &Cli) -> anyhow::Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_toml_path(path)?,
        None => SessionConfig::default(),
    };

    args.apply(&mut config);
    Ok(config)
}

fn exit_with(err: anyhow::Error) -> ! {
    eprintln!("{}", FormattedString::from(err));
    process::exit(1);
}

fn print_stream(stream: Vec<Result<serde_json::Value, grepl_core::tonic::Status>>) {
    for elem in stream {
        match elem {
            Ok(val) => println!("{}", FormattedString::from(val)),
            Err(status) => println!("{}", FormattedString::from(status)),
        }
    }
}
