use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::instrument::WithSubscriber;
use tracing::{error, Level};

mod auth;
mod aws;
mod browser;
mod commands;
mod common;
mod error;
mod saml;
mod server;
mod store;

use commands::LoginCommand;

#[derive(Parser)]
#[command(
    name = "samlauth",
    about = "SAML sign-in for the AWS CLI, usable as a credential_process",
    version = env!("CARGO_PKG_VERSION"),
    author = "ktruck"
)]
struct Cli {
    #[command(flatten)]
    login: LoginCommand,

    /// Enable debug logging
    #[arg(short, long, env = "SAMLAUTH_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the credential document, so logs go to stderr
    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(cli.debug)
        .finish();

    async move { report(auth::run(cli.login).await) }
        .with_subscriber(subscriber)
        .await
}

/// Log a failed run through tracing; stderr gets the error exactly once
fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
