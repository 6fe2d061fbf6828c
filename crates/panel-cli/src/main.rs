//! Test Panel CLI.
//!
//! One binary covering both sides of the panel: `serve` runs the HTTP
//! API, the rest are tester-side workflows driven through
//! [`panel_client`].

#![forbid(unsafe_code)]

mod serve;
mod tool;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Compatibility test panel.
#[derive(Parser, Debug)]
#[command(name = "test-panel")]
#[command(version, about = "Compatibility test panel for a Steam client emulator", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the panel HTTP API.
    Serve(serve::ServeArgs),
    /// Submit a session_results.json to the panel.
    Submit(tool::SubmitArgs),
    /// List queued offline submissions and retry them.
    Pending(tool::PendingArgs),
    /// Show the open retest queue.
    CheckRetests(tool::CheckRetestsArgs),
    /// Poll for retest flags in the background.
    Daemon(tool::DaemonArgs),
    /// Verify connectivity and credentials.
    TestConnection(tool::ConfigOnlyArgs),
    /// Write a config file template.
    CreateConfig(tool::CreateConfigArgs),
    /// Mint an invite code directly against the database.
    Invite(tool::InviteArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match args.command {
        Command::Serve(args) => serve::run(args).await,
        Command::Submit(args) => tool::submit(args).await,
        Command::Pending(args) => tool::pending(args).await,
        Command::CheckRetests(args) => tool::check_retests(args).await,
        Command::Daemon(args) => tool::daemon(args).await,
        Command::TestConnection(args) => tool::test_connection(args).await,
        Command::CreateConfig(args) => tool::create_config(args),
        Command::Invite(args) => tool::invite(args),
    }
}
