//! Rivulet CLI - command-line interface
//!
//! Runs the HTTP server and offers quick source diagnostics from the
//! terminal without starting a server.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "rivulet")]
#[command(about = "An RTSP-to-HLS streaming server")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::handle_command(cli.command).await
}
