//! CLI command implementations

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use rivulet_core::RivuletConfig;
use rivulet_core::streaming::{
    Credentials, FfmpegTranscoder, Transport, probe_source, test_source,
};
use rivulet_core::tracing_setup::init_tracing;
use tracing::Level;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory for HLS session output
        #[arg(long)]
        hls_dir: Option<PathBuf>,
    },
    /// Probe a source for reachability and print the raw diagnostic
    Probe {
        /// Source URL (rtsp://...)
        url: String,
        /// Transport: tcp or udp
        #[arg(short, long, default_value = "tcp")]
        transport: String,
    },
    /// Test a source and print failure classification with suggestions
    Test {
        /// Source URL (rtsp://...)
        url: String,
        /// Username for sources requiring authentication
        #[arg(short, long)]
        username: Option<String>,
        /// Password for sources requiring authentication
        #[arg(short, long)]
        password: Option<String>,
        /// Transport: tcp or udp
        #[arg(short, long, default_value = "tcp")]
        transport: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns an error when the server fails to start or a probe cannot run.
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve { port, hls_dir } => serve(port, hls_dir).await,
        Commands::Probe { url, transport } => probe(url, transport).await,
        Commands::Test {
            url,
            username,
            password,
            transport,
        } => test(url, username, password, transport).await,
    }
}

async fn serve(port: Option<u16>, hls_dir: Option<PathBuf>) -> anyhow::Result<()> {
    init_tracing(Level::INFO, None).map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let mut config = RivuletConfig::from_env();
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(hls_dir) = hls_dir {
        config.streaming.hls_root = hls_dir;
    }

    rivulet_web::run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {e}"))
}

fn parse_transport(raw: &str) -> anyhow::Result<Transport> {
    raw.parse().map_err(|reason: String| anyhow::anyhow!(reason))
}

async fn probe(url: String, transport: String) -> anyhow::Result<()> {
    let config = RivuletConfig::from_env();
    let transcoder = FfmpegTranscoder::new(config.streaming.ffmpeg_path.clone());
    let report = probe_source(
        &transcoder,
        &url,
        parse_transport(&transport)?,
        &config.streaming,
    )
    .await
    .context("probe failed")?;

    println!("reachable: {}", report.reachable);
    if !report.raw_diagnostic.is_empty() {
        println!("{}", report.raw_diagnostic);
    }
    Ok(())
}

async fn test(
    url: String,
    username: Option<String>,
    password: Option<String>,
    transport: String,
) -> anyhow::Result<()> {
    let config = RivuletConfig::from_env();
    let transcoder = FfmpegTranscoder::new(config.streaming.ffmpeg_path.clone());
    let credentials = match (username, password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        _ => None,
    };
    let result = test_source(
        &transcoder,
        &url,
        credentials.as_ref(),
        parse_transport(&transport)?,
        &config.streaming,
    )
    .await
    .context("test failed")?;

    if result.success {
        println!("source is reachable");
    } else {
        if let Some(category) = &result.error_category {
            println!("failure: {category}");
        }
        for suggestion in &result.suggestions {
            println!("  - {suggestion}");
        }
    }
    Ok(())
}
