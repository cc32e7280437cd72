mod cli;
mod client;
mod clipboard;
mod wayland;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries pasted bytes.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    if let Err(e) = client::run(cli.command, config).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("wlclipd: {e}");
        std::process::exit(1);
    }
}
