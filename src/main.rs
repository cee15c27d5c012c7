// Entrypoint for the CLI application.
// - Parses arguments, sets up tracing, then runs the fixed sequence:
//   refresh the OAuth tokens, upload the file, print the deliverable id.
// - Returns `anyhow::Result` so every library error surfaces as a
//   human-readable message and a non-zero exit.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use tolino_cli::api::CloudClient;

/// cmd line client to access a personal tolino cloud storage space.
#[derive(Parser)]
#[command(name = "tolino-cli", version)]
struct Cli {
    /// config file (default: ~/.config.yaml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// name of client in config file
    #[arg(long, value_name = "NAME")]
    client: Option<String>,

    /// file to upload
    #[arg(long, value_name = "FILE")]
    filename: Option<PathBuf>,

    /// log additional debugging info, including full HTTP traffic
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // `--debug` forces full request/response tracing; otherwise RUST_LOG
    // applies, with warnings-only as the quiet default.
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(client_name) = cli.client else {
        println!("name of client required!");
        Cli::command().print_help()?;
        std::process::exit(1);
    };
    let Some(filename) = cli.filename else {
        println!("filename required!");
        Cli::command().print_help()?;
        std::process::exit(1);
    };
    let config_path = cli.config.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config.yaml")
    });

    // One HTTP session covers both calls, like a browser keeping its
    // cookies between the token exchange and the upload.
    let api = CloudClient::new(config_path)?;
    api.refresh_tokens(&client_name)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message("Uploading...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = api.upload(&client_name, &filename);
    spinner.finish_and_clear();

    println!("{}", result?);
    Ok(())
}
