//! CLI for the convdl conversion downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use convdl_core::config::{self, ConvdlConfig};
use convdl_core::job::MediaFormat;
use std::process::ExitCode;

use commands::{run_download, run_shell};

/// Top-level CLI for convdl.
#[derive(Debug, Parser)]
#[command(name = "convdl")]
#[command(about = "convdl: convert a media link to mp3/mp4 through the conversion backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Convert one link and save the result.
    Download {
        /// Media page URL (e.g. a YouTube watch link).
        url: String,

        /// Output format.
        #[arg(long, short, default_value = "mp3", value_name = "mp3|mp4")]
        format: MediaFormat,

        /// Backend root URL; overrides `server_url` from the config file.
        #[arg(long, value_name = "URL")]
        server: Option<String>,

        /// Do not hand the saved file to the system opener.
        #[arg(long)]
        no_share: bool,
    },

    /// Interactive form: read `URL [mp3|mp4]` lines from stdin until `quit` or EOF.
    Shell {
        /// Format used when a line does not name one.
        #[arg(long, short, default_value = "mp3", value_name = "mp3|mp4")]
        format: MediaFormat,

        /// Backend root URL; overrides `server_url` from the config file.
        #[arg(long, value_name = "URL")]
        server: Option<String>,

        /// Do not hand saved files to the system opener.
        #[arg(long)]
        no_share: bool,
    },
}

/// Config file values with per-invocation overrides applied.
fn effective_config(server: Option<String>, no_share: bool) -> Result<ConvdlConfig> {
    let mut cfg = config::load_or_init()?;
    if let Some(server) = server {
        cfg.server_url = server;
    }
    if no_share {
        cfg.share.enabled = false;
    }
    tracing::debug!("effective config: {:?}", cfg);
    Ok(cfg)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<ExitCode> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Download {
                url,
                format,
                server,
                no_share,
            } => {
                let cfg = effective_config(server, no_share)?;
                run_download(&cfg, &url, format).await
            }
            CliCommand::Shell {
                format,
                server,
                no_share,
            } => {
                let cfg = effective_config(server, no_share)?;
                run_shell(&cfg, format).await?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

#[cfg(test)]
mod tests;
