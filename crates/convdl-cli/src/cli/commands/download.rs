//! `convdl download <url>` – convert one link and save it.

use anyhow::{Context, Result};
use convdl_core::config::ConvdlConfig;
use convdl_core::job::MediaFormat;
use convdl_core::notice::Notice;
use convdl_core::session::SessionBuilder;
use std::process::ExitCode;

use super::render;

pub async fn run_download(cfg: &ConvdlConfig, url: &str, format: MediaFormat) -> Result<ExitCode> {
    let session = SessionBuilder::from_config(cfg)?
        .spawn()
        .context("start session")?;
    let follower = render::follow(session.subscribe());

    let report = session.submit(url, format).await;
    session.shutdown().await;
    let _ = follower.await;

    let notice = Notice::for_report(&report?);
    render::print_notice(&notice);
    Ok(if notice.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
