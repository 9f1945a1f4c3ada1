//! `convdl shell` – line-oriented rendition of the download form.

use anyhow::{Context, Result};
use convdl_core::config::ConvdlConfig;
use convdl_core::job::MediaFormat;
use convdl_core::notice::Notice;
use convdl_core::session::SessionBuilder;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::render;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Input {
    Blank,
    Quit,
    Job { url: String, format: MediaFormat },
    BadFormat(String),
}

/// Parse one `URL [mp3|mp4]` line. The URL itself is checked by the session.
pub(crate) fn parse_line(line: &str, default_format: MediaFormat) -> Input {
    let mut words = line.split_whitespace();
    let Some(url) = words.next() else {
        return Input::Blank;
    };
    if url.eq_ignore_ascii_case("quit") || url.eq_ignore_ascii_case("exit") {
        return Input::Quit;
    }
    let format = match words.next() {
        None => default_format,
        Some(f) => match f.parse() {
            Ok(format) => format,
            Err(_) => return Input::BadFormat(f.to_string()),
        },
    };
    Input::Job {
        url: url.to_string(),
        format,
    }
}

fn prompt() {
    print!("link> ");
    let _ = std::io::stdout().flush();
}

pub async fn run_shell(cfg: &ConvdlConfig, default_format: MediaFormat) -> Result<()> {
    let session = SessionBuilder::from_config(cfg)?
        .spawn()
        .context("start session")?;
    let follower = render::follow(session.subscribe());
    println!(
        "Paste a link, optionally followed by mp3 or mp4 (default {}). `quit` to leave.",
        default_format
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        match parse_line(&line, default_format) {
            Input::Blank => {}
            Input::Quit => break,
            Input::BadFormat(f) => eprintln!("Unknown format {:?}; use mp3 or mp4.", f),
            Input::Job { url, format } => match session.submit(url, format).await {
                Ok(report) => render::print_notice(&Notice::for_report(&report)),
                Err(e) => eprintln!("{}", e),
            },
        }
        prompt();
    }
    println!();

    session.shutdown().await;
    let _ = follower.await;
    Ok(())
}
