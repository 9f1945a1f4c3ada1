//! Terminal rendering of job snapshots and notices.

use convdl_core::job::{JobSnapshot, JobState};
use convdl_core::notice::Notice;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One status line for an active job; `None` for idle and terminal states,
/// which the notice covers.
pub(super) fn status_line(s: &JobSnapshot) -> Option<String> {
    let job = s.job?;
    match s.state {
        JobState::Validating | JobState::Requesting => Some(format!("{} preparing", job)),
        JobState::Downloading => Some(format!("{} converting {}", job, s.progress)),
        JobState::Writing => Some(format!("{} saving", job)),
        _ => None,
    }
}

/// Print a line whenever the status text changes. Ends when the session stops.
pub(super) fn follow(mut rx: watch::Receiver<JobSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last: Option<String> = None;
        while rx.changed().await.is_ok() {
            let line = status_line(&rx.borrow_and_update());
            if let Some(line) = line {
                if last.as_deref() != Some(line.as_str()) {
                    println!("{}", line);
                    last = Some(line);
                }
            }
        }
    })
}

pub(super) fn print_notice(notice: &Notice) {
    if notice.is_error() {
        eprintln!("{}", notice);
    } else {
        println!("{}", notice);
    }
}
