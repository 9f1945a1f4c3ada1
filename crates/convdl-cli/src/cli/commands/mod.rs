//! CLI command handlers. Each command is in its own file.

mod download;
mod render;
mod shell;

pub use download::run_download;
pub use shell::run_shell;
