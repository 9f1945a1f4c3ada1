pub mod config;
pub mod logging;

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod machine;
pub mod notice;
pub mod progress;
pub mod session;
pub mod share;
pub mod storage;
pub mod url_model;
