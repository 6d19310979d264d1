//! Sentinel daemon: configuration loading and the full scan pipeline
//! composed from every component crate. The binary at `src/main.rs` is
//! a thin clap front end over this library.

pub mod config;
pub mod ipc;
pub mod pipeline;

pub use config::{load_config, load_or_default};
pub use ipc::{dispatch, IpcOperation, IpcResponse};
pub use pipeline::{PipelineOutcome, SentinelDaemon};
