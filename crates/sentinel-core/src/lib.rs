//! # Sentinel Core
//!
//! Analysis orchestration and verdict fusion for the Sentinel security
//! daemon.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Sentinel                            │
//! │  ┌───────────────┐   ┌──────────────┐   ┌─────────────┐  │
//! │  │ RateLimiter   │   │ Orchestrator │   │ VerdictFuse │  │
//! │  │ (token bucket)│──▶│ (detector    │──▶│ (composite, │  │
//! │  │               │   │  fan-out +   │   │  level,     │  │
//! │  │               │   │  LRU cache)  │   │  confidence)│  │
//! │  └───────────────┘   └──────────────┘   └─────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! This crate owns scanning (fan out to `sentinel-detectors`, fuse, and
//! cache) and rate limiting. It deliberately does not depend on
//! `sentinel-quarantine`: composing the full policy-match →
//! quarantine → threat-record pipeline is the job of the binary that
//! sits above every component crate.

mod config;
mod error;
mod orchestrator;
mod ratelimit;
mod sentinel;
mod verdict;

pub use config::{
    GlobalConfig, OrchestratorConfig, PolicyConfig, QuarantineConfig, RateLimiterConfig,
    SentinelConfig,
};
pub use error::SentinelError;
pub use orchestrator::Orchestrator;
pub use ratelimit::{OperationClass, RateLimiter};
pub use sentinel::Sentinel;
pub use verdict::{ThreatLevel, Verdict};

pub type Result<T> = error::Result<T>;

#[cfg(test)]
mod tests;
