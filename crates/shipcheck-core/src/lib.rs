//! # shipcheck-core
//!
//! Shared types for the shipcheck post-deployment verification toolchain.
//!
//! Every check in shipcheck is a self-contained leaf: it produces a report,
//! writes its artifacts once, and exits with a binary pass/fail code. This
//! crate holds what those checks have in common:
//!
//! - The data model ([`CheckResult`], [`ConsoleLogEntry`], [`RouteCheck`],
//!   [`DeploymentSummary`])
//! - A bounded fixed-delay retry helper ([`retry::retry_fixed`])
//! - A denylist-filtered console collector ([`console::ConsoleCollector`])
//! - Configuration loading with environment overrides ([`ShipcheckConfig`])

pub mod artifacts;
pub mod config;
pub mod console;
mod error;
pub mod retry;
mod types;
pub mod version;

pub use artifacts::{ArtifactStore, ArtifactType, StoredArtifact};
pub use config::ShipcheckConfig;
pub use console::{ConsoleCollector, ErrorCategory, NoiseFilter};
pub use error::{Result, ShipcheckError};
pub use retry::RetryPolicy;
pub use types::*;
