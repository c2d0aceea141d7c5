//! Headless-browser checks for shipcheck
//!
//! These are the only checks that see what a real browser sees: JavaScript
//! errors, failed requests and whether anything rendered at all.
//!
//! # Requirements
//!
//! - Chrome or Chromium installed (located by `headless_chrome`)
//!
//! # Architecture
//!
//! - [`browser`]: session and tab lifecycle, listener wiring, network-idle wait
//! - [`cdp`]: DevTools event payloads to [`shipcheck_core::ConsoleLogEntry`]
//! - [`screenshot`]: full-page capture and the blank-render heuristic
//! - [`verification`]: single-page verifier and its JSON report
//! - [`archive`]: per-route screenshots and the deployment summary
//! - [`console_check`]: multi-route console report

pub mod archive;
pub mod browser;
pub mod cdp;
pub mod console_check;
pub mod screenshot;
pub mod verification;

pub use archive::{archive_routes, visit_routes};
pub use browser::{BrowserConfig, BrowserPage, BrowserSession, PageEvents};
pub use console_check::{check_console, ConsoleCheckReport, DEFAULT_PREVIEW_URL};
pub use screenshot::BlankScreenHeuristic;
pub use verification::{verify_deployment, VerificationReport, Verdict};
