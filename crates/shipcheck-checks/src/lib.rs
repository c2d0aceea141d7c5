//! # shipcheck-checks
//!
//! The checks that need no browser:
//!
//! - [`build`] - inspect the local bundler output before publishing
//! - [`html`] - fetch the deployed page (with bounded retry) and scan its raw HTML
//! - [`endpoint`] - fetch every production URL plus the version endpoint
//! - [`report`] - render the archiver's summary as a pull-request comment

pub mod build;
pub mod endpoint;
pub mod html;
pub mod http;
pub mod report;

pub use build::{BuildReport, BuildVerifier, Severity};
pub use endpoint::{verify_endpoints, EndpointReport, EndpointResult, VersionCheck, VersionOutcome};
pub use html::{fetch_structure, StructureReport};
pub use http::{FetchedPage, Fetcher};
