//! Core data model shared by every verifier

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A single named sub-check that feeds into a [`CheckResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCheck {
    pub name: String,
    pub passed: bool,
}

impl SubCheck {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
        }
    }
}

/// Binary outcome of checking one target (URL or path)
///
/// There is no partial success: a result built with [`CheckResult::from_sub_checks`]
/// passes only when every constituent sub-check passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub target: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CheckResult {
    /// Create a passing result
    pub fn pass(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            passed: true,
            http_status: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a failing result with a message
    pub fn fail(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            passed: false,
            http_status: None,
            error_message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Aggregate sub-checks into one result; the failing names become the message
    pub fn from_sub_checks(target: impl Into<String>, checks: &[SubCheck]) -> Self {
        let failed: Vec<&str> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect();

        if failed.is_empty() {
            Self::pass(target)
        } else {
            Self::fail(target, format!("failed checks: {}", failed.join(", ")))
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

/// Every [`CheckResult`] one verifier produced in a run
///
/// The run passes only when it has results and all of them passed; this is
/// what the CLI exit code follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRun {
    pub check: String,
    pub passed: bool,
    pub results: Vec<CheckResult>,
    pub timestamp: DateTime<Utc>,
}

impl CheckRun {
    pub fn new(check: impl Into<String>, results: Vec<CheckResult>) -> Self {
        Self {
            check: check.into(),
            passed: !results.is_empty() && results.iter().all(|r| r.passed),
            results,
            timestamp: Utc::now(),
        }
    }

    /// Artifact stem, e.g. `html-check`
    pub fn file_stem(&self) -> String {
        format!("{}-check", self.check)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

/// Kind of a captured browser log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Error,
    Warning,
    Info,
    Log,
    PageError,
    RequestFailed,
}

impl LogKind {
    /// Kinds that count towards the failing error total
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            LogKind::Error | LogKind::PageError | LogKind::RequestFailed
        )
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogKind::Error => write!(f, "error"),
            LogKind::Warning => write!(f, "warning"),
            LogKind::Info => write!(f, "info"),
            LogKind::Log => write!(f, "log"),
            LogKind::PageError => write!(f, "pageerror"),
            LogKind::RequestFailed => write!(f, "requestfailed"),
        }
    }
}

/// `url:line:col` location of a log event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub url: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(url: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            url: url.into(),
            line,
            column,
        }
    }

    /// Location for a URL with no meaningful line/column (failed requests)
    pub fn url_only(url: impl Into<String>) -> Self {
        Self::new(url, 0, 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.url, self.line, self.column)
    }
}

/// One console message, uncaught exception or failed request seen by the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLogEntry {
    pub kind: LogKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    pub timestamp: DateTime<Utc>,
}

impl ConsoleLogEntry {
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            source_location: None,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.source_location = Some(location);
        self
    }
}

/// A route the browser-driven scripts visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCheck {
    pub path: String,
    pub name: String,
}

impl RouteCheck {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Join this route onto a base URL without doubling the slash
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{}{}", base, self.path)
        } else {
            format!("{}/{}", base, self.path)
        }
    }
}

/// The fixed route list of the portfolio site
pub fn default_routes() -> Vec<RouteCheck> {
    vec![
        RouteCheck::new("/", "home"),
        RouteCheck::new("/#/skills", "skills"),
        RouteCheck::new("/#/blog", "blog"),
        RouteCheck::new("/#/blog/2025-08-31-hello-world", "blog-post"),
        RouteCheck::new("/#/portfolio", "portfolio"),
    ]
}

/// Per-route outcome recorded by the screenshot archiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub route: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,
    #[serde(default)]
    pub console_error_count: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteResult {
    /// Result for a route that loaded; success is `status == 200 && errors == 0`
    pub fn loaded(
        route: &RouteCheck,
        url: impl Into<String>,
        http_status: Option<u16>,
        screenshot_path: PathBuf,
        console_error_count: usize,
    ) -> Self {
        Self {
            route: route.name.clone(),
            url: url.into(),
            http_status,
            screenshot_path: Some(screenshot_path),
            console_error_count,
            success: http_status == Some(200) && console_error_count == 0,
            error: None,
        }
    }

    /// Result for a route that could not be captured at all
    pub fn errored(route: &RouteCheck, url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            route: route.name.clone(),
            url: url.into(),
            http_status: None,
            screenshot_path: None,
            console_error_count: 0,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Route counts in a [`DeploymentSummary`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryTotals {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Hand-off artifact between the screenshot archiver and the report formatter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub timestamp: DateTime<Utc>,
    pub base_url: String,
    pub results: Vec<RouteResult>,
    pub totals: SummaryTotals,
}

impl DeploymentSummary {
    /// Build a summary, deriving totals from the per-route results
    pub fn new(base_url: impl Into<String>, results: Vec<RouteResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        let totals = SummaryTotals {
            total: results.len(),
            successful,
            failed: results.len() - successful,
        };

        Self {
            timestamp: Utc::now(),
            base_url: base_url.into(),
            results,
            totals,
        }
    }

    pub fn all_successful(&self) -> bool {
        self.totals.failed == 0
    }
}
