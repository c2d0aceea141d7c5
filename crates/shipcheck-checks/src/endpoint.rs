//! Content/Endpoint Verifier
//!
//! Each production URL is fetched once, in sequence, with the client's hard
//! timeout. A sibling `version.json` endpoint proves which commit is served.

use serde::Serialize;
use shipcheck_core::config::DeploymentConfig;
use shipcheck_core::{CheckResult, ShipcheckConfig};
use tracing::{debug, warn};

use crate::http::{join_url, Fetcher};

/// Substrings a page must contain and phrases that mark a 404 page
#[derive(Debug, Clone)]
pub struct ContentExpectations {
    pub expected: Vec<String>,
    pub not_found_indicators: Vec<String>,
}

impl ContentExpectations {
    pub fn from_config(deployment: &DeploymentConfig) -> Self {
        Self {
            expected: deployment.expected_content.clone(),
            not_found_indicators: deployment.not_found_indicators.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResult {
    pub url: String,
    pub http_status: Option<u16>,
    pub content_length: Option<usize>,
    pub found_content: Vec<String>,
    pub missing_content: Vec<String>,
    pub looks_like_not_found: bool,
    pub error: Option<String>,
}

impl EndpointResult {
    fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            http_status: None,
            content_length: None,
            found_content: Vec::new(),
            missing_content: Vec::new(),
            looks_like_not_found: false,
            error: Some(error.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none()
            && self.http_status == Some(200)
            && self.missing_content.is_empty()
            && !self.looks_like_not_found
    }

    pub fn to_check_result(&self) -> CheckResult {
        let result = if self.passed() {
            CheckResult::pass(&self.url)
        } else {
            CheckResult::fail(&self.url, self.failure_reason())
        };
        match self.http_status {
            Some(status) => result.with_status(status),
            None => result,
        }
    }

    fn failure_reason(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        match self.http_status {
            Some(200) => {}
            Some(status) => return format!("unexpected status code {}", status),
            None => return "no response".to_string(),
        }
        let mut reasons = Vec::new();
        if !self.missing_content.is_empty() {
            reasons.push(format!("missing content: {}", self.missing_content.join(", ")));
        }
        if self.looks_like_not_found {
            reasons.push("page appears to be a 404 error page".to_string());
        }
        reasons.join("; ")
    }

    /// Per-URL detail lines
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Checking: {}", self.url)];

        if let Some(error) = &self.error {
            lines.push(format!("  ❌ Error: {}", error));
            return lines;
        }

        match self.http_status {
            Some(200) => lines.push("  ✅ Status code: 200 OK".to_string()),
            Some(status) => {
                lines.push(format!("  ❌ Unexpected status code: {}", status));
                return lines;
            }
            None => {}
        }

        for content in &self.found_content {
            lines.push(format!("  ✅ Found expected content: \"{}\"", content));
        }
        for content in &self.missing_content {
            lines.push(format!("  ❌ Missing expected content: \"{}\"", content));
        }
        if self.looks_like_not_found {
            lines.push("  ❌ Page appears to be a 404 error page".to_string());
        }
        lines
    }

    /// Lines for the closing summary block
    pub fn summary_lines(&self) -> Vec<String> {
        let verdict = if self.passed() { "✅ PASSED" } else { "❌ FAILED" };
        let mut lines = vec![format!("{} - {}", verdict, self.url)];
        if let Some(status) = self.http_status {
            lines.push(format!("         Status: {}", status));
        }
        if let Some(len) = self.content_length {
            lines.push(format!("         Content size: {} bytes", len));
        }
        if let Some(error) = &self.error {
            lines.push(format!("         Error: {}", error));
        }
        lines
    }
}

/// Judge one response; a non-200 status short-circuits the content scan
pub fn evaluate_response(
    url: &str,
    status: u16,
    body: &str,
    expectations: &ContentExpectations,
) -> EndpointResult {
    let mut result = EndpointResult {
        url: url.to_string(),
        http_status: Some(status),
        content_length: Some(body.len()),
        found_content: Vec::new(),
        missing_content: Vec::new(),
        looks_like_not_found: false,
        error: None,
    };

    if status != 200 {
        return result;
    }

    let (found, missing): (Vec<String>, Vec<String>) = expectations
        .expected
        .iter()
        .cloned()
        .partition(|content| body.contains(content.as_str()));
    result.found_content = found;
    result.missing_content = missing;

    let lowered = body.to_lowercase();
    result.looks_like_not_found = expectations
        .not_found_indicators
        .iter()
        .any(|phrase| lowered.contains(&phrase.to_lowercase()));

    result
}

/// Fetch and judge one URL; transport errors become a failed result
pub async fn check_url(
    fetcher: &Fetcher,
    url: &str,
    expectations: &ContentExpectations,
) -> EndpointResult {
    match fetcher.fetch(url).await {
        Ok(page) => evaluate_response(url, page.status, &page.body, expectations),
        Err(e) => {
            warn!("Request to {} failed: {}", url, e);
            EndpointResult::failed(url, e.to_string())
        }
    }
}

/// How the served build identifier compared to the expected one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum VersionOutcome {
    Match,
    Mismatch { expected: String, actual: String },
    MissingField { field: String },
    InvalidJson { message: String },
    Unreachable { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheck {
    pub url: String,
    pub expected: String,
    pub outcome: VersionOutcome,
}

impl VersionCheck {
    pub fn passed(&self) -> bool {
        self.outcome == VersionOutcome::Match
    }

    pub fn line(&self) -> String {
        match &self.outcome {
            VersionOutcome::Match => format!("✅ Build identifier matches: {}", self.expected),
            VersionOutcome::Mismatch { expected, actual } => format!(
                "❌ Build identifier mismatch: expected {}, served {}",
                expected, actual
            ),
            VersionOutcome::MissingField { field } => {
                format!("❌ {} has no \"{}\" field", self.url, field)
            }
            VersionOutcome::InvalidJson { message } => {
                format!("❌ {} is not valid JSON: {}", self.url, message)
            }
            VersionOutcome::Unreachable { message } => {
                format!("❌ Could not fetch {}: {}", self.url, message)
            }
        }
    }

    pub fn to_check_result(&self) -> CheckResult {
        if self.passed() {
            CheckResult::pass(&self.url)
        } else {
            CheckResult::fail(&self.url, self.line())
        }
    }
}

/// Compare the identifier in a version document against `expected` (exact match)
pub fn compare_build_id(body: &str, field: &str, expected: &str) -> VersionOutcome {
    let document: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            return VersionOutcome::InvalidJson {
                message: e.to_string(),
            }
        }
    };

    match document.get(field).and_then(|v| v.as_str()) {
        Some(actual) if actual == expected => VersionOutcome::Match,
        Some(actual) => VersionOutcome::Mismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        },
        None => VersionOutcome::MissingField {
            field: field.to_string(),
        },
    }
}

pub async fn check_version(
    fetcher: &Fetcher,
    base_url: &str,
    version_path: &str,
    field: &str,
    expected: &str,
) -> VersionCheck {
    let url = join_url(base_url, version_path);

    let outcome = match fetcher.fetch(&url).await {
        Ok(page) if page.is_ok() => compare_build_id(&page.body, field, expected),
        Ok(page) => VersionOutcome::Unreachable {
            message: format!("HTTP {}", page.status),
        },
        Err(e) => VersionOutcome::Unreachable {
            message: e.to_string(),
        },
    };

    debug!("Version check against {}: {:?}", url, outcome);

    VersionCheck {
        url,
        expected: expected.to_string(),
        outcome,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointReport {
    pub results: Vec<EndpointResult>,
    pub version: Option<VersionCheck>,
}

impl EndpointReport {
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed())
            && self.version.as_ref().map_or(true, |v| v.passed())
    }

    pub fn check_results(&self) -> Vec<CheckResult> {
        self.results
            .iter()
            .map(|r| r.to_check_result())
            .chain(self.version.iter().map(|v| v.to_check_result()))
            .collect()
    }
}

/// Check every configured deployment URL in order, then the version endpoint
/// when an expected build identifier is configured
pub async fn verify_endpoints(fetcher: &Fetcher, config: &ShipcheckConfig) -> EndpointReport {
    let expectations = ContentExpectations::from_config(&config.deployment);

    let mut results = Vec::new();
    for url in config.deployment_urls() {
        results.push(check_url(fetcher, &url, &expectations).await);
    }

    let version = match config.expected_build_id.as_deref() {
        Some(expected) => Some(
            check_version(
                fetcher,
                &config.deployment.url,
                &config.deployment.version_path,
                &config.deployment.version_field,
                expected,
            )
            .await,
        ),
        None => None,
    };

    EndpointReport { results, version }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expectations() -> ContentExpectations {
        ContentExpectations::from_config(&DeploymentConfig::default())
    }

    const PAGE: &str = r#"<html><body><div id="root"></div><script src="/assets/index-a1b2c3.js"></script>Daniel</body></html>"#;

    #[test]
    fn test_good_page_passes() {
        let result = evaluate_response("https://example.com", 200, PAGE, &expectations());
        assert!(result.passed());
        assert_eq!(result.found_content.len(), 3);
        assert_eq!(result.content_length, Some(PAGE.len()));
    }

    #[test]
    fn test_status_short_circuits_content() {
        let result = evaluate_response("https://example.com", 404, PAGE, &expectations());
        assert!(!result.passed());
        assert!(result.found_content.is_empty());
        assert_eq!(
            result.to_check_result().error_message.as_deref(),
            Some("unexpected status code 404")
        );
    }

    #[test]
    fn test_not_found_phrase_fails() {
        let body = format!("{}<p>Page Not Found</p>", PAGE);
        let result = evaluate_response("https://example.com", 200, &body, &expectations());
        assert!(result.missing_content.is_empty());
        assert!(result.looks_like_not_found);
        assert!(!result.passed());
    }

    #[test]
    fn test_missing_content_fails() {
        let result = evaluate_response("https://example.com", 200, "<html></html>", &expectations());
        assert_eq!(result.missing_content.len(), 3);
        assert!(!result.passed());
    }

    #[test]
    fn test_compare_build_id() {
        assert_eq!(
            compare_build_id(r#"{"commitHash":"abc123"}"#, "commitHash", "abc123"),
            VersionOutcome::Match
        );
        assert_eq!(
            compare_build_id(r#"{"commitHash":"abc123"}"#, "commitHash", "def456"),
            VersionOutcome::Mismatch {
                expected: "def456".to_string(),
                actual: "abc123".to_string()
            }
        );
        assert!(matches!(
            compare_build_id(r#"{"branch":"main"}"#, "commitHash", "abc123"),
            VersionOutcome::MissingField { .. }
        ));
        assert!(matches!(
            compare_build_id("<html>", "commitHash", "abc123"),
            VersionOutcome::InvalidJson { .. }
        ));
    }
}
