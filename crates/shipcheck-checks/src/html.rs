//! HTML Structure Fetcher
//!
//! Fetches the deployed entry page (retrying while the static host
//! propagates) and scans the raw HTML for markers that separate a real build
//! from published source.

use regex::Regex;
use serde::Serialize;
use shipcheck_core::config::MarkerConfig;
use shipcheck_core::retry::{retry_fixed, RetryPolicy};
use shipcheck_core::{CheckResult, Result, ShipcheckError, SubCheck};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::http::{FetchedPage, Fetcher};

/// Diagnostic shown when unbundled source was published
pub const SOURCE_DEPLOYED_DIAGNOSTIC: &str = "🔴 CRITICAL: Deploying SOURCE files instead of BUILD";

struct Patterns {
    js_bundle: Regex,
    css_bundle: Regex,
    script_src: Regex,
    stylesheet_href: Regex,
    deployment_hash: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ShipcheckError::Other(format!("Invalid pattern {}: {}", pattern, e)))
        };

        Ok(Self {
            js_bundle: compile(r"/assets/[\w.-]+-[\w-]{6,}\.js\b")?,
            css_bundle: compile(r"/assets/[\w.-]+-[\w-]{6,}\.css\b")?,
            script_src: compile(r#"<script[^>]+src="([^"]+)""#)?,
            stylesheet_href: compile(r#"<link[^>]+href="([^"]+\.css)""#)?,
            deployment_hash: compile(
                r#"<meta\s+name="deployment-hash"\s+content="([^"]*)""#,
            )?,
        })
    }
}

/// What the raw HTML of the deployed page contains
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureReport {
    pub url: String,
    pub http_status: u16,
    /// Fetch attempts it took to get a 200
    pub attempts: usize,

    pub has_mount_marker: bool,
    pub has_script_tag: bool,
    pub has_js_bundle: bool,
    pub has_css_bundle: bool,
    pub has_title: bool,
    pub has_author: bool,

    pub has_source_entry: bool,
    pub has_dev_asset: bool,

    pub main_script: Option<String>,
    pub main_stylesheet: Option<String>,

    pub deployment_hash: Option<String>,
    pub expected_build_id: Option<String>,
}

impl StructureReport {
    /// Scan a fetched page body
    pub fn inspect(
        page: &FetchedPage,
        markers: &MarkerConfig,
        expected_build_id: Option<&str>,
    ) -> Result<Self> {
        let patterns = Patterns::new()?;
        let html = page.body.as_str();

        let first_capture = |re: &Regex| re.captures(html).map(|c| c[1].to_string());

        Ok(Self {
            url: page.url.clone(),
            http_status: page.status,
            attempts: 1,
            has_mount_marker: html.contains(&markers.mount_marker),
            has_script_tag: html.contains("<script"),
            has_js_bundle: patterns.js_bundle.is_match(html),
            has_css_bundle: patterns.css_bundle.is_match(html),
            has_title: html.contains("<title>"),
            has_author: html.contains(&markers.author),
            has_source_entry: html.contains(&markers.source_entry),
            has_dev_asset: html.contains(&markers.dev_asset),
            main_script: first_capture(&patterns.script_src),
            main_stylesheet: first_capture(&patterns.stylesheet_href),
            deployment_hash: first_capture(&patterns.deployment_hash),
            expected_build_id: expected_build_id.map(str::to_string),
        })
    }

    /// `None` when there is nothing to compare (no expectation or no meta tag)
    pub fn hash_matches(&self) -> Option<bool> {
        match (&self.expected_build_id, &self.deployment_hash) {
            (Some(expected), Some(actual)) => Some(expected == actual),
            _ => None,
        }
    }

    pub fn sub_checks(&self) -> Vec<SubCheck> {
        vec![
            SubCheck::new("mount element", self.has_mount_marker),
            SubCheck::new("script tag", self.has_script_tag),
            SubCheck::new("hashed JS bundle", self.has_js_bundle),
            SubCheck::new("hashed CSS bundle", self.has_css_bundle),
            SubCheck::new("title tag", self.has_title),
            SubCheck::new("author string", self.has_author),
            SubCheck::new("no source entry reference", !self.has_source_entry),
            SubCheck::new("no dev-server asset", !self.has_dev_asset),
            SubCheck::new("deployment hash", self.hash_matches() != Some(false)),
        ]
    }

    pub fn passed(&self) -> bool {
        self.sub_checks().iter().all(|c| c.passed)
    }

    pub fn to_check_result(&self) -> CheckResult {
        CheckResult::from_sub_checks(&self.url, &self.sub_checks()).with_status(self.http_status)
    }

    /// Status lines for the CI log
    pub fn lines(&self, markers: &MarkerConfig) -> Vec<String> {
        let mark = |ok: bool| if ok { "✅" } else { "❌" };
        let found = |present: bool| if present { "FOUND - BAD!" } else { "not found" };

        let mut lines = vec![
            format!("HTTP Status: {} (after {} attempt(s))", self.http_status, self.attempts),
            String::new(),
            "Structure Checks:".to_string(),
            format!("{} Has {}", mark(self.has_mount_marker), markers.mount_marker),
            format!("{} Has <script> tags", mark(self.has_script_tag)),
            format!("{} Has compiled JS bundle (/assets/*-<hash>.js)", mark(self.has_js_bundle)),
            format!("{} Has compiled CSS bundle (/assets/*-<hash>.css)", mark(self.has_css_bundle)),
            format!("{} Has <title> tag", mark(self.has_title)),
            String::new(),
            "Content Checks:".to_string(),
            format!("{} Contains \"{}\" in HTML", mark(self.has_author), markers.author),
            String::new(),
            "Development File Checks (should be absent):".to_string(),
            format!(
                "{} Does NOT reference {} ({})",
                mark(!self.has_source_entry),
                markers.source_entry,
                found(self.has_source_entry)
            ),
            format!(
                "{} Does NOT reference {} ({})",
                mark(!self.has_dev_asset),
                markers.dev_asset,
                found(self.has_dev_asset)
            ),
        ];

        if let Some(script) = &self.main_script {
            lines.push(String::new());
            lines.push(format!("📦 Main script: {}", script));
        }
        if let Some(css) = &self.main_stylesheet {
            lines.push(format!("🎨 Main CSS: {}", css));
        }

        match (&self.deployment_hash, self.hash_matches()) {
            (Some(hash), Some(true)) => lines.push(format!("✅ Deployment hash matches: {}", hash)),
            (Some(hash), Some(false)) => lines.push(format!(
                "❌ Deployment hash mismatch: expected {}, found {}",
                self.expected_build_id.as_deref().unwrap_or_default(),
                hash
            )),
            (Some(hash), None) => lines.push(format!("ℹ️  Deployment hash: {}", hash)),
            (None, _) => lines.push("⚠️  No deployment-hash meta tag found".to_string()),
        }

        lines
    }

    /// Explanations for a failed verdict
    pub fn diagnostics(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.has_source_entry {
            out.push(SOURCE_DEPLOYED_DIAGNOSTIC.to_string());
        }
        if self.has_dev_asset {
            out.push("🔴 Dev-server template detected; the build output was not published".to_string());
        }
        if self.hash_matches() == Some(false) {
            out.push("🔴 Served page was built from a different commit (stale cache or old deploy)".to_string());
        }
        if self.has_source_entry || self.has_dev_asset {
            return out;
        }
        if !self.passed() {
            out.push("HTML structure is incomplete; check the build output".to_string());
        }
        out
    }
}

/// Fetch `url` until it answers 200, then inspect its structure
pub async fn fetch_structure(
    fetcher: &Fetcher,
    url: &str,
    policy: RetryPolicy,
    markers: &MarkerConfig,
    expected_build_id: Option<&str>,
) -> Result<StructureReport> {
    let attempts = AtomicUsize::new(0);

    let page = retry_fixed(&format!("fetch {}", url), policy, |attempt| {
        attempts.store(attempt, Ordering::SeqCst);
        info!("Fetching {} (attempt {}/{})", url, attempt, policy.max_attempts());
        fetcher.fetch_ok(url)
    })
    .await?;

    let mut report = StructureReport::inspect(&page, markers, expected_build_id)?;
    report.attempts = attempts.load(Ordering::SeqCst);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILT: &str = r#"<!doctype html>
<html>
  <head>
    <title>Daniel Christensen</title>
    <meta name="deployment-hash" content="abc123">
    <script type="module" crossorigin src="/assets/index-a1b2c3d4.js"></script>
    <link rel="stylesheet" crossorigin href="/assets/index-e5f6a7b8.css">
  </head>
  <body><div id="root"></div></body>
</html>"#;

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            url: "https://example.com".to_string(),
            status: 200,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_built_page_passes() {
        let markers = MarkerConfig::default();
        let report = StructureReport::inspect(&page(BUILT), &markers, None).unwrap();

        assert!(report.passed(), "{:?}", report.sub_checks());
        assert_eq!(report.main_script.as_deref(), Some("/assets/index-a1b2c3d4.js"));
        assert_eq!(report.main_stylesheet.as_deref(), Some("/assets/index-e5f6a7b8.css"));
        assert_eq!(report.deployment_hash.as_deref(), Some("abc123"));
        assert!(report.diagnostics().is_empty());
    }

    #[test]
    fn test_source_deploy_is_diagnosed() {
        let markers = MarkerConfig::default();
        let html = BUILT.replace(
            "</body>",
            r#"<script type="module" src="/src/main.jsx"></script></body>"#,
        );
        let report = StructureReport::inspect(&page(&html), &markers, None).unwrap();

        assert!(!report.passed());
        assert!(report
            .diagnostics()
            .iter()
            .any(|d| d.contains("Deploying SOURCE files instead of BUILD")));
    }

    #[test]
    fn test_dev_asset_fails() {
        let markers = MarkerConfig::default();
        let html = BUILT.replace("<title>", r#"<link rel="icon" href="/vite.svg"><title>"#);
        let report = StructureReport::inspect(&page(&html), &markers, None).unwrap();
        assert!(!report.passed());
    }

    #[test]
    fn test_unhashed_bundle_is_not_a_build() {
        let markers = MarkerConfig::default();
        let html = BUILT.replace("index-a1b2c3d4.js", "main.js");
        let report = StructureReport::inspect(&page(&html), &markers, None).unwrap();
        assert!(!report.has_js_bundle);
        assert!(!report.passed());
    }

    #[test]
    fn test_deployment_hash_comparison() {
        let markers = MarkerConfig::default();

        let matching = StructureReport::inspect(&page(BUILT), &markers, Some("abc123")).unwrap();
        assert_eq!(matching.hash_matches(), Some(true));
        assert!(matching.passed());

        let stale = StructureReport::inspect(&page(BUILT), &markers, Some("def456")).unwrap();
        assert_eq!(stale.hash_matches(), Some(false));
        assert!(!stale.passed());

        let untagged = BUILT.replace(r#"<meta name="deployment-hash" content="abc123">"#, "");
        let absent = StructureReport::inspect(&page(&untagged), &markers, Some("def456")).unwrap();
        assert_eq!(absent.hash_matches(), None);
        assert!(absent.passed());
    }
}
