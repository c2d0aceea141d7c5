//! Browser-Driven Verifier
//!
//! Loads one page in a real browser and judges it along independent axes:
//! HTTP status, DOM structure, blank-render heuristic and residual console
//! errors. Every failed axis feeds the same final boolean; the JSON report
//! says which one tripped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shipcheck_core::{
    ArtifactStore, CheckResult, ConsoleCollector, ConsoleLogEntry, LogKind, NoiseFilter, Result,
    ShipcheckConfig, SubCheck,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::browser::{BrowserConfig, BrowserSession, DomProbe};
use crate::screenshot::{capture_to_store, BlankScreenHeuristic};

/// Stem of the verifier's screenshot
pub const SCREENSHOT_NAME: &str = "deployed-site-test";
/// Stem of the verifier's JSON report
pub const REPORT_NAME: &str = "deployment-test-report";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomChecks {
    pub root_visible: bool,
    pub has_heading: bool,
    pub has_navigation: bool,
    pub has_author: bool,
}

impl DomChecks {
    pub fn all_passed(&self) -> bool {
        self.root_visible && self.has_heading && self.has_navigation && self.has_author
    }
}

impl From<&DomProbe> for DomChecks {
    fn from(probe: &DomProbe) -> Self {
        Self {
            root_visible: probe.mount_visible,
            has_heading: probe.heading_count > 0,
            has_navigation: probe.navigation_count > 0,
            has_author: probe.has_author,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotCheck {
    pub path: Option<PathBuf>,
    pub size_bytes: u64,
    pub is_blank: bool,
    pub threshold_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleSummary {
    /// Errors left after the denylist
    pub errors: usize,
    pub warnings: usize,
    /// Errors attributed to denylisted hosts
    pub ignored: usize,
    pub error_messages: Vec<String>,
}

impl ConsoleSummary {
    pub fn from_entries(entries: &[ConsoleLogEntry], filter: &NoiseFilter) -> Self {
        let residual = filter.residual_errors(entries);
        let total_errors = entries.iter().filter(|e| e.kind.is_error()).count();

        Self {
            errors: residual.len(),
            warnings: entries.iter().filter(|e| e.kind == LogKind::Warning).count(),
            ignored: total_errors - residual.len(),
            error_messages: residual.iter().map(|e| e.text.clone()).collect(),
        }
    }
}

/// Everything observed about the page, before judging it
#[derive(Debug, Clone)]
pub struct PageProbe {
    pub url: String,
    pub http_status: Option<u16>,
    pub dom: DomChecks,
    pub screenshot_path: Option<PathBuf>,
    pub screenshot_bytes: u64,
}

/// Which axis decided the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    HttpStatus,
    BlankScreen,
    RenderingIssues,
    ConsoleErrors,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub http_status: Option<u16>,
    pub checks: DomChecks,
    pub screenshot: ScreenshotCheck,
    pub console: ConsoleSummary,
    pub verdict: Verdict,
    pub result: CheckResult,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.result.passed
    }

    pub fn lines(&self) -> Vec<String> {
        let mark = |ok: bool| if ok { "✅" } else { "❌" };
        let status = self
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let mut lines = vec![
            format!("{} HTTP Status: {}", mark(self.http_status == Some(200)), status),
            format!("{} Root element visible: {}", mark(self.checks.root_visible), self.checks.root_visible),
            format!("{} Has h1 heading: {}", mark(self.checks.has_heading), self.checks.has_heading),
            format!("{} Has navigation: {}", mark(self.checks.has_navigation), self.checks.has_navigation),
            format!("{} Contains author: {}", mark(self.checks.has_author), self.checks.has_author),
            format!(
                "📊 Screenshot size: {:.2} KB (threshold {} bytes)",
                self.screenshot.size_bytes as f64 / 1024.0,
                self.screenshot.threshold_bytes
            ),
        ];

        if self.screenshot.is_blank {
            lines.push("   ❌ BLANK SCREEN DETECTED (tiny file size)".to_string());
        } else {
            lines.push("   ✅ Content detected (reasonable file size)".to_string());
        }

        lines.push(String::new());
        lines.push("📋 Console Messages:".to_string());
        if self.console.errors == 0 {
            lines.push("   ✅ No console errors".to_string());
        } else {
            lines.push(format!("   ❌ {} console errors:", self.console.errors));
            for (i, message) in self.console.error_messages.iter().enumerate() {
                lines.push(format!("      {}. {}", i + 1, message));
            }
        }
        if self.console.ignored > 0 {
            lines.push(format!(
                "   ⏭️  {} errors from denylisted hosts ignored",
                self.console.ignored
            ));
        }
        if self.console.warnings > 0 {
            lines.push(format!("   ⚠️  {} console warnings", self.console.warnings));
        }

        lines
    }

    pub fn verdict_lines(&self) -> Vec<&'static str> {
        match self.verdict {
            Verdict::Pass => vec![
                "✅ PASS: Site is working correctly - NO blank screen",
                "   - All content checks passed",
                "   - Screenshot shows content (not blank)",
                "   - No console errors",
            ],
            Verdict::HttpStatus => vec!["❌ FAIL: Unexpected HTTP status for the deployed page"],
            Verdict::ConsoleErrors => vec![
                "⚠️  WARNING: Site renders but has console errors",
                "   - Content is visible",
                "   - But console errors should be investigated",
            ],
            Verdict::BlankScreen => vec![
                "❌ FAIL: BLANK WHITE SCREEN DETECTED",
                "   - Screenshot file is below the blank threshold",
                "   - This indicates a critical rendering issue",
            ],
            Verdict::RenderingIssues => vec![
                "❌ FAIL: Site has rendering issues",
                "   - Some content checks failed",
            ],
        }
    }
}

/// Judge a probed page
pub fn evaluate(
    probe: PageProbe,
    entries: &[ConsoleLogEntry],
    filter: &NoiseFilter,
    heuristic: BlankScreenHeuristic,
) -> VerificationReport {
    let console = ConsoleSummary::from_entries(entries, filter);
    let is_blank = heuristic.is_blank(probe.screenshot_bytes);
    let status_ok = probe.http_status == Some(200);

    let sub_checks = [
        SubCheck::new("http status", status_ok),
        SubCheck::new("root visible", probe.dom.root_visible),
        SubCheck::new("heading", probe.dom.has_heading),
        SubCheck::new("navigation", probe.dom.has_navigation),
        SubCheck::new("author", probe.dom.has_author),
        SubCheck::new("not blank", !is_blank),
        SubCheck::new("console errors", console.errors == 0),
    ];

    let verdict = if !status_ok {
        Verdict::HttpStatus
    } else if is_blank {
        Verdict::BlankScreen
    } else if !probe.dom.all_passed() {
        Verdict::RenderingIssues
    } else if console.errors > 0 {
        Verdict::ConsoleErrors
    } else {
        Verdict::Pass
    };

    let mut result = CheckResult::from_sub_checks(&probe.url, &sub_checks);
    if let Some(status) = probe.http_status {
        result = result.with_status(status);
    }

    VerificationReport {
        url: probe.url,
        timestamp: Utc::now(),
        http_status: probe.http_status,
        checks: probe.dom,
        screenshot: ScreenshotCheck {
            path: probe.screenshot_path,
            size_bytes: probe.screenshot_bytes,
            is_blank,
            threshold_bytes: heuristic.threshold_bytes,
        },
        console,
        verdict,
        result,
    }
}

/// Load `url` in a fresh browser, judge it and write the screenshot and JSON report
///
/// With `wait_for_propagation` the configured CDN propagation delay is slept first.
pub async fn verify_deployment(
    config: &ShipcheckConfig,
    url: &str,
    wait_for_propagation: bool,
) -> Result<VerificationReport> {
    if wait_for_propagation {
        let delay = Duration::from_secs(config.browser.propagation_delay_secs);
        info!("Waiting {:?} for deployment to propagate", delay);
        tokio::time::sleep(delay).await;
    }

    let store = ArtifactStore::new(&config.output.results_dir);
    let session =
        BrowserSession::launch_with_config(BrowserConfig::from_settings(&config.browser)).await?;
    let collector = ConsoleCollector::new();
    let page = session.open_page(collector.clone()).await?;

    info!("📡 Loading {}", url);
    let (http_status, dom, screenshot) = page
        .run(async {
            page.goto(url).await?;
            tokio::time::sleep(Duration::from_millis(config.browser.verifier_settle_ms)).await;

            let http_status = page.http_status().await?;
            let dom = page
                .probe_dom(&config.markers.mount_selector, &config.markers.author)
                .await?;
            let screenshot = capture_to_store(&page, &store, SCREENSHOT_NAME).await?;
            Ok((http_status, dom, screenshot))
        })
        .await?;
    let entries = collector.snapshot();

    let report = evaluate(
        PageProbe {
            url: url.to_string(),
            http_status,
            dom: DomChecks::from(&dom),
            screenshot_path: Some(screenshot.path),
            screenshot_bytes: screenshot.size_bytes,
        },
        &entries,
        &config.noise_filter(),
        BlankScreenHeuristic::new(config.browser.blank_threshold_bytes),
    );

    let stored = store.store_json(REPORT_NAME, &report).await?;
    info!("📄 Report saved: {}", stored.path.display());

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipcheck_core::SourceLocation;

    fn healthy_probe(screenshot_bytes: u64) -> PageProbe {
        PageProbe {
            url: "https://example.com".to_string(),
            http_status: Some(200),
            dom: DomChecks {
                root_visible: true,
                has_heading: true,
                has_navigation: true,
                has_author: true,
            },
            screenshot_path: None,
            screenshot_bytes,
        }
    }

    fn error_from(url: &str) -> ConsoleLogEntry {
        ConsoleLogEntry::new(LogKind::Error, "Failed to load resource")
            .at(SourceLocation::new(url, 1, 1))
    }

    #[test]
    fn test_healthy_page_passes() {
        let report = evaluate(
            healthy_probe(48_000),
            &[],
            &NoiseFilter::default(),
            BlankScreenHeuristic::default(),
        );
        assert!(report.passed());
        assert_eq!(report.verdict, Verdict::Pass);
    }

    #[test]
    fn test_small_screenshot_is_blank_even_with_good_dom() {
        let report = evaluate(
            healthy_probe(3000),
            &[],
            &NoiseFilter::default(),
            BlankScreenHeuristic::default(),
        );
        assert!(!report.passed());
        assert!(report.screenshot.is_blank);
        assert_eq!(report.verdict, Verdict::BlankScreen);
    }

    #[test]
    fn test_denylisted_errors_do_not_fail() {
        let entries = vec![
            error_from("https://fonts.gstatic.com/s/inter.woff2"),
            ConsoleLogEntry::new(LogKind::Warning, "deprecated API"),
        ];
        let report = evaluate(
            healthy_probe(48_000),
            &entries,
            &NoiseFilter::default(),
            BlankScreenHeuristic::default(),
        );
        assert!(report.passed());
        assert_eq!(report.console.ignored, 1);
        assert_eq!(report.console.warnings, 1);
    }

    #[test]
    fn test_residual_errors_fail() {
        let entries = vec![error_from("https://example.com/assets/index-a1b2c3.js")];
        let report = evaluate(
            healthy_probe(48_000),
            &entries,
            &NoiseFilter::default(),
            BlankScreenHeuristic::default(),
        );
        assert!(!report.passed());
        assert_eq!(report.verdict, Verdict::ConsoleErrors);
        assert_eq!(report.console.error_messages, vec!["Failed to load resource"]);
    }

    #[test]
    fn test_missing_structure_fails() {
        let mut probe = healthy_probe(48_000);
        probe.dom.has_navigation = false;
        let report = evaluate(probe, &[], &NoiseFilter::default(), BlankScreenHeuristic::default());
        assert_eq!(report.verdict, Verdict::RenderingIssues);
        assert_eq!(
            report.result.error_message.as_deref(),
            Some("failed checks: navigation")
        );
    }

    #[test]
    fn test_non_200_status_fails() {
        let mut probe = healthy_probe(48_000);
        probe.http_status = Some(404);
        let report = evaluate(probe, &[], &NoiseFilter::default(), BlankScreenHeuristic::default());
        assert_eq!(report.verdict, Verdict::HttpStatus);
        assert_eq!(report.result.http_status, Some(404));
    }

    #[test]
    fn test_report_json_shape() {
        let report = evaluate(
            healthy_probe(48_000),
            &[],
            &NoiseFilter::default(),
            BlankScreenHeuristic::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["httpStatus"], 200);
        assert_eq!(json["checks"]["rootVisible"], true);
        assert_eq!(json["screenshot"]["thresholdBytes"], 5000);
        assert_eq!(json["console"]["errors"], 0);
        assert_eq!(json["result"]["passed"], true);
    }
}
