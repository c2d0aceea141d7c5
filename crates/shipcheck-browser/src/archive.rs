//! Screenshot Archiver
//!
//! Visits the fixed route list one by one (fresh tab per route, one shared
//! browser), saves a full-page screenshot per route and writes the
//! `summary.json` hand-off for the report formatter.

use shipcheck_core::{
    ArtifactStore, ConsoleCollector, DeploymentSummary, Result, RouteCheck, RouteResult,
    ShipcheckConfig,
};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::{BrowserConfig, BrowserSession};
use crate::screenshot::capture_to_store;

/// Stem of the summary written next to the screenshots
pub const SUMMARY_NAME: &str = "summary";

/// Run `capture` for every route in order, recording a failed result for
/// routes whose capture errors out
///
/// The returned list always has exactly one entry per route, in route order.
pub async fn visit_routes<F, Fut>(
    base_url: &str,
    routes: &[RouteCheck],
    mut capture: F,
) -> Vec<RouteResult>
where
    F: FnMut(RouteCheck, String) -> Fut,
    Fut: Future<Output = Result<RouteResult>>,
{
    let mut results = Vec::with_capacity(routes.len());

    for route in routes {
        let url = route.url(base_url);
        info!("Capturing: {} ({})", route.name, route.path);

        let result = match capture(route.clone(), url.clone()).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Error capturing {}: {}", route.name, e);
                RouteResult::errored(route, url, e.to_string())
            }
        };
        results.push(result);
    }

    results
}

/// Summary-block lines for one route
pub fn route_lines(result: &RouteResult) -> Vec<String> {
    let verdict = if result.success { "✅ SUCCESS" } else { "❌ FAILED" };
    let mut lines = vec![format!("{} - {}", verdict, result.route)];
    if let Some(status) = result.http_status {
        lines.push(format!("         Status: {}", status));
    }
    if let Some(path) = &result.screenshot_path {
        lines.push(format!("         Screenshot: {}", path.display()));
    }
    if result.console_error_count > 0 {
        lines.push(format!("         Console errors: {}", result.console_error_count));
    }
    if let Some(error) = &result.error {
        lines.push(format!("         Error: {}", error));
    }
    lines
}

/// Archive every configured route and write the summary; returns the summary
/// and where it was written
pub async fn archive_routes(
    config: &ShipcheckConfig,
    base_url: &str,
) -> Result<(DeploymentSummary, PathBuf)> {
    let store = ArtifactStore::new(&config.output.screenshots_dir);
    let session =
        BrowserSession::launch_with_config(BrowserConfig::from_settings(&config.browser)).await?;
    let filter = config.noise_filter();
    let settle = Duration::from_millis(config.browser.archiver_settle_ms);

    let results = visit_routes(base_url, &config.routes, |route, url| {
        let session = &session;
        let store = &store;
        let filter = &filter;
        async move {
            let collector = ConsoleCollector::new();
            let page = session.open_page(collector.clone()).await?;

            page.run(async {
                page.goto(&url).await?;
                let status = page.http_status().await?;
                tokio::time::sleep(settle).await;

                let screenshot = capture_to_store(&page, store, &route.name).await?;
                let entries = collector.snapshot();
                let errors = filter.residual_error_count(&entries);
                for entry in filter.residual_errors(&entries) {
                    warn!("{}: console {}: {}", route.name, entry.kind, entry.text);
                }

                Ok(RouteResult::loaded(&route, url.clone(), status, screenshot.path, errors))
            })
            .await
        }
    })
    .await;

    let summary = DeploymentSummary::new(base_url, results);
    let stored = store.store_json(SUMMARY_NAME, &summary).await?;
    info!("📊 Summary saved: {}", stored.path.display());

    Ok((summary, stored.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipcheck_core::{default_routes, ShipcheckError};

    #[tokio::test]
    async fn test_one_result_per_route_in_order() {
        let routes = default_routes();

        let results = visit_routes("https://example.com/", &routes, |route, url| async move {
            if route.name == "blog" {
                Err(ShipcheckError::Timeout {
                    operation: format!("navigation to {}", url),
                    seconds: 30,
                })
            } else {
                Ok(RouteResult::loaded(
                    &route,
                    url,
                    Some(200),
                    PathBuf::from(format!("{}.png", route.name)),
                    0,
                ))
            }
        })
        .await;

        let names: Vec<&str> = results.iter().map(|r| r.route.as_str()).collect();
        let expected: Vec<&str> = routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, expected);

        assert_eq!(results[1].url, "https://example.com/#/skills");
        assert!(!results[2].success);
        assert!(results[2].error.as_deref().unwrap().contains("navigation"));

        let summary = DeploymentSummary::new("https://example.com", results);
        assert_eq!(summary.totals.total, 5);
        assert_eq!(summary.totals.failed, 1);
        assert!(!summary.all_successful());
    }

    #[tokio::test]
    async fn test_console_errors_fail_a_route() {
        let routes = vec![RouteCheck::new("/", "home")];
        let results = visit_routes("https://example.com", &routes, |route, url| async move {
            Ok(RouteResult::loaded(&route, url, Some(200), PathBuf::from("home.png"), 2))
        })
        .await;

        assert!(!results[0].success);
        assert!(route_lines(&results[0])
            .iter()
            .any(|l| l.contains("Console errors: 2")));
    }
}
