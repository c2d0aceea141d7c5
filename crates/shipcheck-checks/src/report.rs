//! Report Formatter - deployment summary to pull-request comment

use shipcheck_core::retry::fail_open;
use shipcheck_core::{DeploymentSummary, Result, ShipcheckError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Name of the rendered comment next to the summary
pub const COMMENT_FILE: &str = "pr-comment.md";
/// Name of the archiver's summary
pub const SUMMARY_FILE: &str = "summary.json";

/// Read the archiver's summary; any failure here is fatal for the formatter
pub async fn load_summary(path: &Path) -> Result<DeploymentSummary> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        ShipcheckError::Report(format!("Could not read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        ShipcheckError::Report(format!("Could not parse {}: {}", path.display(), e))
    })
}

/// Render the Markdown comment; `site_links` are (label, url) pairs
pub fn render_comment(summary: &DeploymentSummary, site_links: &[(String, String)]) -> String {
    let status = if summary.all_successful() {
        "✅ SUCCESS"
    } else {
        "⚠️ WARNING"
    };

    let mut out = String::new();
    out.push_str(&format!("## {} - Deployment Verification Report\n\n", status));
    out.push_str(&format!(
        "**Deployment Time:** {}\n",
        summary.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("**Base URL:** {}\n\n", summary.base_url));

    out.push_str("### Summary\n");
    out.push_str(&format!("- Total Pages: {}\n", summary.totals.total));
    out.push_str(&format!("- ✅ Successful: {}\n", summary.totals.successful));
    out.push_str(&format!("- ❌ Failed: {}\n\n", summary.totals.failed));

    out.push_str("### Page Details\n\n");
    out.push_str("| Page | Status | HTTP Status | Console Errors |\n");
    out.push_str("|------|--------|-------------|----------------|\n");
    for result in &summary.results {
        let icon = if result.success { "✅" } else { "❌" };
        let http = result
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let error = result
            .error
            .as_ref()
            .map(|e| format!("<br>{}", table_cell(e)))
            .unwrap_or_default();
        out.push_str(&format!(
            "| {} | {} | {} | {}{} |\n",
            result.route, icon, http, result.console_error_count, error
        ));
    }

    out.push_str("\n### Screenshots\n\n");
    out.push_str("Screenshots have been captured and attached as artifacts to this workflow run.\n");
    out.push_str("You can download them from the Actions tab.\n\n");

    if !site_links.is_empty() {
        out.push_str("### Deployment URLs\n");
        for (label, url) in site_links {
            out.push_str(&format!("- [{}]({})\n", label, url));
        }
        out.push('\n');
    }

    if !summary.all_successful() {
        out.push_str("### ⚠️ Action Required\n");
        out.push_str(
            "Some pages failed verification. Please check the screenshots and logs for details.\n",
        );
    }

    out
}

/// Keep free text inside one Markdown table cell
fn table_cell(text: &str) -> String {
    text.trim_end()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

pub async fn write_comment(path: &Path, comment: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, comment).await?;
    info!("Comment saved to {}", path.display());
    Ok(path.to_path_buf())
}

/// Append to the CI job summary file; failures are logged, never returned
pub async fn append_step_summary(path: &Path, comment: &str) -> bool {
    fail_open("append CI step summary", move || async move {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(comment.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    })
    .await
    .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipcheck_core::{RouteCheck, RouteResult};
    use tempfile::TempDir;

    fn summary(all_ok: bool) -> DeploymentSummary {
        let home = RouteCheck::new("/", "home");
        let blog = RouteCheck::new("/#/blog", "blog");
        let blog_result = if all_ok {
            RouteResult::loaded(&blog, "u/#/blog", Some(200), PathBuf::from("blog.png"), 0)
        } else {
            RouteResult::errored(&blog, "u/#/blog", "Navigation timeout")
        };
        DeploymentSummary::new(
            "https://example.com",
            vec![
                RouteResult::loaded(&home, "u/", Some(200), PathBuf::from("home.png"), 0),
                blog_result,
            ],
        )
    }

    fn links() -> Vec<(String, String)> {
        vec![("Primary Site".to_string(), "https://example.com".to_string())]
    }

    #[test]
    fn test_success_comment() {
        let comment = render_comment(&summary(true), &links());
        assert!(comment.starts_with("## ✅ SUCCESS - Deployment Verification Report"));
        assert!(comment.contains("| home | ✅ | 200 | 0 |"));
        assert!(comment.contains("- [Primary Site](https://example.com)"));
        assert!(!comment.contains("Action Required"));
    }

    #[test]
    fn test_failure_comment() {
        let comment = render_comment(&summary(false), &links());
        assert!(comment.starts_with("## ⚠️ WARNING"));
        assert!(comment.contains("- ❌ Failed: 1"));
        assert!(comment.contains("| blog | ❌ | N/A | 0<br>Navigation timeout |"));
        assert!(comment.contains("### ⚠️ Action Required"));
    }

    #[test]
    fn test_multiline_error_stays_in_its_row() {
        let mut summary = summary(false);
        summary.results[1].error =
            Some("Browser error: Failed to navigate\ncaused by: net::ERR_CONNECTION_REFUSED | retry".into());

        let comment = render_comment(&summary, &links());
        let row = comment
            .lines()
            .find(|l| l.starts_with("| blog |"))
            .unwrap();
        assert_eq!(
            row,
            "| blog | ❌ | N/A | 0<br>Browser error: Failed to navigate<br>caused by: net::ERR_CONNECTION_REFUSED \\| retry |"
        );
    }

    #[tokio::test]
    async fn test_load_summary_errors_are_report_errors() {
        let temp = TempDir::new().unwrap();
        let missing = load_summary(&temp.path().join(SUMMARY_FILE)).await;
        assert!(matches!(missing, Err(ShipcheckError::Report(_))));

        let path = temp.path().join(SUMMARY_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_summary(&path).await, Err(ShipcheckError::Report(_))));

        std::fs::write(&path, serde_json::to_string(&summary(true)).unwrap()).unwrap();
        assert_eq!(load_summary(&path).await.unwrap().totals.total, 2);
    }

    #[tokio::test]
    async fn test_step_summary_appends() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("step-summary.md");
        std::fs::write(&path, "existing\n").unwrap();

        assert!(append_step_summary(&path, "comment").await);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\ncomment");

        let unwritable = temp.path().join("missing-dir/summary.md");
        assert!(!append_step_summary(&unwritable, "comment").await);
    }
}
