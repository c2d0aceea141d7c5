//! Multi-route console checker
//!
//! Visits every route against a base URL (usually the local preview server),
//! accumulates console output across the whole run and writes a timestamped
//! text report.

use chrono::Utc;
use shipcheck_core::console::{render_text_report, report_file_name, ConsoleReportHeader};
use shipcheck_core::{
    ArtifactStore, ArtifactType, ConsoleCollector, ConsoleLogEntry, LogKind, Result,
    ShipcheckConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::browser::{BrowserConfig, BrowserSession};

/// Default target: the bundler's local preview server
pub const DEFAULT_PREVIEW_URL: &str = "http://localhost:4173";

#[derive(Debug, Clone)]
pub struct ConsoleCheckReport {
    pub base_url: String,
    pub entries: Vec<ConsoleLogEntry>,
    pub residual_errors: usize,
    pub report_path: PathBuf,
}

impl ConsoleCheckReport {
    pub fn passed(&self) -> bool {
        self.residual_errors == 0
    }

    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}

pub async fn check_console(config: &ShipcheckConfig, base_url: &str) -> Result<ConsoleCheckReport> {
    let session =
        BrowserSession::launch_with_config(BrowserConfig::from_settings(&config.browser)).await?;
    let filter = config.noise_filter();
    let settle = Duration::from_millis(config.browser.archiver_settle_ms);
    let collector = ConsoleCollector::new();

    // Hash-only navigations fire no load events, so every route gets its own
    // tab; all tabs feed the one collector until they are closed.
    for route in &config.routes {
        let url = route.url(base_url);
        info!("📄 Testing route: {}", route.path);

        let visited = async {
            let page = session.open_page(collector.clone()).await?;
            page.run(async {
                page.goto(&url).await?;
                tokio::time::sleep(settle).await;
                Ok(())
            })
            .await
        }
        .await;

        if let Err(e) = visited {
            warn!("Route {} failed: {}", route.path, e);
            collector.record(ConsoleLogEntry::new(
                LogKind::PageError,
                format!("Failed to load route {}: {}", url, e),
            ));
        }
    }

    let entries = collector.snapshot();
    for entry in entries.iter().filter(|e| filter.is_noise(e)) {
        debug!("Skipping denylisted host: {}", entry.text);
    }

    let generated_at = Utc::now();
    let text = render_text_report(
        &ConsoleReportHeader {
            target_url: base_url.to_string(),
            generated_at,
            expected_build_id: config.expected_build_id.clone(),
        },
        &entries,
        &filter,
    );

    let file_name = report_file_name(generated_at);
    let store = ArtifactStore::new(&config.output.results_dir);
    let stored = store
        .store_text(
            file_name.trim_end_matches(".txt"),
            ArtifactType::ConsoleLog,
            &text,
        )
        .await?;
    info!("📝 Console log saved to: {}", stored.path.display());

    Ok(ConsoleCheckReport {
        base_url: base_url.to_string(),
        residual_errors: filter.residual_error_count(&entries),
        entries,
        report_path: stored.path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipcheck_core::SourceLocation;

    fn report(entries: Vec<ConsoleLogEntry>, residual_errors: usize) -> ConsoleCheckReport {
        ConsoleCheckReport {
            base_url: DEFAULT_PREVIEW_URL.to_string(),
            entries,
            residual_errors,
            report_path: PathBuf::from("console.txt"),
        }
    }

    #[test]
    fn test_pass_depends_on_residual_errors_only() {
        let noise = ConsoleLogEntry::new(LogKind::RequestFailed, "Failed to load")
            .at(SourceLocation::url_only("https://fonts.googleapis.com/css"));
        let warning = ConsoleLogEntry::new(LogKind::Warning, "slow");

        let clean = report(vec![noise, warning], 0);
        assert!(clean.passed());
        assert_eq!(clean.count(LogKind::Warning), 1);

        assert!(!report(Vec::new(), 1).passed());
    }
}
