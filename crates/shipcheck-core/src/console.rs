//! Console event collection, noise filtering and categorisation
//!
//! A [`ConsoleCollector`] is created per verification run and handed (by
//! clone) to each browser listener. Everything that decides pass/fail from the
//! collected entries is a pure function of the entries and a [`NoiseFilter`].

use crate::types::{ConsoleLogEntry, LogKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use url::Url;

/// Hostname denylist for known third-party noise
///
/// A host matches an entry when it equals the entry or is a subdomain of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseFilter {
    pub hosts: Vec<String>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new(default_noise_hosts())
    }
}

/// Font CDNs that are expected to fail in sandboxed or offline runs
pub fn default_noise_hosts() -> Vec<String> {
    vec![
        "fonts.googleapis.com".to_string(),
        "fonts.gstatic.com".to_string(),
        "googleapis.com".to_string(),
        "gstatic.com".to_string(),
    ]
}

impl NoiseFilter {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts: hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect(),
        }
    }

    /// Filter that ignores nothing
    pub fn none() -> Self {
        Self { hosts: Vec::new() }
    }

    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|denied| {
            host == *denied
                || host
                    .strip_suffix(denied.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Whether an entry originates from a denylisted host
    ///
    /// Entries without a parseable source URL are never noise.
    pub fn is_noise(&self, entry: &ConsoleLogEntry) -> bool {
        entry
            .source_location
            .as_ref()
            .and_then(|loc| Url::parse(&loc.url).ok())
            .and_then(|url| url.host_str().map(|h| self.matches_host(h)))
            .unwrap_or(false)
    }

    /// Error entries that survive the denylist
    pub fn residual_errors<'a>(&self, entries: &'a [ConsoleLogEntry]) -> Vec<&'a ConsoleLogEntry> {
        entries
            .iter()
            .filter(|e| e.kind.is_error() && !self.is_noise(e))
            .collect()
    }

    /// Count of error entries that survive the denylist
    pub fn residual_error_count(&self, entries: &[ConsoleLogEntry]) -> usize {
        entries
            .iter()
            .filter(|e| e.kind.is_error() && !self.is_noise(e))
            .count()
    }
}

/// Shared accumulator for one verification run
#[derive(Debug, Clone, Default)]
pub struct ConsoleCollector {
    entries: Arc<Mutex<Vec<ConsoleLogEntry>>>,
}

impl ConsoleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: ConsoleLogEntry) {
        debug!("captured {}: {}", entry.kind, entry.text);
        self.lock().push(entry);
    }

    /// Copy of every entry recorded so far
    pub fn snapshot(&self) -> Vec<ConsoleLogEntry> {
        self.lock().clone()
    }

    /// Number of entries recorded so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A listener that panicked mid-push still leaves every earlier entry valid.
    fn lock(&self) -> MutexGuard<'_, Vec<ConsoleLogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reporting category of an error entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NotFound,
    FrameworkWarning,
    Network,
    JavaScript,
    Other,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 5] = [
        ErrorCategory::NotFound,
        ErrorCategory::FrameworkWarning,
        ErrorCategory::Network,
        ErrorCategory::JavaScript,
        ErrorCategory::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "404 ERRORS",
            ErrorCategory::FrameworkWarning => "REACT WARNINGS",
            ErrorCategory::Network => "NETWORK ERRORS",
            ErrorCategory::JavaScript => "JAVASCRIPT ERRORS",
            ErrorCategory::Other => "OTHER",
        }
    }

    /// Classify an entry; the first matching rule wins
    pub fn classify(entry: &ConsoleLogEntry) -> Self {
        let text = entry.text.to_lowercase();

        if text.contains("404") || text.contains("not found") {
            ErrorCategory::NotFound
        } else if text.contains("react") || text.contains("warning") {
            ErrorCategory::FrameworkWarning
        } else if entry.kind == LogKind::RequestFailed || text.contains("failed to load") {
            ErrorCategory::Network
        } else if entry.kind == LogKind::PageError || text.contains("error") {
            ErrorCategory::JavaScript
        } else {
            ErrorCategory::Other
        }
    }
}

/// Group error entries by category, preserving their order within a group
pub fn categorize<'a>(
    errors: impl IntoIterator<Item = &'a ConsoleLogEntry>,
) -> Vec<(ErrorCategory, Vec<&'a ConsoleLogEntry>)> {
    let mut groups: Vec<(ErrorCategory, Vec<&ConsoleLogEntry>)> =
        ErrorCategory::ALL.iter().map(|c| (*c, Vec::new())).collect();

    for entry in errors {
        let category = ErrorCategory::classify(entry);
        if let Some((_, group)) = groups.iter_mut().find(|(c, _)| *c == category) {
            group.push(entry);
        }
    }

    groups.retain(|(_, group)| !group.is_empty());
    groups
}

/// Header information for a console text report
#[derive(Debug, Clone)]
pub struct ConsoleReportHeader {
    pub target_url: String,
    pub generated_at: DateTime<Utc>,
    pub expected_build_id: Option<String>,
}

/// Render the free-text console log report
pub fn render_text_report(
    header: &ConsoleReportHeader,
    entries: &[ConsoleLogEntry],
    filter: &NoiseFilter,
) -> String {
    let rule = "=".repeat(80);
    let thin = "-".repeat(80);

    let errors: Vec<&ConsoleLogEntry> = entries.iter().filter(|e| e.kind.is_error()).collect();
    let ignored = errors.iter().filter(|e| filter.is_noise(e)).count();
    let count = |kind: LogKind| entries.iter().filter(|e| e.kind == kind).count();

    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nCONSOLE LOG REPORT\n{rule}\n");
    let _ = writeln!(out, "Deployment URL: {}", header.target_url);
    let _ = writeln!(out, "Test Date: {}", header.generated_at.to_rfc3339());
    if let Some(build_id) = &header.expected_build_id {
        let _ = writeln!(out, "Expected Hash: {}", build_id);
    }

    let _ = writeln!(out, "\nSUMMARY:\n{thin}");
    let _ = writeln!(out, "Total Errors: {}", errors.len());
    let _ = writeln!(out, "Ignored (denylisted hosts): {}", ignored);
    let _ = writeln!(out, "Total Warnings: {}", count(LogKind::Warning));
    let _ = writeln!(out, "Total Info: {}", count(LogKind::Info));
    let _ = writeln!(out, "Total Logs: {}", count(LogKind::Log));

    for (category, group) in categorize(filter.residual_errors(entries)) {
        let _ = writeln!(out, "\n{} ({}):\n{rule}", category.label(), group.len());
        for (i, entry) in group.iter().enumerate() {
            write_entry(&mut out, i + 1, entry, true);
            let _ = writeln!(out, "{thin}");
        }
    }

    let warnings: Vec<&ConsoleLogEntry> =
        entries.iter().filter(|e| e.kind == LogKind::Warning).collect();
    if !warnings.is_empty() {
        let _ = writeln!(out, "\n\nWARNINGS:\n{rule}");
        for (i, entry) in warnings.iter().enumerate() {
            write_entry(&mut out, i + 1, entry, false);
            let _ = writeln!(out, "{thin}");
        }
    }

    out
}

fn write_entry(out: &mut String, index: usize, entry: &ConsoleLogEntry, with_kind: bool) {
    let _ = writeln!(out, "\n[{}] {}", index, entry.timestamp.to_rfc3339());
    if with_kind {
        let _ = writeln!(out, "Type: {}", entry.kind);
    }
    let _ = writeln!(out, "Message: {}", entry.text);
    if let Some(location) = &entry.source_location {
        let _ = writeln!(out, "Location: {}", location);
    }
}

/// File name for a timestamped console report (`console-2025-01-31T12-00-00.txt`)
pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("console-{}.txt", at.format("%Y-%m-%dT%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceLocation;

    fn error_from(url: &str) -> ConsoleLogEntry {
        ConsoleLogEntry::new(LogKind::Error, "Failed to load resource")
            .at(SourceLocation::new(url, 1, 1))
    }

    #[test]
    fn test_noise_filter_host_matching() {
        let filter = NoiseFilter::default();
        assert!(filter.matches_host("fonts.gstatic.com"));
        assert!(filter.matches_host("fonts.googleapis.com"));
        assert!(filter.matches_host("FONTS.GSTATIC.COM"));
        assert!(!filter.matches_host("example.com"));
        assert!(!filter.matches_host("notgstatic.com"));
        assert!(!filter.matches_host("gstatic.com.evil.net"));
    }

    #[test]
    fn test_font_cdn_error_is_excluded() {
        let filter = NoiseFilter::default();
        let entries = vec![
            error_from("https://fonts.gstatic.com/s/inter/v12/font.woff2"),
            error_from("https://example.com/assets/index-D8fK2aQx.js"),
        ];
        assert!(filter.is_noise(&entries[0]));
        assert!(!filter.is_noise(&entries[1]));
        assert_eq!(filter.residual_error_count(&entries), 1);
    }

    #[test]
    fn test_entries_without_location_are_kept() {
        let filter = NoiseFilter::default();
        let entries = vec![
            ConsoleLogEntry::new(LogKind::PageError, "TypeError: x is undefined"),
            ConsoleLogEntry::new(LogKind::Error, "boom").at(SourceLocation::new("not a url", 0, 0)),
        ];
        assert_eq!(filter.residual_error_count(&entries), 2);
    }

    #[test]
    fn test_residual_count_is_order_independent() {
        let filter = NoiseFilter::default();
        let mut entries = vec![
            error_from("https://fonts.googleapis.com/css2?family=Inter"),
            error_from("https://example.com/a.js"),
            ConsoleLogEntry::new(LogKind::Warning, "deprecated"),
            ConsoleLogEntry::new(LogKind::RequestFailed, "Failed to load: https://example.com/x.png")
                .at(SourceLocation::url_only("https://example.com/x.png")),
            error_from("https://fonts.gstatic.com/s/font.woff2"),
        ];
        let forward = filter.residual_error_count(&entries);
        entries.reverse();
        let backward = filter.residual_error_count(&entries);
        entries.rotate_left(2);
        let rotated = filter.residual_error_count(&entries);

        assert_eq!(forward, 2);
        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
        assert_eq!(filter.residual_error_count(&entries), forward);
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let entries = vec![error_from("https://fonts.gstatic.com/s/font.woff2")];
        assert_eq!(NoiseFilter::none().residual_error_count(&entries), 1);
    }

    #[test]
    fn test_collector_shared_between_clones() {
        let collector = ConsoleCollector::new();
        let listener = collector.clone();
        listener.record(ConsoleLogEntry::new(LogKind::Error, "one"));
        listener.record(ConsoleLogEntry::new(LogKind::Log, "two"));

        assert_eq!(collector.len(), 2);
        assert_eq!(listener.snapshot().len(), 2);
    }

    #[test]
    fn test_collector_survives_poisoned_lock() {
        let collector = ConsoleCollector::new();
        collector.record(ConsoleLogEntry::new(LogKind::PageError, "Uncaught TypeError"));

        let poisoner = collector.clone();
        let outcome = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("listener panicked while holding the lock");
        })
        .join();
        assert!(outcome.is_err());

        collector.record(ConsoleLogEntry::new(LogKind::Error, "after panic"));
        let entries = collector.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(NoiseFilter::default().residual_error_count(&entries), 2);
    }

    #[test]
    fn test_classification_rules() {
        let classify = |kind, text: &str| ErrorCategory::classify(&ConsoleLogEntry::new(kind, text));

        assert_eq!(
            classify(LogKind::Error, "GET /missing 404 (Not Found)"),
            ErrorCategory::NotFound
        );
        assert_eq!(
            classify(LogKind::Error, "Warning: Each child in a list should have a unique key"),
            ErrorCategory::FrameworkWarning
        );
        assert_eq!(
            classify(LogKind::RequestFailed, "net::ERR_CONNECTION_REFUSED"),
            ErrorCategory::Network
        );
        assert_eq!(
            classify(LogKind::PageError, "x is undefined"),
            ErrorCategory::JavaScript
        );
        assert_eq!(
            classify(LogKind::Error, "Uncaught TypeError"),
            ErrorCategory::JavaScript
        );
        assert_eq!(classify(LogKind::Error, "something odd"), ErrorCategory::Other);
    }

    #[test]
    fn test_categorize_skips_empty_groups() {
        let entries = vec![
            ConsoleLogEntry::new(LogKind::PageError, "x is undefined"),
            ConsoleLogEntry::new(LogKind::Error, "404"),
            ConsoleLogEntry::new(LogKind::PageError, "y is undefined"),
        ];
        let groups = categorize(&entries);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, ErrorCategory::NotFound);
        assert_eq!(groups[1].0, ErrorCategory::JavaScript);
        assert_eq!(groups[1].1.len(), 2);
    }

    #[test]
    fn test_text_report_sections() {
        let header = ConsoleReportHeader {
            target_url: "https://example.com".to_string(),
            generated_at: Utc::now(),
            expected_build_id: Some("abc123".to_string()),
        };
        let entries = vec![
            error_from("https://fonts.gstatic.com/s/font.woff2"),
            ConsoleLogEntry::new(LogKind::PageError, "x is undefined"),
            ConsoleLogEntry::new(LogKind::Warning, "deprecated API"),
        ];
        let report = render_text_report(&header, &entries, &NoiseFilter::default());

        assert!(report.contains("CONSOLE LOG REPORT"));
        assert!(report.contains("Expected Hash: abc123"));
        assert!(report.contains("Total Errors: 2"));
        assert!(report.contains("Ignored (denylisted hosts): 1"));
        assert!(report.contains("JAVASCRIPT ERRORS (1):"));
        assert!(!report.contains("NETWORK ERRORS"));
        assert!(report.contains("WARNINGS:"));
        assert!(report.contains("Message: deprecated API"));
    }

    #[test]
    fn test_report_file_name() {
        let at = DateTime::parse_from_rfc3339("2025-01-31T12:34:56Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(report_file_name(at), "console-2025-01-31T12-34-56.txt");
    }
}
