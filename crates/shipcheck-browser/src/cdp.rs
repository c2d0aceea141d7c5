//! Translation of DevTools protocol events into [`ConsoleLogEntry`] values
//!
//! The listener serializes each event's params back to their wire JSON and
//! hands them here, so these functions can be tested with plain fixtures.

use serde_json::Value;
use shipcheck_core::{ConsoleLogEntry, LogKind, SourceLocation};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// `Runtime.consoleAPICalled`
pub fn console_api_entry(params: &Value) -> Option<ConsoleLogEntry> {
    let kind = match params.get("type")?.as_str()? {
        "error" | "assert" => LogKind::Error,
        "warning" => LogKind::Warning,
        "info" => LogKind::Info,
        _ => LogKind::Log,
    };

    let text = params
        .get("args")
        .and_then(Value::as_array)
        .map(|args| {
            args.iter()
                .map(remote_object_text)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let entry = ConsoleLogEntry::new(kind, text);
    let frame = params
        .get("stackTrace")
        .and_then(|st| st.get("callFrames"))
        .and_then(Value::as_array)
        .and_then(|frames| frames.first());

    Some(match frame.and_then(location_of) {
        Some(location) => entry.at(location),
        None => entry,
    })
}

/// `Runtime.exceptionThrown` - an uncaught page error
pub fn exception_entry(params: &Value) -> Option<ConsoleLogEntry> {
    let details = params.get("exceptionDetails")?;

    let text = details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .and_then(|d| d.lines().next())
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("Uncaught exception");

    let entry = ConsoleLogEntry::new(LogKind::PageError, text);
    Some(match location_of(details) {
        Some(location) => entry.at(location),
        None => entry,
    })
}

/// `Log.entryAdded` - browser-generated messages, including failed requests
///
/// Verbose entries (violations and the like) are dropped.
pub fn log_entry(params: &Value) -> Option<ConsoleLogEntry> {
    let entry = params.get("entry")?;
    let source = entry.get("source").and_then(Value::as_str).unwrap_or("other");
    let level = entry.get("level").and_then(Value::as_str)?;
    let text = entry.get("text").and_then(Value::as_str).unwrap_or_default();
    let url = entry.get("url").and_then(Value::as_str).filter(|u| !u.is_empty());

    let kind = match (source, level) {
        ("network", "error") => LogKind::RequestFailed,
        (_, "error") => LogKind::Error,
        (_, "warning") => LogKind::Warning,
        (_, "info") => LogKind::Info,
        _ => return None,
    };

    let text = match (kind, url) {
        (LogKind::RequestFailed, Some(url)) => format!("Failed to load: {} ({})", url, text),
        _ => text.to_string(),
    };

    let log = ConsoleLogEntry::new(kind, text);
    Some(match url {
        Some(url) => match line_number(entry) {
            Some(line) => log.at(SourceLocation::new(url, line, 0)),
            None => log.at(SourceLocation::url_only(url)),
        },
        None => log,
    })
}

/// In-flight request bookkeeping behind the network-idle wait
///
/// Fed from `Network.requestWillBeSent`, `Network.loadingFinished`,
/// `Network.loadingFailed` and `Network.responseReceived`. The page is idle
/// once nothing has been in flight for the whole quiet window.
#[derive(Debug, Clone)]
pub struct NetworkActivity {
    in_flight: HashSet<String>,
    last_change: Instant,
    document_status: Option<u16>,
}

impl NetworkActivity {
    pub fn new(now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
            document_status: None,
        }
    }

    /// Forget the previous document; called right before navigating
    pub fn reset(&mut self, now: Instant) {
        self.in_flight.clear();
        self.last_change = now;
        self.document_status = None;
    }

    /// `Network.requestWillBeSent` (redirects reuse the request id)
    pub fn request_started(&mut self, params: &Value, now: Instant) {
        if let Some(id) = request_id(params) {
            self.in_flight.insert(id.to_string());
            self.last_change = now;
        }
    }

    /// `Network.loadingFinished` or `Network.loadingFailed`
    pub fn request_settled(&mut self, params: &Value, now: Instant) {
        if let Some(id) = request_id(params) {
            if self.in_flight.remove(id) {
                self.last_change = now;
            }
        }
    }

    /// `Network.responseReceived`; the first document response is the page itself
    pub fn response_received(&mut self, params: &Value) {
        if self.document_status.is_some()
            || params.get("type").and_then(Value::as_str) != Some("Document")
        {
            return;
        }
        self.document_status = params
            .get("response")
            .and_then(|r| r.get("status"))
            .and_then(Value::as_f64)
            .map(|s| s as u16);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn document_status(&self) -> Option<u16> {
        self.document_status
    }

    pub fn is_idle(&self, now: Instant, quiet_window: Duration) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_change) >= quiet_window
    }
}

fn request_id(params: &Value) -> Option<&str> {
    params.get("requestId").and_then(Value::as_str)
}

fn remote_object_text(arg: &Value) -> String {
    match arg.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => arg
            .get("description")
            .and_then(Value::as_str)
            .or_else(|| arg.get("type").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        Some(other) => other.to_string(),
    }
}

/// Protocol positions are 0-based; reports use 1-based lines and columns
fn location_of(value: &Value) -> Option<SourceLocation> {
    let url = value.get("url").and_then(Value::as_str).filter(|u| !u.is_empty())?;
    let line = line_number(value).unwrap_or(0);
    let column = value
        .get("columnNumber")
        .and_then(Value::as_u64)
        .map(|c| c as u32 + 1)
        .unwrap_or(0);
    Some(SourceLocation::new(url, line, column))
}

fn line_number(value: &Value) -> Option<u32> {
    value
        .get("lineNumber")
        .and_then(Value::as_u64)
        .map(|l| l as u32 + 1)
}
