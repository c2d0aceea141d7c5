//! Browser lifecycle management using Chrome DevTools Protocol
//!
//! One [`BrowserSession`] per run. Each [`BrowserPage`] is a tab whose console,
//! exception, log and network events feed a [`PageEvents`] sink until the
//! page is closed.

use headless_chrome::browser::tab::EventListener;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shipcheck_core::config::BrowserSettings;
use shipcheck_core::{ConsoleCollector, ConsoleLogEntry, Result, ShipcheckError};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cdp::{self, NetworkActivity};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

type PageListener = dyn EventListener<Event> + Send + Sync;

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Bound on navigation plus network-idle wait
    pub navigation_timeout: Duration,
    /// Quiet window after which the network counts as idle
    pub network_idle: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self::from_settings(&BrowserSettings::default())
    }
}

impl BrowserConfig {
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        Self {
            headless: true,
            window_width: settings.window_width,
            window_height: settings.window_height,
            navigation_timeout: Duration::from_secs(settings.navigation_timeout_secs),
            network_idle: Duration::from_millis(settings.network_idle_ms),
        }
    }
}

/// Active browser instance
pub struct BrowserSession {
    browser: Browser,
    config: BrowserConfig,
}

impl BrowserSession {
    pub async fn launch_with_config(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            config.headless, config.window_width, config.window_height
        );

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .build()
            .map_err(|e| ShipcheckError::Browser(format!("Invalid launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| ShipcheckError::Browser(format!("Failed to launch browser: {}", e)))?;

        info!("Browser launched successfully");
        Ok(Self { browser, config })
    }

    /// Open a fresh tab whose console output lands in `collector`
    pub async fn open_page(&self, collector: ConsoleCollector) -> Result<BrowserPage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| ShipcheckError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.config.navigation_timeout);

        let events = PageEvents::new(collector);
        let listener = match attach_listeners(&tab, events.clone()) {
            Ok(listener) => listener,
            Err(e) => {
                if let Err(close_err) = tab.close(false) {
                    debug!("Failed to close tab after listener error: {}", close_err);
                }
                return Err(e);
            }
        };

        Ok(BrowserPage {
            tab,
            events,
            listener,
            navigation_timeout: self.config.navigation_timeout,
            network_idle: self.config.network_idle,
        })
    }
}

/// Destination of one tab's events
///
/// Once detached, late events from the tab no longer reach the shared
/// collector.
#[derive(Clone)]
pub struct PageEvents {
    collector: ConsoleCollector,
    network: Arc<Mutex<NetworkActivity>>,
    attached: Arc<AtomicBool>,
}

impl PageEvents {
    pub fn new(collector: ConsoleCollector) -> Self {
        Self {
            collector,
            network: Arc::new(Mutex::new(NetworkActivity::new(Instant::now()))),
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn record(&self, entry: Option<ConsoleLogEntry>) {
        if let Some(entry) = entry {
            if self.is_attached() {
                self.collector.record(entry);
            }
        }
    }

    pub fn network(&self) -> MutexGuard<'_, NetworkActivity> {
        self.network.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn on_event(&self, event: &Event) {
        let now = Instant::now();
        match event {
            Event::RuntimeConsoleAPICalled(e) => {
                self.record(wire(&e.params).and_then(|p| cdp::console_api_entry(&p)))
            }
            Event::RuntimeExceptionThrown(e) => {
                self.record(wire(&e.params).and_then(|p| cdp::exception_entry(&p)))
            }
            Event::LogEntryAdded(e) => self.record(wire(&e.params).and_then(|p| cdp::log_entry(&p))),
            Event::NetworkRequestWillBeSent(e) => {
                if let Some(p) = wire(&e.params) {
                    self.network().request_started(&p, now);
                }
            }
            Event::NetworkLoadingFinished(e) => {
                if let Some(p) = wire(&e.params) {
                    self.network().request_settled(&p, now);
                }
            }
            Event::NetworkLoadingFailed(e) => {
                if let Some(p) = wire(&e.params) {
                    self.network().request_settled(&p, now);
                }
            }
            Event::NetworkResponseReceived(e) => {
                if let Some(p) = wire(&e.params) {
                    self.network().response_received(&p);
                }
            }
            _ => {}
        }
    }
}

fn wire<T: Serialize>(params: &T) -> Option<Value> {
    serde_json::to_value(params).ok()
}

fn attach_listeners(tab: &Arc<Tab>, events: PageEvents) -> Result<Weak<PageListener>> {
    tab.enable_runtime()
        .map_err(|e| ShipcheckError::Browser(format!("Failed to enable Runtime domain: {}", e)))?;
    tab.enable_log()
        .map_err(|e| ShipcheckError::Browser(format!("Failed to enable Log domain: {}", e)))?;
    tab.call_method(Network::Enable {
        max_total_buffer_size: None,
        max_resource_buffer_size: None,
        max_post_data_size: None,
        report_direct_socket_traffic: None,
        enable_durable_messages: None,
    })
    .map_err(|e| ShipcheckError::Browser(format!("Failed to enable Network domain: {}", e)))?;

    let listener: Arc<PageListener> = Arc::new(move |event: &Event| events.on_event(event));

    tab.add_event_listener(listener)
        .map_err(|e| ShipcheckError::Browser(format!("Failed to attach listener: {}", e)))
}

/// DOM facts gathered in one script evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomProbe {
    pub mount_visible: bool,
    pub heading_count: usize,
    pub navigation_count: usize,
    pub has_author: bool,
}

/// One tab with listeners attached
pub struct BrowserPage {
    tab: Arc<Tab>,
    events: PageEvents,
    listener: Weak<PageListener>,
    navigation_timeout: Duration,
    network_idle: Duration,
}

impl BrowserPage {
    /// Navigate and wait until no request has been in flight for the idle window
    ///
    /// Exceeding the navigation timeout is an error; nothing is retried here.
    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        let started = Instant::now();
        self.events.network().reset(started);

        self.tab.navigate_to(url).map_err(|e| {
            ShipcheckError::Browser(format!("Failed to navigate to {}: {}", url, e))
        })?;
        self.tab.wait_until_navigated().map_err(|e| {
            debug!("wait_until_navigated failed for {}: {}", url, e);
            ShipcheckError::Timeout {
                operation: format!("navigation to {}", url),
                seconds: self.navigation_timeout.as_secs(),
            }
        })?;

        self.wait_for_network_idle(url, started).await?;
        info!("Loaded {} in {:?}", url, started.elapsed());
        Ok(())
    }

    async fn wait_for_network_idle(&self, url: &str, started: Instant) -> Result<()> {
        loop {
            let (idle, pending) = {
                let network = self.events.network();
                (network.is_idle(Instant::now(), self.network_idle), network.in_flight())
            };
            if idle {
                return Ok(());
            }

            if started.elapsed() > self.navigation_timeout {
                debug!("{} request(s) still in flight on {}", pending, url);
                return Err(ShipcheckError::Timeout {
                    operation: format!("network idle on {}", url),
                    seconds: self.navigation_timeout.as_secs(),
                });
            }

            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| ShipcheckError::Browser(format!("JavaScript evaluation failed: {}", e)))?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Evaluate a script returning `JSON.stringify(...)` and decode it
    pub async fn evaluate_json<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let value = self.evaluate(script).await?;
        let json = value.as_str().ok_or_else(|| {
            ShipcheckError::Browser(format!("Script returned {} instead of a JSON string", value))
        })?;
        Ok(serde_json::from_str(json)?)
    }

    /// Status code of the main document
    ///
    /// Taken from the document's `Network.responseReceived`, falling back to
    /// the navigation timing entry.
    pub async fn http_status(&self) -> Result<Option<u16>> {
        let observed = self.events.network().document_status();
        if observed.is_some() {
            return Ok(observed);
        }

        let value = self
            .evaluate(
                "(performance.getEntriesByType('navigation')[0] || {}).responseStatus || null",
            )
            .await?;
        Ok(value.as_u64().and_then(|s| u16::try_from(s).ok()))
    }

    /// Mount visibility, heading/navigation counts and the author string
    pub async fn probe_dom(&self, mount_selector: &str, author: &str) -> Result<DomProbe> {
        let script = format!(
            r#"(() => {{
                const mount = document.querySelector({selector});
                let mountVisible = false;
                if (mount) {{
                    const rect = mount.getBoundingClientRect();
                    const style = window.getComputedStyle(mount);
                    mountVisible = rect.width > 0 && rect.height > 0
                        && style.display !== 'none'
                        && style.visibility !== 'hidden'
                        && style.opacity !== '0';
                }}
                const text = document.body ? document.body.innerText : '';
                return JSON.stringify({{
                    mountVisible,
                    headingCount: document.querySelectorAll('h1').length,
                    navigationCount: document.querySelectorAll('nav').length,
                    hasAuthor: text.includes({author}),
                }});
            }})()"#,
            selector = serde_json::to_string(mount_selector)?,
            author = serde_json::to_string(author)?,
        );

        self.evaluate_json(&script).await
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Await `work` against this page, then close it whatever the outcome
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = work.await;
        if let Err(e) = self.close().await {
            warn!("{}", e);
        }
        outcome
    }

    /// Detach the listener and close the tab
    pub async fn close(&self) -> Result<()> {
        self.events.detach();
        if let Err(e) = self.tab.remove_event_listener(&self.listener) {
            debug!("Failed to remove listener: {}", e);
        }
        self.tab
            .close(true)
            .map_err(|e| ShipcheckError::Browser(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipcheck_core::LogKind;

    #[test]
    fn test_config_from_settings() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 720);
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.network_idle, Duration::from_millis(500));
    }

    #[test]
    fn test_dom_probe_decodes_script_output() {
        let probe: DomProbe = serde_json::from_str(
            r#"{"mountVisible":true,"headingCount":1,"navigationCount":2,"hasAuthor":false}"#,
        )
        .unwrap();
        assert!(probe.mount_visible);
        assert_eq!(probe.navigation_count, 2);
        assert!(!probe.has_author);
    }

    #[test]
    fn test_detached_page_stops_feeding_collector() {
        let collector = ConsoleCollector::new();
        let first = PageEvents::new(collector.clone());
        let second = PageEvents::new(collector.clone());

        first.record(Some(ConsoleLogEntry::new(LogKind::Error, "route one")));
        first.detach();
        first.record(Some(ConsoleLogEntry::new(LogKind::Error, "late from route one")));
        second.record(Some(ConsoleLogEntry::new(LogKind::Error, "route two")));

        let texts: Vec<String> = collector.snapshot().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["route one", "route two"]);
        assert!(!first.is_attached());
        assert!(second.is_attached());
    }

    #[test]
    fn test_pages_track_network_separately() {
        let collector = ConsoleCollector::new();
        let first = PageEvents::new(collector.clone());
        let second = PageEvents::new(collector);

        let now = Instant::now();
        first
            .network()
            .request_started(&serde_json::json!({ "requestId": "1" }), now);

        assert_eq!(first.network().in_flight(), 1);
        assert_eq!(second.network().in_flight(), 0);
    }
}
