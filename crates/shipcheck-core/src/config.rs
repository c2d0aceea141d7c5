//! Configuration management for shipcheck
//!
//! Settings are loaded from `shipcheck.toml` (every field optional), then
//! environment overrides are applied. CLI flags override both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::console::{default_noise_hosts, NoiseFilter};
use crate::retry::RetryPolicy;
use crate::types::{default_routes, RouteCheck};
use crate::{Result, ShipcheckError};

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "shipcheck.toml";

/// Environment variable overriding the primary deployment URL
pub const ENV_DEPLOYMENT_URL: &str = "DEPLOYMENT_URL";
/// Environment variable carrying the expected build identifier
pub const ENV_EXPECTED_BUILD_ID: &str = "GIT_COMMIT_HASH";
/// Environment variable naming the CI job summary file
pub const ENV_STEP_SUMMARY: &str = "GITHUB_STEP_SUMMARY";
/// Environment variable with a fallback branch name for version metadata
pub const ENV_BRANCH: &str = "GIT_BRANCH";

/// Top-level shipcheck configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipcheckConfig {
    #[serde(default)]
    pub deployment: DeploymentConfig,

    #[serde(default)]
    pub markers: MarkerConfig,

    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub http: HttpSettings,

    /// Ordered routes visited by the browser-driven scripts
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteCheck>,

    #[serde(default)]
    pub output: OutputConfig,

    /// Expected build identifier (usually from `GIT_COMMIT_HASH`)
    #[serde(default)]
    pub expected_build_id: Option<String>,

    /// CI job summary file (usually from `GITHUB_STEP_SUMMARY`)
    #[serde(default)]
    pub step_summary_path: Option<PathBuf>,
}

/// Where the site lives and what its pages must contain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Primary deployment URL
    #[serde(default = "default_deployment_url")]
    pub url: String,

    /// Additional URLs serving the same build (static host default domain)
    #[serde(default = "default_mirror_urls")]
    pub mirror_urls: Vec<String>,

    /// Substrings every production page must contain
    #[serde(default = "default_expected_content")]
    pub expected_content: Vec<String>,

    /// Case-insensitive phrases that mark a 404 page
    #[serde(default = "default_not_found_indicators")]
    pub not_found_indicators: Vec<String>,

    /// Path of the version metadata endpoint, relative to the primary URL
    #[serde(default = "default_version_path")]
    pub version_path: String,

    /// JSON field of the version endpoint holding the build identifier
    #[serde(default = "default_version_field")]
    pub version_field: String,
}

/// Raw-HTML and DOM markers the deployed page is checked for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_mount_marker")]
    pub mount_marker: String,

    #[serde(default = "default_mount_selector")]
    pub mount_selector: String,

    #[serde(default = "default_author")]
    pub author: String,

    /// Reference that only appears when unbuilt source was deployed
    #[serde(default = "default_source_entry")]
    pub source_entry: String,

    /// Asset that only the dev server's template references
    #[serde(default = "default_dev_asset")]
    pub dev_asset: String,
}

/// Headless browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Settle time after network idle for the single-page verifier
    #[serde(default = "default_verifier_settle_ms")]
    pub verifier_settle_ms: u64,

    /// Settle time after network idle for the route archiver and console checker
    #[serde(default = "default_archiver_settle_ms")]
    pub archiver_settle_ms: u64,

    /// Wait before verifying a fresh deploy, for CDN propagation
    #[serde(default = "default_propagation_delay_secs")]
    pub propagation_delay_secs: u64,

    /// Screenshots smaller than this are treated as blank renders
    #[serde(default = "default_blank_threshold_bytes")]
    pub blank_threshold_bytes: u64,

    /// Quiet window used to decide that the network is idle
    #[serde(default = "default_network_idle_ms")]
    pub network_idle_ms: u64,

    /// Hosts whose failures are expected noise
    #[serde(default = "default_noise_hosts")]
    pub noise_hosts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Bundler output directory
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Browser verifier / console checker output
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Screenshot archiver output
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,
}

// Default value providers
fn default_deployment_url() -> String {
    "https://christensendaniel.com".to_string()
}

fn default_mirror_urls() -> Vec<String> {
    vec!["https://christensendaniel.github.io".to_string()]
}

fn default_expected_content() -> Vec<String> {
    vec!["root".to_string(), "<script".to_string(), "Daniel".to_string()]
}

fn default_not_found_indicators() -> Vec<String> {
    vec![
        "404".to_string(),
        "not found".to_string(),
        "page not found".to_string(),
    ]
}

fn default_version_path() -> String {
    "/version.json".to_string()
}

fn default_version_field() -> String {
    "commitHash".to_string()
}

fn default_mount_marker() -> String {
    r#"<div id="root">"#.to_string()
}

fn default_mount_selector() -> String {
    "#root".to_string()
}

fn default_author() -> String {
    "Daniel".to_string()
}

fn default_source_entry() -> String {
    "/src/main.jsx".to_string()
}

fn default_dev_asset() -> String {
    "/vite.svg".to_string()
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_verifier_settle_ms() -> u64 {
    3000
}

fn default_archiver_settle_ms() -> u64 {
    2000
}

fn default_propagation_delay_secs() -> u64 {
    60
}

fn default_blank_threshold_bytes() -> u64 {
    5000
}

fn default_network_idle_ms() -> u64 {
    500
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("test-results")
}

fn default_screenshots_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

impl ShipcheckConfig {
    /// Load configuration from `path`, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ShipcheckError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment overrides using the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from an arbitrary lookup (empty values are ignored)
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_DEPLOYMENT_URL) {
            self.deployment.url = url;
        }
        if let Some(build_id) = get(ENV_EXPECTED_BUILD_ID) {
            self.expected_build_id = Some(build_id);
        }
        if let Some(path) = get(ENV_STEP_SUMMARY) {
            self.step_summary_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Primary URL followed by mirrors, without duplicates
    pub fn deployment_urls(&self) -> Vec<String> {
        let mut urls = vec![self.deployment.url.clone()];
        for mirror in &self.deployment.mirror_urls {
            if !urls.contains(mirror) {
                urls.push(mirror.clone());
            }
        }
        urls
    }

    pub fn noise_filter(&self) -> NoiseFilter {
        NoiseFilter::new(self.browser.noise_hosts.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_secs(self.retry.delay_secs),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

impl Default for ShipcheckConfig {
    fn default() -> Self {
        Self {
            deployment: DeploymentConfig::default(),
            markers: MarkerConfig::default(),
            browser: BrowserSettings::default(),
            retry: RetrySettings::default(),
            http: HttpSettings::default(),
            routes: default_routes(),
            output: OutputConfig::default(),
            expected_build_id: None,
            step_summary_path: None,
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            url: default_deployment_url(),
            mirror_urls: default_mirror_urls(),
            expected_content: default_expected_content(),
            not_found_indicators: default_not_found_indicators(),
            version_path: default_version_path(),
            version_field: default_version_field(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            mount_marker: default_mount_marker(),
            mount_selector: default_mount_selector(),
            author: default_author(),
            source_entry: default_source_entry(),
            dev_asset: default_dev_asset(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            verifier_settle_ms: default_verifier_settle_ms(),
            archiver_settle_ms: default_archiver_settle_ms(),
            propagation_delay_secs: default_propagation_delay_secs(),
            blank_threshold_bytes: default_blank_threshold_bytes(),
            network_idle_ms: default_network_idle_ms(),
            noise_hosts: default_noise_hosts(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            results_dir: default_results_dir(),
            screenshots_dir: default_screenshots_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ShipcheckConfig::load_or_default(&temp.path().join(CONFIG_FILE)).unwrap();

        assert_eq!(config.deployment.url, "https://christensendaniel.com");
        assert_eq!(config.routes.len(), 5);
        assert_eq!(config.browser.blank_threshold_bytes, 5000);
        assert_eq!(config.browser.navigation_timeout_secs, 30);
        assert_eq!(config.retry_policy().max_attempts(), 4);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert!(config.expected_build_id.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = ShipcheckConfig::from_toml(
            r#"
            [deployment]
            url = "https://staging.example.com"

            [browser]
            blank_threshold_bytes = 8000

            [[routes]]
            path = "/"
            name = "home"
            "#,
        )
        .unwrap();

        assert_eq!(config.deployment.url, "https://staging.example.com");
        assert_eq!(config.deployment.version_field, "commitHash");
        assert_eq!(config.browser.blank_threshold_bytes, 8000);
        assert_eq!(config.browser.window_width, 1280);
        assert_eq!(config.routes, vec![RouteCheck::new("/", "home")]);
        assert_eq!(config.markers.source_entry, "/src/main.jsx");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ShipcheckConfig::from_toml("[deployment\nurl = 1").unwrap_err();
        assert!(matches!(err, ShipcheckError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DEPLOYMENT_URL, "https://preview.example.com"),
            (ENV_EXPECTED_BUILD_ID, "def456"),
            (ENV_STEP_SUMMARY, ""),
        ]
        .into_iter()
        .collect();

        let config = ShipcheckConfig::default()
            .with_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.deployment.url, "https://preview.example.com");
        assert_eq!(config.expected_build_id.as_deref(), Some("def456"));
        assert!(config.step_summary_path.is_none());
    }

    #[test]
    fn test_deployment_urls_deduplicated() {
        let mut config = ShipcheckConfig::default();
        config.deployment.mirror_urls = vec![
            config.deployment.url.clone(),
            "https://mirror.example.com".to_string(),
        ];
        assert_eq!(
            config.deployment_urls(),
            vec![
                "https://christensendaniel.com".to_string(),
                "https://mirror.example.com".to_string()
            ]
        );
    }
}
