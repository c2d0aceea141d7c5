//! Build Artifact Verifier
//!
//! Local filesystem inspection of the bundler output before it is published.
//! Nothing here touches the network and nothing is retried.

use regex::Regex;
use serde::Serialize;
use shipcheck_core::{CheckResult, Result, ShipcheckError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Packaging manifest looked up at the project root
pub const MANIFEST_FILE: &str = "package.json";
/// Custom-domain marker file
pub const CNAME_FILE: &str = "CNAME";

const ENTRY_HTML: &str = "index.html";
const ASSETS_DIR: &str = "assets";
const BUNDLER_CONFIGS: [&str; 2] = ["vite.config.js", "vite.config.ts"];

/// How much a finding matters for the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Pass,
    Info,
    Warning,
    Failure,
}

impl Severity {
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Pass => "✅",
            Severity::Info => "ℹ️ ",
            Severity::Warning => "⚠️ ",
            Severity::Failure => "❌",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// One line of the output directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub depth: usize,
    pub name: String,
    pub is_dir: bool,
    pub size_bytes: u64,
}

impl TreeEntry {
    pub fn render(&self) -> String {
        let indent = "  ".repeat(self.depth);
        if self.is_dir {
            format!("{}📁 {}/", indent, self.name)
        } else {
            format!(
                "{}📄 {} ({:.2} KB)",
                indent,
                self.name,
                self.size_bytes as f64 / 1024.0
            )
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub build_dir: PathBuf,
    pub findings: Vec<Finding>,
    pub tree: Vec<TreeEntry>,
}

impl BuildReport {
    /// Passed when no finding is a failure; warnings do not count
    pub fn passed(&self) -> bool {
        !self.findings.iter().any(|f| f.severity == Severity::Failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Failure)
    }

    pub fn to_check_result(&self) -> CheckResult {
        let target = self.build_dir.display().to_string();
        if self.passed() {
            CheckResult::pass(target)
        } else {
            let messages: Vec<&str> = self.failures().map(|f| f.message.as_str()).collect();
            CheckResult::fail(target, messages.join("; "))
        }
    }
}

/// Checks a bundler output directory against the expected shape
#[derive(Debug, Clone)]
pub struct BuildVerifier {
    project_root: PathBuf,
    build_dir: PathBuf,
    mount_marker: String,
}

impl BuildVerifier {
    /// `build_dir` is resolved against `project_root` when relative
    pub fn new(project_root: impl Into<PathBuf>, build_dir: impl AsRef<Path>) -> Self {
        let project_root = project_root.into();
        let build_dir = project_root.join(build_dir);
        Self {
            project_root,
            build_dir,
            mount_marker: r#"id="root""#.to_string(),
        }
    }

    pub fn with_mount_marker(mut self, marker: impl Into<String>) -> Self {
        self.mount_marker = marker.into();
        self
    }

    pub fn verify(&self) -> Result<BuildReport> {
        let mut findings = Vec::new();

        if !self.build_dir.is_dir() {
            findings.push(Finding::new(
                Severity::Failure,
                format!(
                    "Build directory {} does not exist; the build may have failed or written elsewhere",
                    self.build_dir.display()
                ),
            ));
        } else {
            findings.push(Finding::new(Severity::Pass, "Build directory found"));
            self.check_entry_html(&mut findings)?;
            self.check_assets(&mut findings)?;
        }

        self.check_manifest(&mut findings)?;
        self.check_bundler_config(&mut findings)?;
        self.check_cname(&mut findings)?;

        let mut tree = Vec::new();
        if self.build_dir.is_dir() {
            collect_tree(&self.build_dir, 0, &mut tree)?;
        }

        debug!(
            "Build verification of {} produced {} findings",
            self.build_dir.display(),
            findings.len()
        );

        Ok(BuildReport {
            build_dir: self.build_dir.clone(),
            findings,
            tree,
        })
    }

    fn check_entry_html(&self, findings: &mut Vec<Finding>) -> Result<()> {
        let path = self.build_dir.join(ENTRY_HTML);
        if !path.is_file() {
            findings.push(Finding::new(
                Severity::Failure,
                format!("{} not found at {}", ENTRY_HTML, path.display()),
            ));
            return Ok(());
        }
        findings.push(Finding::new(Severity::Pass, format!("{} found", ENTRY_HTML)));

        let html = fs::read_to_string(&path)?;
        if html.contains(&self.mount_marker) {
            findings.push(Finding::new(Severity::Pass, "Mount element found"));
        } else {
            findings.push(Finding::new(
                Severity::Failure,
                format!("{} has no mount element ({})", ENTRY_HTML, self.mount_marker),
            ));
        }

        if html.contains("<script") || html.contains(r#"type="module""#) {
            findings.push(Finding::new(Severity::Pass, "Script tags found"));
        } else {
            findings.push(Finding::new(
                Severity::Failure,
                format!("{} has no script tags; the page will not load JavaScript", ENTRY_HTML),
            ));
        }

        Ok(())
    }

    fn check_assets(&self, findings: &mut Vec<Finding>) -> Result<()> {
        let assets = self.build_dir.join(ASSETS_DIR);
        if !assets.is_dir() {
            findings.push(Finding::new(
                Severity::Failure,
                "Assets directory not found; static assets were not bundled",
            ));
            return Ok(());
        }

        let names: Vec<String> = fs::read_dir(&assets)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();

        findings.push(Finding::new(
            Severity::Pass,
            format!("Assets directory found with {} files", names.len()),
        ));

        let js = names.iter().filter(|n| n.ends_with(".js")).count();
        if js == 0 {
            findings.push(Finding::new(
                Severity::Failure,
                "No JavaScript bundles in assets",
            ));
        } else {
            findings.push(Finding::new(
                Severity::Pass,
                format!("Found {} JavaScript file(s)", js),
            ));
        }

        let css = names.iter().filter(|n| n.ends_with(".css")).count();
        if css == 0 {
            findings.push(Finding::new(Severity::Warning, "No CSS bundles in assets"));
        } else {
            findings.push(Finding::new(
                Severity::Pass,
                format!("Found {} CSS file(s)", css),
            ));
        }

        Ok(())
    }

    fn check_manifest(&self, findings: &mut Vec<Finding>) -> Result<()> {
        let path = self.project_root.join(MANIFEST_FILE);
        if !path.is_file() {
            findings.push(Finding::new(
                Severity::Failure,
                format!("{} not found at {}", MANIFEST_FILE, path.display()),
            ));
            return Ok(());
        }

        let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)
            .map_err(|e| ShipcheckError::Config(format!("Invalid {}: {}", MANIFEST_FILE, e)))?;

        match manifest.get("homepage").and_then(|h| h.as_str()) {
            Some(homepage) => findings.push(Finding::new(
                Severity::Info,
                format!("homepage field found: {}", homepage),
            )),
            None => findings.push(Finding::new(
                Severity::Info,
                "No homepage field (fine for sites served from the domain root)",
            )),
        }

        let has_build = manifest
            .get("scripts")
            .and_then(|s| s.get("build"))
            .and_then(|b| b.as_str())
            .is_some();
        if has_build {
            findings.push(Finding::new(Severity::Pass, "Build script configured"));
        } else {
            findings.push(Finding::new(
                Severity::Failure,
                format!("No build script in {}", MANIFEST_FILE),
            ));
        }

        Ok(())
    }

    fn check_bundler_config(&self, findings: &mut Vec<Finding>) -> Result<()> {
        let Some(path) = BUNDLER_CONFIGS
            .iter()
            .map(|name| self.project_root.join(name))
            .find(|p| p.is_file())
        else {
            return Ok(());
        };

        let config = fs::read_to_string(&path)?;
        findings.extend(bundler_config_findings(&config));
        Ok(())
    }

    fn check_cname(&self, findings: &mut Vec<Finding>) -> Result<()> {
        let source = self.project_root.join(CNAME_FILE);
        if !source.is_file() {
            return Ok(());
        }

        let domain = fs::read_to_string(&source)?;
        findings.push(Finding::new(
            Severity::Info,
            format!("{} file found in project root: {}", CNAME_FILE, domain.trim()),
        ));

        if self.build_dir.join(CNAME_FILE).is_file() {
            findings.push(Finding::new(
                Severity::Pass,
                format!("{} copied to build output", CNAME_FILE),
            ));
        } else {
            findings.push(Finding::new(
                Severity::Failure,
                format!(
                    "{} missing from build output; the custom domain would be dropped",
                    CNAME_FILE
                ),
            ));
        }

        Ok(())
    }
}

/// Informational findings for the bundler's `base` and `outDir` settings
pub fn bundler_config_findings(config: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    let base = Regex::new(r#"base:\s*['"]([^'"]+)['"]"#)
        .ok()
        .and_then(|re| re.captures(config).map(|c| c[1].to_string()));
    match base.as_deref() {
        Some("/") => findings.push(Finding::new(Severity::Pass, "Base path set to '/'")),
        Some(other) => findings.push(Finding::new(
            Severity::Warning,
            format!("Base path set to '{}'; a root-served site expects '/'", other),
        )),
        None => findings.push(Finding::new(
            Severity::Info,
            "No base path specified (defaults to '/')",
        )),
    }

    let out_dir = Regex::new(r#"outDir:\s*['"]([^'"]+)['"]"#)
        .ok()
        .and_then(|re| re.captures(config).map(|c| c[1].to_string()));
    match out_dir.as_deref() {
        Some("dist") => findings.push(Finding::new(
            Severity::Pass,
            "Output directory set to 'dist'",
        )),
        Some(other) => findings.push(Finding::new(
            Severity::Warning,
            format!("Output directory set to '{}'", other),
        )),
        None => findings.push(Finding::new(
            Severity::Info,
            "Output directory not set (defaults to 'dist')",
        )),
    }

    findings
}

fn collect_tree(dir: &Path, depth: usize, out: &mut Vec<TreeEntry>) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let metadata = entry.metadata()?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if metadata.is_dir() {
            out.push(TreeEntry {
                depth,
                name,
                is_dir: true,
                size_bytes: 0,
            });
            collect_tree(&entry.path(), depth + 1, out)?;
        } else {
            out.push(TreeEntry {
                depth,
                name,
                is_dir: false,
                size_bytes: metadata.len(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn good_project() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "dist/index.html",
            r#"<html><body><div id="root"></div><script type="module" src="/assets/index-abc123.js"></script></body></html>"#,
        );
        write(root, "dist/assets/index-abc123.js", "console.log(1)");
        write(root, "dist/assets/index-def456.css", "body{}");
        write(
            root,
            "package.json",
            r#"{"name":"site","scripts":{"build":"vite build"}}"#,
        );
        temp
    }

    #[test]
    fn test_good_build_passes() {
        let temp = good_project();
        let report = BuildVerifier::new(temp.path(), "dist").verify().unwrap();
        assert!(report.passed(), "{:?}", report.findings);
        assert!(report.to_check_result().passed);
    }

    #[test]
    fn test_missing_build_dir_fails() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", r#"{"scripts":{"build":"x"}}"#);

        let report = BuildVerifier::new(temp.path(), "dist").verify().unwrap();
        assert!(!report.passed());
        assert!(report.tree.is_empty());
    }

    #[test]
    fn test_missing_css_is_only_a_warning() {
        let temp = good_project();
        fs::remove_file(temp.path().join("dist/assets/index-def456.css")).unwrap();

        let report = BuildVerifier::new(temp.path(), "dist").verify().unwrap();
        assert!(report.passed());
        assert!(report
            .findings
            .iter()
            .any(|f| f.severity == Severity::Warning));
    }

    #[test]
    fn test_missing_js_bundle_fails() {
        let temp = good_project();
        fs::remove_file(temp.path().join("dist/assets/index-abc123.js")).unwrap();

        let report = BuildVerifier::new(temp.path(), "dist").verify().unwrap();
        assert!(!report.passed());
    }

    #[test]
    fn test_manifest_without_build_script_fails() {
        let temp = good_project();
        write(temp.path(), "package.json", r#"{"homepage":"https://example.com"}"#);

        let report = BuildVerifier::new(temp.path(), "dist").verify().unwrap();
        assert!(!report.passed());
        assert!(report
            .findings
            .iter()
            .any(|f| f.message.contains("https://example.com")));
    }

    #[test]
    fn test_cname_must_be_copied() {
        let temp = good_project();
        write(temp.path(), "CNAME", "example.com\n");

        let report = BuildVerifier::new(temp.path(), "dist").verify().unwrap();
        assert!(!report.passed());

        write(temp.path(), "dist/CNAME", "example.com\n");
        let report = BuildVerifier::new(temp.path(), "dist").verify().unwrap();
        assert!(report.passed());
    }

    #[test]
    fn test_tree_is_sorted_with_sizes() {
        let temp = good_project();
        let report = BuildVerifier::new(temp.path(), "dist").verify().unwrap();

        let rendered: Vec<String> = report.tree.iter().map(|e| e.render()).collect();
        assert_eq!(rendered[0], "📁 assets/");
        assert!(rendered[1].starts_with("  📄 index-abc123.js ("));
        assert!(rendered.last().unwrap().starts_with("📄 index.html"));
    }

    #[test]
    fn test_bundler_config_findings() {
        let findings = bundler_config_findings("export default { base: '/blog/', build: { outDir: 'dist' } }");
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[1].severity, Severity::Pass);

        let defaults = bundler_config_findings("export default {}");
        assert!(defaults.iter().all(|f| f.severity == Severity::Info));
    }
}
