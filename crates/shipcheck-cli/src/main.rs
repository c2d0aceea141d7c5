//! shipcheck CLI - post-deployment verification for a static single-page site
//!
//! Usage:
//!   shipcheck build                 Verify the local build output
//!   shipcheck html                  Check the deployed page's raw HTML (with retry)
//!   shipcheck endpoints             Check every production URL and version.json
//!   shipcheck browser [--wait]      Load the page in a headless browser and judge it
//!   shipcheck screenshots           Screenshot every route and write summary.json
//!   shipcheck console               Collect console errors across all routes
//!   shipcheck report                Render summary.json as a PR comment
//!   shipcheck version               Write version.json into the build output
//!
//! Every command exits 0 on pass and 1 on failure.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use shipcheck_browser::{archive, check_console, verify_deployment, DEFAULT_PREVIEW_URL};
use shipcheck_checks::report::{
    append_step_summary, load_summary, render_comment, write_comment, COMMENT_FILE, SUMMARY_FILE,
};
use shipcheck_checks::{fetch_structure, verify_endpoints, BuildVerifier, Fetcher, Severity};
use shipcheck_core::config::{CONFIG_FILE, ENV_BRANCH};
use shipcheck_core::version::{detect_git_info, write_version_file, BuildVersion};
use shipcheck_core::{ArtifactStore, CheckRun, LogKind, ShipcheckConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "shipcheck")]
#[command(author, version, about = "Post-deployment verification for static sites")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the bundler output before deploying
    Build {
        /// Project root containing the manifest and build directory
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Build directory (defaults to the configured one)
        #[arg(long)]
        dist: Option<PathBuf>,
    },

    /// Fetch the deployed page and check its HTML structure
    Html {
        /// Deployment URL (defaults to DEPLOYMENT_URL or the configured one)
        #[arg(long)]
        url: Option<String>,
    },

    /// Check production URLs and the version endpoint
    Endpoints {
        /// URLs to check instead of the configured ones (repeatable)
        #[arg(long = "url")]
        urls: Vec<String>,
    },

    /// Verify the deployed page in a headless browser
    Browser {
        #[arg(long)]
        url: Option<String>,

        /// Wait for CDN propagation before loading the page
        #[arg(long)]
        wait: bool,
    },

    /// Capture a screenshot of every route
    Screenshots {
        #[arg(long)]
        url: Option<String>,
    },

    /// Collect console errors across every route
    Console {
        #[arg(long, default_value = DEFAULT_PREVIEW_URL)]
        url: String,
    },

    /// Render the screenshot summary as a pull-request comment
    Report {
        /// Summary to read (defaults to <screenshots_dir>/summary.json)
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Write version metadata into the build output
    Version {
        #[arg(long)]
        dist: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let config = ShipcheckConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?
        .with_env_overrides();

    match cli.command {
        Commands::Build { root, dist } => cmd_build(&config, root, dist).await,
        Commands::Html { url } => cmd_html(&config, url).await,
        Commands::Endpoints { urls } => cmd_endpoints(config, urls).await,
        Commands::Browser { url, wait } => cmd_browser(&config, url, wait).await,
        Commands::Screenshots { url } => cmd_screenshots(&config, url).await,
        Commands::Console { url } => cmd_console(&config, url).await,
        Commands::Report { summary } => cmd_report(&config, summary).await,
        Commands::Version { dist } => cmd_version(&config, dist).await,
    }
}

fn rule() -> String {
    "=".repeat(60)
}

/// Persist a verifier's results; the run's verdict is the exit code
async fn record_run(config: &ShipcheckConfig, run: &CheckRun) -> Result<bool> {
    let stored = ArtifactStore::new(&config.output.results_dir)
        .store_check_run(run)
        .await
        .with_context(|| format!("Failed to save {} results", run.check))?;
    println!("📄 Results saved: {}", stored.path.display());
    Ok(run.passed)
}

async fn cmd_build(config: &ShipcheckConfig, root: PathBuf, dist: Option<PathBuf>) -> Result<bool> {
    println!("🔍 Starting pre-deployment build verification...\n");

    let build_dir = dist.unwrap_or_else(|| config.output.build_dir.clone());
    let report = BuildVerifier::new(root, build_dir)
        .with_mount_marker(config.markers.mount_marker.clone())
        .verify()?;

    for finding in &report.findings {
        println!("{} {}", finding.severity.icon(), finding.message);
    }

    if !report.tree.is_empty() {
        println!("\n📂 {}:", report.build_dir.display());
        for entry in &report.tree {
            println!("{}", entry.render());
        }
    }

    let warnings = report
        .findings
        .iter()
        .filter(|f| f.severity == Severity::Warning)
        .count();

    let run = CheckRun::new("build", vec![report.to_check_result()]);

    println!("\n{}", rule());
    if run.passed {
        println!("✅ BUILD VERIFICATION PASSED!");
        if warnings > 0 {
            println!("   {} warning(s) above are worth a look.", warnings);
        }
        println!("   Build output is ready for deployment.");
    } else {
        println!("❌ BUILD VERIFICATION FAILED!");
        println!("   Please fix the errors above before deploying.");
    }

    record_run(config, &run).await
}

async fn cmd_html(config: &ShipcheckConfig, url: Option<String>) -> Result<bool> {
    let url = url.unwrap_or_else(|| config.deployment.url.clone());
    println!("🔍 Checking deployment at: {}\n", url);

    let fetcher = Fetcher::new(config.http_timeout())?;
    let report = fetch_structure(
        &fetcher,
        &url,
        config.retry_policy(),
        &config.markers,
        config.expected_build_id.as_deref(),
    )
    .await
    .with_context(|| format!("Could not fetch {}", url))?;

    for line in report.lines(&config.markers) {
        println!("{}", line);
    }

    let run = CheckRun::new("html", vec![report.to_check_result()]);

    println!("\n{}", rule());
    if run.passed {
        println!("✅ PASS: HTML structure is correct");
        println!("   If the site still shows a blank screen, run `shipcheck browser`");
        println!("   to look for JavaScript runtime errors.");
    } else {
        println!("❌ FAIL: HTML structure has issues");
        for diagnostic in report.diagnostics() {
            println!("   {}", diagnostic);
        }
    }
    println!("{}", rule());

    record_run(config, &run).await
}

async fn cmd_endpoints(mut config: ShipcheckConfig, urls: Vec<String>) -> Result<bool> {
    println!("🔍 Starting post-deployment verification...\n");

    if let Some((primary, mirrors)) = urls.split_first() {
        config.deployment.url = primary.clone();
        config.deployment.mirror_urls = mirrors.to_vec();
    }

    let fetcher = Fetcher::new(config.http_timeout())?;
    let report = verify_endpoints(&fetcher, &config).await;

    for result in &report.results {
        for line in result.lines() {
            println!("{}", line);
        }
        println!();
    }

    if let Some(version) = &report.version {
        println!("{}\n", version.line());
    }

    println!("{}", rule());
    println!("DEPLOYMENT VERIFICATION SUMMARY:");
    println!("{}", rule());
    for result in &report.results {
        for line in result.summary_lines() {
            println!("{}", line);
        }
    }
    println!("{}", rule());

    let run = CheckRun::new("endpoints", report.check_results());
    if run.passed {
        println!("✅ ALL DEPLOYMENT CHECKS PASSED!");
    } else {
        println!("❌ SOME DEPLOYMENT CHECKS FAILED!");
        println!("   The site may not be accessible or displaying correctly.");
    }

    record_run(&config, &run).await
}

async fn cmd_browser(config: &ShipcheckConfig, url: Option<String>, wait: bool) -> Result<bool> {
    let url = url.unwrap_or_else(|| config.deployment.url.clone());
    println!("🔍 Testing deployed site for blank screen issue...\n");
    println!("URL: {}\n", url);

    let report = verify_deployment(config, &url, wait)
        .await
        .context("Browser verification could not run")?;

    for line in report.lines() {
        println!("{}", line);
    }

    println!("\n{}", "=".repeat(80));
    println!("FINAL VERDICT:");
    println!("{}", "=".repeat(80));
    for line in report.verdict_lines() {
        println!("{}", line);
    }

    Ok(report.passed())
}

async fn cmd_screenshots(config: &ShipcheckConfig, url: Option<String>) -> Result<bool> {
    let base_url = url.unwrap_or_else(|| config.deployment.url.clone());
    println!("📸 Starting screenshot capture...\n");
    println!("Base URL: {}", base_url);
    println!(
        "Screenshots directory: {}\n",
        config.output.screenshots_dir.display()
    );

    let (summary, path) = archive::archive_routes(config, &base_url)
        .await
        .context("Screenshot capture could not run")?;

    println!("{}", rule());
    println!("SCREENSHOT CAPTURE SUMMARY:");
    println!("{}", rule());
    for result in &summary.results {
        for line in archive::route_lines(result) {
            println!("{}", line);
        }
    }
    println!("{}", rule());
    println!("\n📊 Summary saved: {}", path.display());

    if summary.all_successful() {
        println!("\n✅ All screenshots captured successfully!");
    } else {
        println!("\n❌ Some screenshots failed or had errors");
    }

    Ok(summary.all_successful())
}

async fn cmd_console(config: &ShipcheckConfig, url: String) -> Result<bool> {
    println!("🔍 Starting console error check against {}...\n", url);

    let report = check_console(config, &url)
        .await
        .context("Console check could not run")?;

    println!("\n{}", "=".repeat(80));
    println!("CONSOLE ERROR SUMMARY");
    println!("{}", "=".repeat(80));
    let errors = report.entries.iter().filter(|e| e.kind.is_error()).count();
    println!("Total Errors: {}", errors);
    println!("Total Warnings: {}", report.count(LogKind::Warning));
    println!("Total Info: {}", report.count(LogKind::Info));
    println!("Total Logs: {}", report.count(LogKind::Log));
    println!("{}", "=".repeat(80));
    println!("\n📝 Console log saved to: {}", report.report_path.display());

    if report.passed() {
        println!("✅ No console errors found (excluding denylisted hosts)");
    } else {
        println!("❌ Found {} console errors", report.residual_errors);
    }

    Ok(report.passed())
}

async fn cmd_report(config: &ShipcheckConfig, summary: Option<PathBuf>) -> Result<bool> {
    println!("💬 Generating PR comment...\n");

    let summary_path =
        summary.unwrap_or_else(|| config.output.screenshots_dir.join(SUMMARY_FILE));
    let summary = load_summary(&summary_path).await?;

    let mut links = vec![("Primary Site".to_string(), config.deployment.url.clone())];
    for mirror in &config.deployment.mirror_urls {
        let label = mirror
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        links.push((label, mirror.clone()));
    }

    let comment = render_comment(&summary, &links);
    let comment_path = summary_path
        .parent()
        .map(|dir| dir.join(COMMENT_FILE))
        .unwrap_or_else(|| PathBuf::from(COMMENT_FILE));
    write_comment(&comment_path, &comment).await?;

    println!("Comment generated:");
    println!("{}", rule());
    println!("{}", comment);
    println!("{}", rule());
    println!("\n✅ Comment saved to: {}", comment_path.display());

    if let Some(step_summary) = &config.step_summary_path {
        if append_step_summary(step_summary, &comment).await {
            println!("✅ Added to CI step summary");
        }
    }

    Ok(true)
}

async fn cmd_version(config: &ShipcheckConfig, dist: Option<PathBuf>) -> Result<bool> {
    println!("📝 Generating version information...\n");

    let git = detect_git_info(
        config.expected_build_id.clone(),
        std::env::var(ENV_BRANCH).ok(),
    )
    .await;
    let version = BuildVersion::new(git, config.deployment.url.clone(), Utc::now());

    let build_dir = dist.unwrap_or_else(|| config.output.build_dir.clone());
    let path = write_version_file(&build_dir, &version).await?;
    info!("Wrote {}", path.display());

    println!("✅ Version file created: {}", path.display());
    println!("   Commit: {} ({})", version.commit_hash_short, version.commit_hash);
    println!("   Branch: {}", version.branch);
    println!(
        "   Built: {} {} UTC",
        version.build_date, version.build_time
    );

    Ok(true)
}
