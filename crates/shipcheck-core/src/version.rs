//! Build-version metadata (`version.json`)
//!
//! Written into the build output so the deployed site exposes the commit it
//! was built from; the endpoint verifier reads it back from production.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{Result, ShipcheckError};

/// File name of the version metadata inside the build directory
pub const VERSION_FILE: &str = "version.json";

const UNKNOWN: &str = "unknown";

/// Git information for the current checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitInfo {
    pub hash: String,
    pub short_hash: String,
    pub branch: String,
}

impl GitInfo {
    /// Fallback used when git is unavailable
    pub fn from_fallback(hash: Option<String>, branch: Option<String>) -> Self {
        let hash = hash.unwrap_or_else(|| UNKNOWN.to_string());
        let short_hash = if hash == UNKNOWN {
            UNKNOWN.to_string()
        } else {
            hash.chars().take(7).collect()
        };

        Self {
            hash,
            short_hash,
            branch: branch.unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

/// Contents of `version.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildVersion {
    pub commit_hash: String,
    pub commit_hash_short: String,
    pub branch: String,
    pub build_timestamp: DateTime<Utc>,
    pub deployment_url: String,
    pub build_date: String,
    pub build_time: String,
}

impl BuildVersion {
    pub fn new(git: GitInfo, deployment_url: impl Into<String>, built_at: DateTime<Utc>) -> Self {
        Self {
            commit_hash: git.hash,
            commit_hash_short: git.short_hash,
            branch: git.branch,
            build_timestamp: built_at,
            deployment_url: deployment_url.into(),
            build_date: built_at.format("%Y-%m-%d").to_string(),
            build_time: built_at.format("%H:%M:%S").to_string(),
        }
    }
}

async fn git(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .await
        .map_err(|e| ShipcheckError::Other(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(ShipcheckError::Other(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Read commit and branch from git, falling back to the given values
pub async fn detect_git_info(fallback_hash: Option<String>, fallback_branch: Option<String>) -> GitInfo {
    let detected = async {
        Ok::<_, ShipcheckError>(GitInfo {
            hash: git(&["rev-parse", "HEAD"]).await?,
            short_hash: git(&["rev-parse", "--short", "HEAD"]).await?,
            branch: git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?,
        })
    }
    .await;

    match detected {
        Ok(info) => {
            debug!("Detected git commit {}", info.short_hash);
            info
        }
        Err(e) => {
            warn!("Could not retrieve git information: {}", e);
            GitInfo::from_fallback(fallback_hash, fallback_branch)
        }
    }
}

/// Write `version.json` into an existing build directory
pub async fn write_version_file(build_dir: &Path, version: &BuildVersion) -> Result<PathBuf> {
    if !build_dir.is_dir() {
        return Err(ShipcheckError::Other(format!(
            "Build directory does not exist at {}; run the build first",
            build_dir.display()
        )));
    }

    let path = build_dir.join(VERSION_FILE);
    tokio::fs::write(&path, serde_json::to_string_pretty(version)?).await?;
    Ok(path)
}
