//! Artifact store - screenshots, JSON reports and text logs written once per run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::types::CheckRun;
use crate::{Result, ShipcheckError};

/// Types of run artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    /// Full-page PNG screenshot
    Screenshot,
    /// Machine-readable JSON report
    JsonReport,
    /// Free-text console log
    ConsoleLog,
    /// Markdown comment
    Markdown,
}

impl ArtifactType {
    /// Get file extension for this artifact type
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactType::Screenshot => "png",
            ArtifactType::JsonReport => "json",
            ArtifactType::ConsoleLog => "txt",
            ArtifactType::Markdown => "md",
        }
    }
}

/// Metadata for a stored artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    pub artifact_type: ArtifactType,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Writes artifacts into one output directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Path an artifact named `stem` would be written to
    pub fn path_for(&self, stem: &str, artifact_type: ArtifactType) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", sanitize_stem(stem), artifact_type.extension()))
    }

    /// Write raw bytes as `<base_dir>/<stem>.<ext>`, creating the directory if needed
    pub async fn store(
        &self,
        stem: &str,
        artifact_type: ArtifactType,
        data: &[u8],
    ) -> Result<StoredArtifact> {
        fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            ShipcheckError::Other(format!(
                "Failed to create artifact directory {}: {}",
                self.base_dir.display(),
                e
            ))
        })?;

        let path = self.path_for(stem, artifact_type);
        fs::write(&path, data).await.map_err(|e| {
            ShipcheckError::Other(format!("Failed to write artifact {}: {}", path.display(), e))
        })?;

        Ok(StoredArtifact {
            artifact_type,
            path,
            size_bytes: data.len() as u64,
            created_at: Utc::now(),
        })
    }

    /// Serialize `value` as pretty JSON
    pub async fn store_json<T: Serialize>(&self, stem: &str, value: &T) -> Result<StoredArtifact> {
        let json = serde_json::to_string_pretty(value)?;
        self.store(stem, ArtifactType::JsonReport, json.as_bytes()).await
    }

    /// Persist a verifier's results as `<check>-check.json`
    pub async fn store_check_run(&self, run: &CheckRun) -> Result<StoredArtifact> {
        self.store_json(&run.file_stem(), run).await
    }

    pub async fn store_text(
        &self,
        stem: &str,
        artifact_type: ArtifactType,
        text: &str,
    ) -> Result<StoredArtifact> {
        self.store(stem, artifact_type, text.as_bytes()).await
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

/// Keep artifact names filesystem-safe (`blog/post` -> `blog-post`)
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("home"), "home");
        assert_eq!(sanitize_stem("/#/blog/post"), "blog-post");
        assert_eq!(sanitize_stem("///"), "artifact");
    }

    #[tokio::test]
    async fn test_store_creates_directory() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("screenshots"));

        let artifact = store
            .store("home", ArtifactType::Screenshot, &[0u8; 128])
            .await
            .unwrap();

        assert_eq!(artifact.size_bytes, 128);
        assert_eq!(artifact.path, temp.path().join("screenshots/home.png"));
        assert!(artifact.path.exists());
    }

    #[tokio::test]
    async fn test_store_check_run() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("test-results"));
        let run = CheckRun::new(
            "build",
            vec![crate::types::CheckResult::fail("dist", "index.html not found")],
        );

        let stored = store.store_check_run(&run).await.unwrap();
        assert!(stored.path.ends_with("test-results/build-check.json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&stored.path).unwrap()).unwrap();
        assert_eq!(json["check"], "build");
        assert_eq!(json["passed"], false);
        assert_eq!(json["results"][0]["errorMessage"], "index.html not found");
    }

    #[tokio::test]
    async fn test_store_json_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path());

        let value = serde_json::json!({ "passed": true });
        let artifact = store.store_json("report", &value).await.unwrap();
        let content = std::fs::read_to_string(&artifact.path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, value);
    }
}
