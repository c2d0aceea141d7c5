//! Full-page screenshot capture and the blank-render heuristic

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use headless_chrome::protocol::cdp::Page::{
    CaptureScreenshot, CaptureScreenshotFormatOption, Viewport,
};
use shipcheck_core::{ArtifactStore, ArtifactType, Result, ShipcheckError, StoredArtifact};
use tracing::{debug, info};

use crate::browser::BrowserPage;

/// Size-based proxy for "the page rendered something"
///
/// A blank white page compresses to a tiny PNG while real content inflates it
/// well past the threshold. This is a heuristic: theme, viewport or font
/// changes shift real sizes, so the threshold is configurable and should be
/// checked against the site's actual screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlankScreenHeuristic {
    pub threshold_bytes: u64,
}

impl Default for BlankScreenHeuristic {
    fn default() -> Self {
        Self {
            threshold_bytes: 5000,
        }
    }
}

impl BlankScreenHeuristic {
    pub fn new(threshold_bytes: u64) -> Self {
        Self { threshold_bytes }
    }

    pub fn is_blank(&self, size_bytes: u64) -> bool {
        size_bytes < self.threshold_bytes
    }
}

/// Capture the whole scrollable page as PNG
pub async fn capture_full_page(page: &BrowserPage) -> Result<Vec<u8>> {
    let width = page
        .evaluate("Math.max(document.documentElement.scrollWidth, window.innerWidth)")
        .await?
        .as_f64()
        .unwrap_or(0.0);
    let height = page
        .evaluate(
            "Math.max(document.documentElement.scrollHeight, \
             document.body ? document.body.scrollHeight : 0, window.innerHeight)",
        )
        .await?
        .as_f64()
        .unwrap_or(0.0);

    debug!("Capturing full page screenshot ({}x{})", width, height);

    let data = page
        .tab()
        .call_method(full_page_capture(width, height))
        .map_err(|e| ShipcheckError::Screenshot(format!("CDP capture failed: {}", e)))?
        .data;

    BASE64
        .decode(data)
        .map_err(|e| ShipcheckError::Screenshot(format!("Invalid screenshot data: {}", e)))
}

/// `Page.captureScreenshot` rendering past the viewport when the page size is known
fn full_page_capture(width: f64, height: f64) -> CaptureScreenshot {
    let clip = (width > 0.0 && height > 0.0).then_some(Viewport {
        x: 0.0,
        y: 0.0,
        width,
        height,
        scale: 1.0,
    });

    CaptureScreenshot {
        format: Some(CaptureScreenshotFormatOption::Png),
        quality: None,
        capture_beyond_viewport: Some(clip.is_some()),
        clip,
        from_surface: Some(true),
        optimize_for_speed: None,
    }
}

/// Capture and store a screenshot as `<name>.png`
pub async fn capture_to_store(
    page: &BrowserPage,
    store: &ArtifactStore,
    name: &str,
) -> Result<StoredArtifact> {
    let data = capture_full_page(page).await?;
    let artifact = store.store(name, ArtifactType::Screenshot, &data).await?;

    info!(
        "Screenshot saved: {} ({:.2} KB)",
        artifact.path.display(),
        artifact.size_bytes as f64 / 1024.0
    );

    Ok(artifact)
}
