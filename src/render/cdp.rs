//! Chrome DevTools Protocol render backend

use super::{remaining, RenderBackend, RenderSession};
use crate::{Error, RenderConfig, Result, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Resolves once the document has loaded, web fonts are ready and two
// animation frames have run (the second frame is painted with the final
// layout).
const SETTLE_SCRIPT: &str = r#"(async function() {
    if (document.readyState !== 'complete') {
        await new Promise(function(resolve) {
            window.addEventListener('load', resolve, { once: true });
        });
    }
    if (document.fonts && document.fonts.ready) {
        await document.fonts.ready;
    }
    await new Promise(function(resolve) {
        requestAnimationFrame(function() { requestAnimationFrame(resolve); });
    });
    return true;
})()"#;

/// Launches a fresh headless Chrome for every session (uses the `headless_chrome` crate)
#[derive(Debug, Clone, Default)]
pub struct CdpBackend;

impl CdpBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RenderBackend for CdpBackend {
    type Session = CdpSession;

    fn open_session(&self, config: &RenderConfig) -> Result<CdpSession> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .window_size(Some((Viewport::CANVAS.width, Viewport::CANVAS.height)))
            .path(config.chrome_path.clone())
            .idle_browser_timeout(Duration::from_millis(config.idle_browser_timeout_ms))
            .build()
            .map_err(|e| Error::RenderEngineUnavailable(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::RenderEngineUnavailable(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::RenderEngineUnavailable(format!("Failed to create tab: {}", e)))?;

        debug!("Launched headless browser for render session");
        Ok(CdpSession { browser, tab })
    }
}

/// One headless Chrome process with a single tab.
///
/// Dropping the session kills the browser process.
pub struct CdpSession {
    browser: Browser,
    tab: Arc<Tab>,
}

impl RenderSession for CdpSession {
    fn load_markup(&mut self, markup: &str, deadline: Instant) -> Result<()> {
        self.tab.set_default_timeout(remaining(deadline));

        let encoded = base64::engine::general_purpose::STANDARD.encode(markup);
        let url = format!("data:text/html;charset=utf-8;base64,{}", encoded);

        self.tab
            .navigate_to(&url)
            .map_err(|e| Error::Render(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::Render(format!("Wait for navigation failed: {}", e)))?;

        Ok(())
    }

    fn wait_until_settled(&mut self, deadline: Instant) -> Result<()> {
        self.tab.set_default_timeout(remaining(deadline));

        let settled = self
            .tab
            .evaluate(SETTLE_SCRIPT, true)
            .map_err(|e| Error::Render(format!("Settle evaluation failed: {}", e)))?;

        match settled.value {
            Some(serde_json::Value::Bool(true)) => Ok(()),
            other => Err(Error::Render(format!("Document did not settle: {:?}", other))),
        }
    }

    fn capture_png(&mut self, clip: Viewport, deadline: Instant) -> Result<Vec<u8>> {
        self.tab.set_default_timeout(remaining(deadline));

        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: clip.width as f64,
            height: clip.height as f64,
            scale: 1.0,
        };

        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::Render(format!("Screenshot failed: {}", e)))
    }

    fn close(self) -> Result<()> {
        let closed = self.tab.close(false);
        // Dropping the browser terminates the child process even if the tab
        // refused to close.
        drop(self.tab);
        drop(self.browser);
        closed
            .map(|_| ())
            .map_err(|e| Error::ResourceCleanup(format!("Failed to close render tab: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderEngine;

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn test_cdp_render_canvas() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let engine = RenderEngine::new(CdpBackend::new(), RenderConfig::default());
        let markup = crate::template::render_for_labels(&["Shop"]).unwrap();
        match engine.render_to_image_blocking(&markup) {
            Ok(image) => {
                assert_eq!((image.width(), image.height()), (1600, 910));
                assert_eq!(&image.bytes()[0..8], b"\x89PNG\r\n\x1a\n");
            }
            Err(Error::RenderEngineUnavailable(e)) => {
                eprintln!("Skipping CDP render test because Chrome is not available: {}", e);
            }
            Err(e) => panic!("render failed: {}", e),
        }
    }
}
