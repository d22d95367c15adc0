//! Markup to PNG rendering through an isolated browser session.
//!
//! Every call opens a private session from a [`RenderBackend`], loads the
//! markup, waits for the page to settle and captures the canvas. The session
//! lives on a dedicated worker thread inside a [`ScopedSession`] guard and is
//! released before the worker replies, on success and error alike. A
//! cancelled caller only drops the reply channel; the worker still releases
//! the session.
//!
//! The async caller never waits longer than the settle budget plus a short
//! grace period. A backend that ignores the deadline is abandoned with
//! `Error::RenderTimeout`; its worker releases the session once the backend
//! call returns.

use crate::{Error, RenderConfig, Result, Viewport};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

// Time the worker gets past the deadline to release the session and reply.
const RELEASE_GRACE: Duration = Duration::from_millis(250);

#[cfg(feature = "cdp")]
pub mod cdp;
#[cfg(feature = "cdp")]
pub use cdp::{CdpBackend, CdpSession};

/// A captured menu image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl RenderedImage {
    /// Wrap PNG bytes, checking that the image is exactly `expected` in size.
    pub fn from_png(bytes: Vec<u8>, expected: Viewport) -> Result<Self> {
        let (width, height) = png_dimensions(&bytes)?;
        if width != expected.width || height != expected.height {
            return Err(Error::Render(format!(
                "captured image is {}x{}, expected {}x{}",
                width, height, expected.width, expected.height
            )));
        }
        Ok(Self { bytes, width, height })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Hex SHA-256 of the PNG bytes
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Write the PNG to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Read width and height from a PNG header.
pub fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = png::Decoder::new(bytes)
        .read_info()
        .map_err(|e| Error::Render(format!("captured data is not a PNG: {}", e)))?;
    let info = reader.info();
    Ok((info.width, info.height))
}

/// Something that can start isolated rendering sessions
pub trait RenderBackend: Send + Sync + 'static {
    type Session: RenderSession;

    /// Start a fresh session sized to [`Viewport::CANVAS`].
    ///
    /// Failure to start the renderer maps to `Error::RenderEngineUnavailable`.
    fn open_session(&self, config: &RenderConfig) -> Result<Self::Session>;
}

/// A single private rendering session. Sessions are never reused.
pub trait RenderSession {
    /// Load `markup` as the session's only document.
    fn load_markup(&mut self, markup: &str, deadline: Instant) -> Result<()>;

    /// Block until styles, fonts and layout have applied.
    fn wait_until_settled(&mut self, deadline: Instant) -> Result<()>;

    /// Capture a PNG clipped to `clip`, anchored at the origin.
    fn capture_png(&mut self, clip: Viewport, deadline: Instant) -> Result<Vec<u8>>;

    /// Tear the session down and release the renderer process.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Owns a session until it is released; dropping the guard releases it too.
pub struct ScopedSession<S: RenderSession> {
    inner: Option<S>,
}

impl<S: RenderSession> ScopedSession<S> {
    pub fn new(session: S) -> Self {
        Self { inner: Some(session) }
    }

    pub fn session(&mut self) -> Result<&mut S> {
        self.inner
            .as_mut()
            .ok_or_else(|| Error::Render("render session already released".into()))
    }

    /// Release now and report cleanup failures as `Error::ResourceCleanup`.
    pub fn release(mut self) -> Result<()> {
        match self.inner.take() {
            Some(session) => session.close().map_err(|e| match e {
                Error::ResourceCleanup(_) => e,
                other => Error::ResourceCleanup(other.to_string()),
            }),
            None => Ok(()),
        }
    }
}

impl<S: RenderSession> Drop for ScopedSession<S> {
    fn drop(&mut self) {
        if let Some(session) = self.inner.take() {
            if let Err(e) = session.close() {
                warn!("Failed to release render session on drop: {}", e);
            }
        }
    }
}

/// Renders markup to canvas-sized PNGs, one private session per call.
pub struct RenderEngine<B: RenderBackend> {
    backend: Arc<B>,
    config: RenderConfig,
}

impl<B: RenderBackend> Clone for RenderEngine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}

impl<B: RenderBackend> RenderEngine<B> {
    pub fn new(backend: B, config: RenderConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Render `markup` on a worker thread and await the image.
    ///
    /// Fails with `Error::RenderTimeout` once `settle_timeout_ms` (plus a
    /// short release grace) has passed, even if the backend is still busy.
    pub async fn render_to_image(&self, markup: &str) -> Result<RenderedImage> {
        let budget_ms = self.config.settle_timeout_ms;
        let (tx, rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let markup = markup.to_owned();

        thread::Builder::new()
            .name("richmenu-render".into())
            .spawn(move || {
                let res = render_in_session(backend.as_ref(), &config, &markup);
                if tx.send(res).is_err() {
                    debug!("Render caller went away; session already released");
                }
            })
            .map_err(|e| Error::RenderEngineUnavailable(format!("Failed to spawn render worker: {}", e)))?;

        let limit = Duration::from_millis(budget_ms).saturating_add(RELEASE_GRACE);
        match tokio::time::timeout(limit, rx).await {
            Ok(reply) => reply.map_err(|e| Error::Render(format!("Render worker exited without a result: {}", e)))?,
            Err(_) => {
                warn!("Render did not finish within {}ms; abandoning the worker", budget_ms);
                Err(Error::RenderTimeout(budget_ms))
            }
        }
    }

    /// Render on the calling thread.
    pub fn render_to_image_blocking(&self, markup: &str) -> Result<RenderedImage> {
        render_in_session(self.backend.as_ref(), &self.config, markup)
    }
}

fn render_in_session<B: RenderBackend>(backend: &B, config: &RenderConfig, markup: &str) -> Result<RenderedImage> {
    let budget_ms = config.settle_timeout_ms;
    let deadline = Instant::now() + Duration::from_millis(budget_ms);

    let session = backend.open_session(config)?;
    debug!("Render session opened");
    let mut scoped = ScopedSession::new(session);

    let captured = scoped
        .session()
        .and_then(|s| capture_settled(s, markup, deadline, budget_ms));
    let released = scoped.release();

    let bytes = match (captured, released) {
        (Ok(bytes), Ok(())) => bytes,
        (Ok(bytes), Err(cleanup)) => {
            warn!("{}", cleanup);
            bytes
        }
        (Err(primary), Ok(())) => return Err(primary),
        (Err(primary), Err(cleanup)) => {
            warn!("{} (while handling: {})", cleanup, primary);
            return Err(primary);
        }
    };
    debug!("Render session released");

    RenderedImage::from_png(bytes, Viewport::CANVAS)
}

// The deadline is checked before capture only; a finished capture is kept.
fn capture_settled<S: RenderSession>(session: &mut S, markup: &str, deadline: Instant, budget_ms: u64) -> Result<Vec<u8>> {
    session
        .load_markup(markup, deadline)
        .map_err(|e| timeout_if_expired(e, deadline, budget_ms))?;
    check_deadline(deadline, budget_ms)?;

    session
        .wait_until_settled(deadline)
        .map_err(|e| timeout_if_expired(e, deadline, budget_ms))?;
    check_deadline(deadline, budget_ms)?;

    session
        .capture_png(Viewport::CANVAS, deadline)
        .map_err(|e| timeout_if_expired(e, deadline, budget_ms))
}

fn check_deadline(deadline: Instant, budget_ms: u64) -> Result<()> {
    if Instant::now() >= deadline {
        return Err(Error::RenderTimeout(budget_ms));
    }
    Ok(())
}

// A backend call that failed after the deadline most likely failed because of it.
fn timeout_if_expired(err: Error, deadline: Instant, budget_ms: u64) -> Error {
    if Instant::now() >= deadline && !matches!(err, Error::RenderTimeout(_)) {
        debug!("Treating late render failure as timeout: {}", err);
        Error::RenderTimeout(budget_ms)
    } else {
        err
    }
}

/// Time left until `deadline`, never zero.
pub fn remaining(deadline: Instant) -> Duration {
    deadline
        .saturating_duration_since(Instant::now())
        .max(Duration::from_millis(1))
}
