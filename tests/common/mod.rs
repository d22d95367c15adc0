#![allow(dead_code)]

use async_trait::async_trait;
use richmenu::api::{RichMenuApi, RichMenuRequest};
use richmenu::render::{RenderBackend, RenderEngine, RenderSession};
use richmenu::{Action, ActionKind, Error, RemoteError, RemoteErrorKind, RenderConfig, RenderedImage, Result, RichMenuSpec, Viewport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Encode a blank greyscale PNG.
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().expect("png header");
        writer
            .write_image_data(&vec![255u8; (width * height) as usize])
            .expect("png data");
    }
    buf
}

/// A canvas-sized PNG, encoded once per test binary.
pub fn canvas_png() -> Vec<u8> {
    static PNG: OnceLock<Vec<u8>> = OnceLock::new();
    PNG.get_or_init(|| blank_png(richmenu::CANVAS_WIDTH, richmenu::CANVAS_HEIGHT))
        .clone()
}

pub fn canvas_image() -> RenderedImage {
    RenderedImage::from_png(canvas_png(), Viewport::CANVAS).expect("canvas png")
}

pub fn spec_with(count: usize) -> RichMenuSpec {
    let actions = (0..count)
        .map(|i| Action::new(ActionKind::Message, format!("Item {}", i + 1), format!("item-{}", i + 1)))
        .collect();
    RichMenuSpec::new("Open menu", actions)
}

/// What the fake renderer should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderBehavior {
    Succeed,
    FailToStart,
    FailMidCapture,
    FailOnClose,
    /// Crash mid-capture, then fail to shut down as well
    FailCaptureAndClose,
    /// Sleep this long while settling
    SlowSettle(Duration),
    /// Capture an image of this size whatever clip is asked for
    WrongSize(u32, u32),
}

/// Render backend that counts live sessions and records loaded markup.
pub struct FakeBackend {
    pub behavior: RenderBehavior,
    pub live: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
    pub markups: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn new(behavior: RenderBehavior) -> Self {
        Self {
            behavior,
            live: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
            markups: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn engine(self) -> RenderEngine<FakeBackend> {
        RenderEngine::new(self, RenderConfig::default())
    }

    pub fn engine_with(self, config: RenderConfig) -> RenderEngine<FakeBackend> {
        RenderEngine::new(self, config)
    }
}

pub struct FakeSession {
    behavior: RenderBehavior,
    live: Arc<AtomicUsize>,
    markups: Arc<Mutex<Vec<String>>>,
}

impl RenderBackend for FakeBackend {
    type Session = FakeSession;

    fn open_session(&self, _config: &RenderConfig) -> Result<FakeSession> {
        if self.behavior == RenderBehavior::FailToStart {
            return Err(Error::RenderEngineUnavailable("no chrome binary".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            behavior: self.behavior,
            live: self.live.clone(),
            markups: self.markups.clone(),
        })
    }
}

impl RenderSession for FakeSession {
    fn load_markup(&mut self, markup: &str, _deadline: Instant) -> Result<()> {
        self.markups.lock().unwrap().push(markup.to_string());
        Ok(())
    }

    fn wait_until_settled(&mut self, _deadline: Instant) -> Result<()> {
        if let RenderBehavior::SlowSettle(d) = self.behavior {
            std::thread::sleep(d);
        }
        Ok(())
    }

    fn capture_png(&mut self, clip: Viewport, _deadline: Instant) -> Result<Vec<u8>> {
        match self.behavior {
            RenderBehavior::FailMidCapture | RenderBehavior::FailCaptureAndClose => {
                Err(Error::Render("renderer process crashed during capture".into()))
            }
            RenderBehavior::WrongSize(width, height) => Ok(blank_png(width, height)),
            _ => Ok(blank_png(clip.width, clip.height)),
        }
    }

    fn close(self) -> Result<()> {
        self.live.fetch_sub(1, Ordering::SeqCst);
        if matches!(self.behavior, RenderBehavior::FailOnClose | RenderBehavior::FailCaptureAndClose) {
            return Err(Error::Render("browser refused to exit".into()));
        }
        Ok(())
    }
}

/// A recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Upload(String, usize),
    SetDefault(String),
    Delete(String),
}

/// Remote API stub that records calls and can fail one operation.
#[derive(Default)]
pub struct RecordingApi {
    pub calls: Mutex<Vec<Call>>,
    pub requests: Mutex<Vec<RichMenuRequest>>,
    pub fail_create: Option<RemoteError>,
    pub fail_upload: Option<RemoteError>,
    pub fail_default: Option<RemoteError>,
    pub next_id: AtomicUsize,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub fn status_error(code: u16, message: &str) -> RemoteError {
    RemoteError::new(RemoteErrorKind::Status(code), message)
}

#[async_trait]
impl RichMenuApi for RecordingApi {
    async fn create_rich_menu(&self, menu: &RichMenuRequest) -> std::result::Result<String, RemoteError> {
        self.calls.lock().unwrap().push(Call::Create(menu.name.clone()));
        self.requests.lock().unwrap().push(menu.clone());
        if let Some(e) = &self.fail_create {
            return Err(e.clone());
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("richmenu-{}", n))
    }

    async fn upload_image(&self, menu_id: &str, image: &RenderedImage) -> std::result::Result<(), RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Upload(menu_id.to_string(), image.bytes().len()));
        match &self.fail_upload {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn set_default(&self, menu_id: &str) -> std::result::Result<(), RemoteError> {
        self.calls.lock().unwrap().push(Call::SetDefault(menu_id.to_string()));
        match &self.fail_default {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn delete_rich_menu(&self, menu_id: &str) -> std::result::Result<(), RemoteError> {
        self.calls.lock().unwrap().push(Call::Delete(menu_id.to_string()));
        Ok(())
    }
}
