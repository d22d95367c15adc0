//! Rich menu provisioning
//!
//! Turns a short list of chat actions (1 to 6) into a live rich menu:
//! a fixed tiling of the canvas, an HTML rendition of the labels captured
//! as a PNG by a headless browser, and the remote calls that register the
//! menu, attach the image and make it the default.
//!
//! # Features
//!
//! - **CDP Backend** (default): renders through headless Chrome via the
//!   DevTools protocol
//! - **Staged results**: a provisioning run always reports how far it got
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # async fn run() -> richmenu::Result<()> {
//! use richmenu::api::{ApiConfig, LineClient};
//! use richmenu::render::{CdpBackend, RenderEngine};
//! use richmenu::{Action, ActionKind, Provisioner, RenderConfig, RichMenuSpec};
//!
//! let spec = RichMenuSpec::new(
//!     "Menu",
//!     vec![Action::new(ActionKind::Uri, "Shop", "https://example.com")],
//! );
//! let client = LineClient::new(ApiConfig::from_env()?)?;
//! let renderer = RenderEngine::new(CdpBackend::new(), RenderConfig::default());
//! let result = Provisioner::new(client, renderer).provision(&spec).await?;
//! println!("{:?} reached {:?}", result.menu_id(), result.state());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod error;
pub use error::{Error, RemoteError, RemoteErrorKind, Result};

pub mod layout;
pub use layout::{compute_areas, Rect};

pub mod template;

pub mod render;
pub use render::{RenderEngine, RenderedImage};

pub mod api;

pub mod provision;
pub use provision::{ProvisioningResult, ProvisioningState, ProvisioningSummary, Provisioner, Stage};

/// Width of every rich menu image, in pixels.
pub const CANVAS_WIDTH: u32 = 1600;
/// Height of every rich menu image, in pixels.
pub const CANVAS_HEIGHT: u32 = 910;

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// The fixed rich menu canvas
    pub const CANVAS: Viewport = Viewport {
        width: CANVAS_WIDTH,
        height: CANVAS_HEIGHT,
    };
}

impl Default for Viewport {
    fn default() -> Self {
        Self::CANVAS
    }
}

/// What tapping an area does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Open `target` as a URI
    Uri,
    /// Send `target` as a message from the user
    Message,
    /// Deliver `target` as postback data to the bot
    Postback,
}

/// One tappable area's behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Text drawn on the image and sent as the action label
    pub label: String,
    /// URI, message text or postback data depending on `kind`
    pub target: String,
}

impl Action {
    pub fn new(kind: ActionKind, label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            target: target.into(),
        }
    }
}

/// A menu to provision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichMenuSpec {
    /// Name shown in the remote console; defaults to the chat bar text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub chat_bar_text: String,
    pub actions: Vec<Action>,
    /// Whether the menu opens by default
    #[serde(default)]
    pub selected: bool,
}

impl RichMenuSpec {
    pub fn new(chat_bar_text: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            name: None,
            chat_bar_text: chat_bar_text.into(),
            actions,
            selected: false,
        }
    }

    pub fn menu_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.chat_bar_text)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.label.as_str()).collect()
    }

    /// Check the action count. Nothing else about the actions is validated here.
    pub fn validate(&self) -> Result<()> {
        let n = self.actions.len();
        if n == 0 || n > layout::MAX_ACTIONS {
            return Err(Error::InvalidActionCount(n));
        }
        Ok(())
    }

    /// Load a spec from a JSON file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Configuration for the render engine
///
/// Every render is exactly [`Viewport::CANVAS`]; only timing and the
/// browser launch are configurable. Defaults give fonts and layout ten
/// seconds to settle before capture.
///
/// # Examples
///
/// ```
/// let cfg = richmenu::RenderConfig::default();
/// assert_eq!(cfg.settle_timeout_ms, 10_000);
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Budget for load, settle and capture in milliseconds
    pub settle_timeout_ms: u64,
    /// Explicit Chrome/Chromium binary; autodetected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Run the browser with its sandbox enabled
    pub sandbox: bool,
    /// How long an idle browser process may live before it exits on its own
    pub idle_browser_timeout_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            settle_timeout_ms: 10_000,
            chrome_path: None,
            sandbox: true,
            idle_browser_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(Viewport::default(), Viewport { width: 1600, height: 910 });
        assert_eq!(config.settle_timeout_ms, 10_000);
        assert!(config.sandbox);
    }

    #[test]
    fn spec_parses_camel_case_json() {
        let spec: RichMenuSpec = serde_json::from_str(
            r#"{"chatBarText":"Menu","actions":[{"kind":"uri","label":"Shop","target":"https://example.com"}]}"#,
        )
        .unwrap();
        assert_eq!(spec.menu_name(), "Menu");
        assert!(!spec.selected);
        assert_eq!(spec.actions[0].kind, ActionKind::Uri);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn spec_validation_bounds() {
        let action = Action::new(ActionKind::Message, "Hi", "hi");
        assert!(matches!(RichMenuSpec::new("x", vec![]).validate(), Err(Error::InvalidActionCount(0))));
        assert!(matches!(
            RichMenuSpec::new("x", vec![action.clone(); 7]).validate(),
            Err(Error::InvalidActionCount(7))
        ));
        assert!(RichMenuSpec::new("x", vec![action; 6]).validate().is_ok());
    }
}
