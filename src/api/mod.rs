//! Remote rich menu API boundary.
//!
//! [`RichMenuApi`] is the seam the provisioner talks to; [`LineClient`] is
//! the HTTP implementation for the LINE Messaging API.

use crate::layout::{bind_areas, Rect};
use crate::render::RenderedImage;
use crate::{Action, ActionKind, Error, RemoteError, Result, RichMenuSpec, Viewport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod line;
pub use line::LineClient;

/// Operations the remote system offers for rich menus.
///
/// Every call is sent once; retrying is up to the caller.
#[async_trait]
pub trait RichMenuApi: Send + Sync {
    /// Register menu metadata and return the remote menu id.
    async fn create_rich_menu(&self, menu: &RichMenuRequest) -> std::result::Result<String, RemoteError>;

    /// Bind a PNG to an existing menu.
    async fn upload_image(&self, menu_id: &str, image: &RenderedImage) -> std::result::Result<(), RemoteError>;

    /// Make the menu the default for every user.
    async fn set_default(&self, menu_id: &str) -> std::result::Result<(), RemoteError>;

    /// Delete a menu. Used by cleanup tooling only.
    async fn delete_rich_menu(&self, menu_id: &str) -> std::result::Result<(), RemoteError>;
}

#[async_trait]
impl<T: RichMenuApi + ?Sized> RichMenuApi for Arc<T> {
    async fn create_rich_menu(&self, menu: &RichMenuRequest) -> std::result::Result<String, RemoteError> {
        (**self).create_rich_menu(menu).await
    }

    async fn upload_image(&self, menu_id: &str, image: &RenderedImage) -> std::result::Result<(), RemoteError> {
        (**self).upload_image(menu_id, image).await
    }

    async fn set_default(&self, menu_id: &str) -> std::result::Result<(), RemoteError> {
        (**self).set_default(menu_id).await
    }

    async fn delete_rich_menu(&self, menu_id: &str) -> std::result::Result<(), RemoteError> {
        (**self).delete_rich_menu(menu_id).await
    }
}

/// Body of the create-menu call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichMenuRequest {
    pub size: Viewport,
    pub selected: bool,
    pub name: String,
    pub chat_bar_text: String,
    pub areas: Vec<RichMenuArea>,
}

impl RichMenuRequest {
    /// Bind the spec's actions to the fixed layout for their count.
    pub fn from_spec(spec: &RichMenuSpec) -> Result<Self> {
        let areas = bind_areas(&spec.actions)?
            .into_iter()
            .map(|(bounds, action)| RichMenuArea {
                bounds: bounds.into(),
                action: WireAction::from(action),
            })
            .collect();

        Ok(Self {
            size: Viewport::CANVAS,
            selected: spec.selected,
            name: spec.menu_name().to_string(),
            chat_bar_text: spec.chat_bar_text.clone(),
            areas,
        })
    }
}

/// A tappable area on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichMenuArea {
    pub bounds: Bounds,
    pub action: WireAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<Rect> for Bounds {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        }
    }
}

/// Action object in the remote system's format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireAction {
    Uri { label: String, uri: String },
    Message { label: String, text: String },
    Postback { label: String, data: String },
}

impl From<&Action> for WireAction {
    fn from(a: &Action) -> Self {
        let label = a.label.clone();
        match a.kind {
            ActionKind::Uri => WireAction::Uri { label, uri: a.target.clone() },
            ActionKind::Message => WireAction::Message { label, text: a.target.clone() },
            ActionKind::Postback => WireAction::Postback { label, data: a.target.clone() },
        }
    }
}

/// Configuration for the remote API client
#[derive(Clone)]
pub struct ApiConfig {
    /// Long-lived channel access token sent as a bearer token
    pub channel_access_token: String,
    /// Base URL for metadata calls
    pub api_base_url: String,
    /// Base URL for image content uploads
    pub data_api_base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// User agent string to send with requests
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            channel_access_token: String::new(),
            api_base_url: "https://api.line.me".to_string(),
            data_api_base_url: "https://api-data.line.me".to_string(),
            timeout_ms: 30_000,
            user_agent: concat!("richmenu/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("channel_access_token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("data_api_base_url", &self.data_api_base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

pub const ENV_TOKEN: &str = "LINE_CHANNEL_ACCESS_TOKEN";
pub const ENV_API_BASE_URL: &str = "LINE_API_BASE_URL";
pub const ENV_DATA_API_BASE_URL: &str = "LINE_DATA_API_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "LINE_API_TIMEOUT_MS";

impl ApiConfig {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            channel_access_token: token.into(),
            ..Default::default()
        }
    }

    /// Build from `LINE_*` environment variables; only the token is required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        cfg.channel_access_token = lookup(ENV_TOKEN)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::ConfigError(format!("{} is not set", ENV_TOKEN)))?;
        if let Some(base) = lookup(ENV_API_BASE_URL) {
            cfg.api_base_url = base;
        }
        if let Some(base) = lookup(ENV_DATA_API_BASE_URL) {
            cfg.data_api_base_url = base;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            cfg.timeout_ms = raw
                .parse()
                .map_err(|e| Error::ConfigError(format!("{} must be milliseconds: {}", ENV_TIMEOUT_MS, e)))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channel_access_token.trim().is_empty() {
            return Err(Error::ConfigError("channel access token is empty".into()));
        }
        for base in [&self.api_base_url, &self.data_api_base_url] {
            let parsed = url::Url::parse(base).map_err(|e| Error::ConfigError(format!("invalid base URL {}: {}", base, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::ConfigError(format!("base URL {} must be http or https", base)));
            }
        }
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
