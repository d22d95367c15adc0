//! LINE Messaging API client implementation.

use super::{ApiConfig, RichMenuApi, RichMenuRequest};
use crate::render::RenderedImage;
use crate::{Error, RemoteError, RemoteErrorKind, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRichMenuResponse {
    rich_menu_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP client for the rich menu endpoints.
pub struct LineClient {
    client: reqwest::Client,
    config: ApiConfig,
    api_base: Url,
    data_base: Url,
}

impl LineClient {
    /// Create a new client; the configuration is validated first.
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.channel_access_token))
            .map_err(|e| Error::ConfigError(format!("channel access token is not a valid header value: {}", e)))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let api_base = parse_base(&config.api_base_url)?;
        let data_base = parse_base(&config.data_api_base_url)?;
        Ok(Self {
            client,
            config,
            api_base,
            data_base,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn api_url(&self, segments: &[&str]) -> Url {
        endpoint(&self.api_base, segments)
    }

    fn data_url(&self, segments: &[&str]) -> Url {
        endpoint(&self.data_base, segments)
    }

    /// Pass successful responses through; turn the rest into `RemoteError`
    /// carrying the remote message verbatim.
    async fn check(resp: reqwest::Response) -> std::result::Result<reqwest::Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.message,
            Err(_) if !body.trim().is_empty() => body,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        Err(RemoteError::new(RemoteErrorKind::Status(status.as_u16()), message))
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::ConfigError(format!("invalid base URL {}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::ConfigError(format!("base URL {} cannot take a path", raw)));
    }
    Ok(url)
}

/// Append `segments` to `base`'s path, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[async_trait]
impl RichMenuApi for LineClient {
    async fn create_rich_menu(&self, menu: &RichMenuRequest) -> std::result::Result<String, RemoteError> {
        let url = self.api_url(&["v2", "bot", "richmenu"]);
        debug!("POST {}", url);
        let resp = self.client.post(url).json(menu).send().await?;
        let created: CreateRichMenuResponse = Self::check(resp).await?.json().await?;
        Ok(created.rich_menu_id)
    }

    async fn upload_image(&self, menu_id: &str, image: &RenderedImage) -> std::result::Result<(), RemoteError> {
        let url = self.data_url(&["v2", "bot", "richmenu", menu_id, "content"]);
        debug!("POST {} ({} bytes)", url, image.bytes().len());
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "image/png")
            .body(image.bytes().to_vec())
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn set_default(&self, menu_id: &str) -> std::result::Result<(), RemoteError> {
        let url = self.api_url(&["v2", "bot", "user", "all", "richmenu", menu_id]);
        debug!("POST {}", url);
        let resp = self.client.post(url).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn delete_rich_menu(&self, menu_id: &str) -> std::result::Result<(), RemoteError> {
        let url = self.api_url(&["v2", "bot", "richmenu", menu_id]);
        debug!("DELETE {}", url);
        let resp = self.client.delete(url).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slashes() {
        let mut cfg = ApiConfig::with_token("t");
        cfg.api_base_url = "http://127.0.0.1:9/".into();
        let client = LineClient::new(cfg).unwrap();
        assert_eq!(
            client.api_url(&["v2", "bot", "richmenu"]).as_str(),
            "http://127.0.0.1:9/v2/bot/richmenu"
        );
        assert_eq!(
            client.data_url(&["v2", "bot", "richmenu", "x", "content"]).as_str(),
            "https://api-data.line.me/v2/bot/richmenu/x/content"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let mut cfg = ApiConfig::with_token("t");
        cfg.api_base_url = "http://127.0.0.1:9/proxy/line/".into();
        let client = LineClient::new(cfg).unwrap();
        assert_eq!(
            client.api_url(&["v2", "bot", "richmenu"]).as_str(),
            "http://127.0.0.1:9/proxy/line/v2/bot/richmenu"
        );
    }

    #[test]
    fn menu_id_is_one_encoded_segment() {
        let client = LineClient::new(ApiConfig::with_token("t")).unwrap();
        let url = client.api_url(&["v2", "bot", "richmenu", "rm/../x y?z"]);
        assert_eq!(url.as_str(), "https://api.line.me/v2/bot/richmenu/rm%2F..%2Fx%20y%3Fz");
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(LineClient::new(ApiConfig::default()), Err(Error::ConfigError(_))));
    }
}
