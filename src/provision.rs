//! The provisioning saga: register, render, upload, set default.
//!
//! A run never rolls back or retries. When a stage fails, the returned
//! [`ProvisioningResult`] says which one, and anything already created on
//! the remote side (typically a registered menu without an image) is left
//! in place for the caller to inspect or remove with
//! [`Provisioner::delete_menu`].

use crate::api::{RichMenuApi, RichMenuRequest};
use crate::render::{RenderBackend, RenderEngine, RenderedImage};
use crate::{template, Error, Result, RichMenuSpec};
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;

/// Saga stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Register,
    Render,
    Upload,
    Default,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Register => "REGISTER",
            Stage::Render => "RENDER",
            Stage::Upload => "UPLOAD",
            Stage::Default => "DEFAULT",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far a run has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    Init,
    Registered,
    ImageReady,
    Uploaded,
    /// Terminal success
    Defaulted,
    /// Terminal failure at the given stage
    Failed(Stage),
}

/// The stage that failed and why
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: Error,
}

/// Outcome of one provisioning run.
///
/// Filled in stage by stage while the run is in progress; read-only once
/// handed back.
#[derive(Debug)]
pub struct ProvisioningResult {
    menu_id: Option<String>,
    image: Option<RenderedImage>,
    image_rendered: bool,
    image_uploaded: bool,
    set_as_default: bool,
    state: ProvisioningState,
    failure: Option<StageFailure>,
}

impl ProvisioningResult {
    fn new() -> Self {
        Self {
            menu_id: None,
            image: None,
            image_rendered: false,
            image_uploaded: false,
            set_as_default: false,
            state: ProvisioningState::Init,
            failure: None,
        }
    }

    fn registered(&mut self, menu_id: String) {
        self.menu_id = Some(menu_id);
        self.state = ProvisioningState::Registered;
    }

    fn image_ready(&mut self, image: RenderedImage) {
        self.image = Some(image);
        self.image_rendered = true;
        self.state = ProvisioningState::ImageReady;
    }

    fn uploaded(&mut self) {
        self.image_uploaded = true;
        self.state = ProvisioningState::Uploaded;
    }

    fn defaulted(&mut self) {
        self.set_as_default = true;
        self.state = ProvisioningState::Defaulted;
    }

    fn failed(mut self, stage: Stage, error: Error) -> Self {
        warn!("Provisioning failed at {}: {}", stage, error);
        if let Some(id) = &self.menu_id {
            if !self.set_as_default {
                warn!("Rich menu {} was left registered but not active", id);
            }
        }
        self.state = ProvisioningState::Failed(stage);
        self.failure = Some(StageFailure { stage, error });
        self
    }

    pub fn menu_id(&self) -> Option<&str> {
        self.menu_id.as_deref()
    }

    pub fn image(&self) -> Option<&RenderedImage> {
        self.image.as_ref()
    }

    pub fn image_rendered(&self) -> bool {
        self.image_rendered
    }

    pub fn image_uploaded(&self) -> bool {
        self.image_uploaded
    }

    pub fn set_as_default(&self) -> bool {
        self.set_as_default
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    pub fn is_success(&self) -> bool {
        self.state == ProvisioningState::Defaulted
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.failure.as_ref().map(|f| f.stage)
    }

    pub fn error(&self) -> Option<&Error> {
        self.failure.as_ref().map(|f| &f.error)
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    /// True when the remote side holds a menu this run did not finish.
    pub fn has_orphaned_menu(&self) -> bool {
        self.menu_id.is_some() && !self.is_success()
    }

    pub fn summary(&self) -> ProvisioningSummary {
        ProvisioningSummary {
            menu_id: self.menu_id.clone(),
            image_rendered: self.image_rendered,
            image_uploaded: self.image_uploaded,
            set_as_default: self.set_as_default,
            state: self.state,
            failed_stage: self.failed_stage(),
            error: self.error().map(|e| e.to_string()),
            image_sha256: self.image.as_ref().map(RenderedImage::digest),
            image_path: None,
        }
    }
}

/// Serialisable report of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningSummary {
    pub menu_id: Option<String>,
    pub image_rendered: bool,
    pub image_uploaded: bool,
    pub set_as_default: bool,
    pub state: ProvisioningState,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub image_sha256: Option<String>,
    /// Where the image was written, when the caller wrote it out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// Runs the provisioning saga against a remote API with a render engine.
pub struct Provisioner<A: RichMenuApi, B: RenderBackend> {
    api: A,
    renderer: RenderEngine<B>,
}

impl<A: RichMenuApi, B: RenderBackend> Provisioner<A, B> {
    pub fn new(api: A, renderer: RenderEngine<B>) -> Self {
        Self { api, renderer }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn renderer(&self) -> &RenderEngine<B> {
        &self.renderer
    }

    /// Provision `spec` as the default rich menu.
    ///
    /// Returns `Err` only when the spec fails validation, before anything
    /// is sent. Every other failure comes back inside the result.
    pub async fn provision(&self, spec: &RichMenuSpec) -> Result<ProvisioningResult> {
        spec.validate()?;
        let request = RichMenuRequest::from_spec(spec)?;
        let mut result = ProvisioningResult::new();

        debug!("Registering rich menu '{}' with {} areas", request.name, request.areas.len());
        let menu_id = match self.api.create_rich_menu(&request).await {
            Ok(menu_id) => {
                info!("Registered rich menu {}", menu_id);
                result.registered(menu_id.clone());
                menu_id
            }
            Err(source) => {
                return Ok(result.failed(Stage::Register, Error::RemoteApi { stage: Stage::Register, source }));
            }
        };

        let image = match self.render(spec).await {
            Ok(image) => {
                info!("Rendered menu image ({} bytes, sha256 {})", image.bytes().len(), image.digest());
                image
            }
            Err(e) => return Ok(result.failed(Stage::Render, e)),
        };

        let upload = self.api.upload_image(&menu_id, &image).await;
        // RENDER succeeded whatever UPLOAD returned.
        result.image_ready(image);
        if let Err(source) = upload {
            return Ok(result.failed(Stage::Upload, Error::RemoteApi { stage: Stage::Upload, source }));
        }
        info!("Uploaded image for rich menu {}", menu_id);
        result.uploaded();

        if let Err(source) = self.api.set_default(&menu_id).await {
            return Ok(result.failed(Stage::Default, Error::RemoteApi { stage: Stage::Default, source }));
        }
        info!("Rich menu {} is now the default", menu_id);
        result.defaulted();

        Ok(result)
    }

    /// Render the menu image for `spec` without touching the remote side.
    pub async fn render(&self, spec: &RichMenuSpec) -> Result<RenderedImage> {
        spec.validate()?;
        let markup = template::render_for_labels(&spec.labels())?;
        self.renderer.render_to_image(&markup).await
    }

    /// Delete a menu, typically one left behind by a failed run.
    pub async fn delete_menu(&self, menu_id: &str) -> Result<()> {
        self.api.delete_rich_menu(menu_id).await?;
        info!("Deleted rich menu {}", menu_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Upload.to_string(), "UPLOAD");
        assert_eq!(serde_json::to_value(Stage::Default).unwrap(), "DEFAULT");
    }

    #[test]
    fn result_tracks_transitions() {
        let mut r = ProvisioningResult::new();
        assert_eq!(r.state(), ProvisioningState::Init);
        r.registered("rm-1".into());
        assert!(r.has_orphaned_menu());
        let r = r.failed(Stage::Render, Error::RenderTimeout(10));
        assert_eq!(r.state(), ProvisioningState::Failed(Stage::Render));
        assert_eq!(r.failed_stage(), Some(Stage::Render));
        assert_eq!(r.menu_id(), Some("rm-1"));
        assert!(!r.image_rendered());

        let summary = serde_json::to_value(r.summary()).unwrap();
        assert_eq!(summary["state"], serde_json::json!({"state": "FAILED", "stage": "RENDER"}));
        assert_eq!(summary["failedStage"], "RENDER");
        assert_eq!(summary["error"], "Rendering timed out after 10ms");
    }
}
