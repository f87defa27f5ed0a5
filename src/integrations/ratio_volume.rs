use super::{Integration, IntegrationContext, IntegrationError};
use crate::ui::{BroadcastRouter, SurfaceKind};
use async_trait::async_trait;
use serde_json::Value;

const NAME: &str = "volume-ratio";

/// Switches the player page to a perceptual (ratio) volume curve.
#[derive(Default)]
pub struct RatioVolume {
    router: Option<BroadcastRouter>,
    enabled: bool,
}

impl RatioVolume {
    pub fn new() -> Self {
        Self::default()
    }

    fn router(&self) -> Result<&BroadcastRouter, IntegrationError> {
        self.router.as_ref().ok_or(IntegrationError::MissingContext(NAME))
    }
}

#[async_trait]
impl Integration for RatioVolume {
    fn provide(&mut self, ctx: IntegrationContext) {
        self.router = Some(ctx.router);
    }

    async fn enable(&mut self) -> Result<(), IntegrationError> {
        if self.enabled {
            return Ok(());
        }
        // Stays off until the page has actually received it
        self.enabled = self
            .router()?
            .send(SurfaceKind::PlayerView, "ratioVolume:enable", Value::Null);
        if !self.enabled {
            tracing::debug!("No player view yet, ratio volume applies once it registers");
        }
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), IntegrationError> {
        if !self.enabled {
            return Ok(());
        }
        self.router()?
            .send(SurfaceKind::PlayerView, "ratioVolume:disable", Value::Null);
        self.enabled = false;
        Ok(())
    }

    async fn surface_ready(&mut self, kind: SurfaceKind) -> Result<(), IntegrationError> {
        if kind != SurfaceKind::PlayerView {
            return Ok(());
        }
        // A new page starts with the default curve
        self.enabled = false;
        self.enable().await
    }
}
