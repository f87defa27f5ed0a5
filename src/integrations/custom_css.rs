use super::{Integration, IntegrationContext, IntegrationError};
use crate::ui::SurfaceKind;
use async_trait::async_trait;
use serde_json::json;

const NAME: &str = "custom-css";

/// Injects a user stylesheet into the player page.
///
/// The file is read on every enable, so a path change (which restarts the
/// integration) or a plain off/on picks up edits.
#[derive(Default)]
pub struct CustomCss {
    ctx: Option<IntegrationContext>,
    applied: bool,
}

impl CustomCss {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Integration for CustomCss {
    fn provide(&mut self, ctx: IntegrationContext) {
        self.ctx = Some(ctx);
    }

    async fn enable(&mut self) -> Result<(), IntegrationError> {
        let ctx = self.ctx.as_ref().ok_or(IntegrationError::MissingContext(NAME))?;
        if self.applied {
            return Ok(());
        }

        let Some(path) = ctx.config.read(|c| c.appearance.custom_css_path.clone()) else {
            tracing::warn!("Custom CSS enabled without a stylesheet path");
            return Ok(());
        };

        let css = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| IntegrationError::Io { name: NAME, source })?;

        tracing::info!("Applying custom CSS from {} ({} bytes)", path, css.len());
        self.applied = ctx
            .router
            .send(SurfaceKind::PlayerView, "customCss:apply", json!({ "css": css }));
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), IntegrationError> {
        let ctx = self.ctx.as_ref().ok_or(IntegrationError::MissingContext(NAME))?;
        if !self.applied {
            return Ok(());
        }

        ctx.router
            .send(SurfaceKind::PlayerView, "customCss:remove", serde_json::Value::Null);
        self.applied = false;
        Ok(())
    }

    async fn surface_ready(&mut self, kind: SurfaceKind) -> Result<(), IntegrationError> {
        if kind != SurfaceKind::PlayerView {
            return Ok(());
        }
        self.applied = false;
        self.enable().await
    }
}
