//! One live session: a capture provider feeding a render surface.

use std::sync::Arc;
use std::time::Duration;

use pipview_capture_engine::{open_provider, CaptureBackend};
use pipview_common::error::PipResult;
use pipview_platform_core::WindowHost;
use pipview_render_engine::{spawn_surface, SurfaceControl, SurfaceHandle, SurfaceNotice, SurfaceParams};
use pipview_session_model::{SessionId, SessionInfo, SourceId, SourceType, ValidOpen};
use tokio::sync::mpsc;

use crate::registry::RegistryConfig;

pub(crate) struct LiveSession {
    id: SessionId,
    source_id: SourceId,
    source_name: String,
    source_type: SourceType,
    opened_at: String,
    surface: SurfaceHandle,
}

impl LiveSession {
    /// Acquire the source and open the surface. Nothing is left running
    /// when this fails.
    pub(crate) async fn start(
        id: SessionId,
        request: ValidOpen,
        backend: Arc<dyn CaptureBackend>,
        host: Arc<dyn WindowHost>,
        config: &RegistryConfig,
        notices: mpsc::UnboundedSender<SurfaceNotice>,
    ) -> PipResult<Self> {
        let provider = open_provider(
            backend,
            &request.source_id,
            request.window.as_ref(),
            config.provider,
        )
        .await?;

        if let (Some(crop), Some(frame)) = (request.crop, provider.latest()) {
            if !frame.is_placeholder() {
                if let Err(e) = crop.validate(frame.width, frame.height) {
                    provider.shutdown().await;
                    return Err(e);
                }
            }
        }

        let source_type = request.source_id.source_type();
        let surface = spawn_surface(
            SurfaceParams {
                session_id: id,
                title: request.source_name.clone(),
                source_type,
                crop: request.crop,
                view: request.view,
            },
            provider,
            host,
            config.surface.clone(),
            notices,
        )?;

        Ok(Self {
            id,
            source_id: request.source_id,
            source_name: request.source_name,
            source_type,
            opened_at: chrono::Utc::now().to_rfc3339(),
            surface,
        })
    }

    pub(crate) fn control(&self) -> SurfaceControl {
        self.surface.control()
    }

    pub(crate) fn info(&self) -> SessionInfo {
        let snapshot = self.surface.snapshot();
        SessionInfo {
            id: self.id,
            source_id: self.source_id.clone(),
            source_name: self.source_name.clone(),
            source_type: self.source_type,
            crop: snapshot.crop,
            view: snapshot.view,
            flags: snapshot.flags,
            known_aspect_ratio: snapshot.known_aspect_ratio,
            opened_at: self.opened_at.clone(),
        }
    }

    /// Stop the surface and release the source.
    pub(crate) async fn stop(self, timeout: Duration) {
        let id = self.id;
        match self.surface.shutdown(timeout).await {
            Some(stats) => tracing::debug!(
                session_id = %id,
                frames = stats.frames_captured,
                error_rate = stats.error_rate(),
                "Session released"
            ),
            None => tracing::warn!(session_id = %id, "Session released without clean shutdown"),
        }
    }
}
