//! Control Channel: the request/response/push surface of the registry.
//!
//! Requests are at-most-once with an explicit result; there is no retry.
//! Pushes are best-effort: the roster is a latest-wins `watch`, the
//! `init`/`pipsCount`/`pipsList` stream is a `broadcast` that drops old
//! messages for observers that fall behind.

use pipview_common::error::{PipError, PipResult};
use pipview_render_engine::SurfaceControl;
use pipview_session_model::{
    ControlPush, ControlRequest, ControlResponse, OpenRequest, Roster, SessionId, SessionInfo,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::registry::RegistryCommand;

/// Cloneable handle to a running [`SessionRegistry`](crate::SessionRegistry).
#[derive(Clone)]
pub struct ControlChannel {
    commands: mpsc::Sender<RegistryCommand>,
    roster: watch::Receiver<Roster>,
    pushes: broadcast::Sender<ControlPush>,
}

impl ControlChannel {
    pub(crate) fn new(
        commands: mpsc::Sender<RegistryCommand>,
        roster: watch::Receiver<Roster>,
        pushes: broadcast::Sender<ControlPush>,
    ) -> Self {
        Self {
            commands,
            roster,
            pushes,
        }
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<PipResult<T>>) -> RegistryCommand,
    ) -> PipResult<T> {
        let (reply, rx) = oneshot::channel();
        let stopped = || PipError::channel_closed("session registry stopped");
        self.commands.send(make(reply)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }

    /// Create a session. Fails with `InvalidRequest` before reaching the
    /// registry when the request is malformed.
    pub async fn open(&self, request: OpenRequest) -> PipResult<SessionId> {
        let request = request.validate()?;
        self.call(|reply| RegistryCommand::Open { request, reply })
            .await
    }

    pub async fn close(&self, session_id: SessionId) -> PipResult<()> {
        self.call(|reply| RegistryCommand::Close { session_id, reply })
            .await
    }

    pub async fn close_all(&self) -> PipResult<()> {
        self.call(|reply| RegistryCommand::CloseAll { reply }).await
    }

    /// Live sessions ordered by id.
    pub async fn list(&self) -> PipResult<Vec<SessionInfo>> {
        self.call(|reply| RegistryCommand::List { reply }).await
    }

    /// Direct line to one session's surface.
    pub async fn surface(&self, session_id: SessionId) -> PipResult<SurfaceControl> {
        self.call(|reply| RegistryCommand::Surface { session_id, reply })
            .await
    }

    /// Returns the stored opacity after clamping.
    pub async fn set_opacity(&self, session_id: SessionId, value: f64) -> PipResult<f64> {
        self.surface(session_id).await?.set_opacity(value).await
    }

    pub async fn set_always_on_top(&self, session_id: SessionId, value: bool) -> PipResult<()> {
        self.surface(session_id)
            .await?
            .set_always_on_top(value)
            .await
    }

    pub async fn set_aspect_ratio(&self, session_id: SessionId, ratio: f64) -> PipResult<()> {
        self.surface(session_id)
            .await?
            .set_aspect_ratio(ratio)
            .await
    }

    pub async fn is_cursor_inside(&self, session_id: SessionId) -> PipResult<bool> {
        self.surface(session_id).await?.is_cursor_inside().await
    }

    /// Single entry point for external front-ends.
    pub async fn dispatch(&self, request: ControlRequest) -> ControlResponse {
        let target = request.target_session();
        let result = match request {
            ControlRequest::Open(open) => self
                .open(open)
                .await
                .map(|session_id| ControlResponse::Opened { session_id }),
            ControlRequest::Close { session_id } => {
                self.close(session_id).await.map(|_| ControlResponse::Ok)
            }
            ControlRequest::CloseAll => self.close_all().await.map(|_| ControlResponse::Ok),
            ControlRequest::List => self
                .list()
                .await
                .map(|list| ControlResponse::Sessions { list }),
            ControlRequest::SetOpacity { session_id, value } => self
                .set_opacity(session_id, value)
                .await
                .map(|_| ControlResponse::Ok),
            ControlRequest::SetAlwaysOnTop { session_id, value } => self
                .set_always_on_top(session_id, value)
                .await
                .map(|_| ControlResponse::Ok),
            ControlRequest::SetAspectRatio { session_id, ratio } => self
                .set_aspect_ratio(session_id, ratio)
                .await
                .map(|_| ControlResponse::Ok),
            ControlRequest::IsCursorInside { session_id } => self
                .is_cursor_inside(session_id)
                .await
                .map(|inside| ControlResponse::CursorInside { inside }),
        };
        if let Err(e) = &result {
            tracing::debug!(session_id = ?target, error = %e, "Control request failed");
        }
        result.into()
    }

    /// Last broadcast roster.
    pub fn roster(&self) -> Roster {
        self.roster.borrow().clone()
    }

    /// Latest-wins roster updates.
    pub fn subscribe_roster(&self) -> watch::Receiver<Roster> {
        self.roster.clone()
    }

    /// `init`, `pipsCount` and `pipsList` pushes from now on.
    pub fn subscribe_pushes(&self) -> broadcast::Receiver<ControlPush> {
        self.pushes.subscribe()
    }

    /// A link scoped to one session's surface.
    pub fn link(&self, session_id: SessionId) -> SurfaceLink {
        SurfaceLink {
            session_id,
            channel: self.clone(),
        }
    }
}

/// A surface's own view of the control channel. Scoped requests are
/// filled with the surface's session id.
#[derive(Clone)]
pub struct SurfaceLink {
    session_id: SessionId,
    channel: ControlChannel,
}

impl SurfaceLink {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    async fn send(&self, request: ControlRequest) -> PipResult<ControlResponse> {
        self.channel.dispatch(request).await.into_result()
    }

    pub async fn set_opacity(&self, value: f64) -> PipResult<()> {
        self.send(ControlRequest::SetOpacity {
            session_id: self.session_id,
            value,
        })
        .await
        .map(|_| ())
    }

    pub async fn set_always_on_top(&self, value: bool) -> PipResult<()> {
        self.send(ControlRequest::SetAlwaysOnTop {
            session_id: self.session_id,
            value,
        })
        .await
        .map(|_| ())
    }

    /// `0` clears the constraint.
    pub async fn set_aspect_ratio(&self, ratio: f64) -> PipResult<()> {
        self.send(ControlRequest::SetAspectRatio {
            session_id: self.session_id,
            ratio,
        })
        .await
        .map(|_| ())
    }

    pub async fn is_cursor_inside(&self) -> PipResult<bool> {
        match self
            .send(ControlRequest::IsCursorInside {
                session_id: self.session_id,
            })
            .await?
        {
            ControlResponse::CursorInside { inside } => Ok(inside),
            other => Err(PipError::platform(format!(
                "unexpected control response {other:?}"
            ))),
        }
    }

    /// Close the surface's own session.
    pub async fn close(&self) -> PipResult<()> {
        self.send(ControlRequest::Close {
            session_id: self.session_id,
        })
        .await
        .map(|_| ())
    }
}
