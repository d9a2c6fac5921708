//! The render surface task.
//!
//! One task per session. It owns the host window and the capture provider
//! and runs three independent clocks: the render tick, the hover poll, and
//! provider events. Scoped control requests arrive on a command channel.
//! The task never writes the session registry; it reports exits through
//! [`SurfaceNotice`] and waits to be stopped.

use std::sync::Arc;
use std::time::Duration;

use pipview_capture_engine::{ProviderEvent, ProviderHandle, ProviderStats};
use pipview_common::config::RenderDefaults;
use pipview_common::error::{PipError, PipResult};
use pipview_platform_core::{HostWindow, Rect, WindowHost, WindowSpec};
use pipview_session_model::{CropRect, SessionId, SourceType, ViewState};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::overlay::{OverlayChange, OverlayState};
use crate::resize::{initial_size, SizeLimits};
use crate::surface::{EventOutcome, SurfaceSnapshot, SurfaceState};

/// Where new surface windows are placed.
const INITIAL_ORIGIN: (i32, i32) = (100, 100);

/// Surface timing and drawing parameters.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    pub tick: Duration,
    pub hover_poll: Duration,
    pub hide_delay: Duration,
    pub indicator_duration: Duration,
    pub background: [u8; 3],
    pub limits: SizeLimits,
    pub initial_width: u32,
}

impl From<&RenderDefaults> for SurfaceConfig {
    fn from(defaults: &RenderDefaults) -> Self {
        Self {
            tick: Duration::from_millis(defaults.tick_ms.max(1)),
            hover_poll: Duration::from_millis(defaults.hover_poll_ms.max(1)),
            hide_delay: Duration::from_millis(defaults.hide_delay_ms),
            indicator_duration: Duration::from_millis(defaults.opacity_indicator_ms),
            background: defaults.background,
            limits: SizeLimits::from(defaults),
            initial_width: defaults.initial_window_width,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::from(&RenderDefaults::default())
    }
}

/// Identity and framing of the session a surface shows.
#[derive(Debug, Clone)]
pub struct SurfaceParams {
    pub session_id: SessionId,
    pub title: String,
    pub source_type: SourceType,
    pub crop: Option<CropRect>,
    pub view: ViewState,
}

/// Why a surface wants its session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceExit {
    /// The capture source vanished.
    SourceLost { reason: String },
    /// The user closed the window.
    UserClosed,
}

/// Sent by a surface that wants its session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceNotice {
    pub session_id: SessionId,
    pub exit: SurfaceExit,
}

/// Requests a surface serves on behalf of the control channel.
#[derive(Debug)]
pub enum SurfaceCommand {
    SetOpacity {
        value: f64,
        reply: oneshot::Sender<PipResult<f64>>,
    },
    SetAlwaysOnTop {
        value: bool,
        reply: oneshot::Sender<PipResult<()>>,
    },
    SetAspectRatio {
        ratio: f64,
        reply: oneshot::Sender<PipResult<()>>,
    },
    IsCursorInside {
        reply: oneshot::Sender<PipResult<bool>>,
    },
    DragCrop {
        dx: i64,
        dy: i64,
        reply: oneshot::Sender<PipResult<Option<CropRect>>>,
    },
}

/// Cloneable sender for [`SurfaceCommand`]s.
#[derive(Debug, Clone)]
pub struct SurfaceControl {
    session_id: SessionId,
    commands: mpsc::Sender<SurfaceCommand>,
}

impl SurfaceControl {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<PipResult<T>>) -> SurfaceCommand,
    ) -> PipResult<T> {
        let (reply, rx) = oneshot::channel();
        let closed = || PipError::not_found(format!("session {} is closed", self.session_id));
        self.commands.send(make(reply)).await.map_err(|_| closed())?;
        rx.await.map_err(|_| closed())?
    }

    /// Returns the stored (clamped) opacity.
    pub async fn set_opacity(&self, value: f64) -> PipResult<f64> {
        self.request(|reply| SurfaceCommand::SetOpacity { value, reply })
            .await
    }

    pub async fn set_always_on_top(&self, value: bool) -> PipResult<()> {
        self.request(|reply| SurfaceCommand::SetAlwaysOnTop { value, reply })
            .await
    }

    pub async fn set_aspect_ratio(&self, ratio: f64) -> PipResult<()> {
        self.request(|reply| SurfaceCommand::SetAspectRatio { ratio, reply })
            .await
    }

    pub async fn is_cursor_inside(&self) -> PipResult<bool> {
        self.request(|reply| SurfaceCommand::IsCursorInside { reply })
            .await
    }

    pub async fn drag_crop(&self, dx: i64, dy: i64) -> PipResult<Option<CropRect>> {
        self.request(|reply| SurfaceCommand::DragCrop { dx, dy, reply })
            .await
    }
}

/// Owner's side of a running surface.
pub struct SurfaceHandle {
    control: SurfaceControl,
    snapshot: watch::Receiver<SurfaceSnapshot>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<ProviderStats>>,
}

impl SurfaceHandle {
    pub fn control(&self) -> SurfaceControl {
        self.control.clone()
    }

    /// Latest published surface state.
    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Stop the render loop and release the capture provider. Waits up to
    /// `timeout` for a clean exit, then aborts the task.
    pub async fn shutdown(mut self, timeout: Duration) -> Option<ProviderStats> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let mut task = self.task.take()?;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e)) => {
                tracing::warn!(session_id = %self.control.session_id, error = %e, "Surface task failed");
                None
            }
            Err(_) => {
                tracing::warn!(session_id = %self.control.session_id, "Surface task did not stop in time, aborting");
                task.abort();
                None
            }
        }
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Open the host window for a session and start its render loop.
pub fn spawn_surface(
    params: SurfaceParams,
    provider: ProviderHandle,
    host: Arc<dyn WindowHost>,
    config: SurfaceConfig,
    notices: mpsc::UnboundedSender<SurfaceNotice>,
) -> PipResult<SurfaceHandle> {
    let mut state = SurfaceState::new(
        params.source_type,
        params.crop,
        params.view,
        config.limits,
        config.indicator_duration,
    );

    let probe = provider.latest();
    let aspect = probe.as_deref().and_then(|frame| {
        if frame.is_placeholder() {
            None
        } else {
            params
                .crop
                .map(|c| c.fitted(frame.width, frame.height).aspect_ratio())
                .or(Some(frame.width as f64 / frame.height.max(1) as f64))
        }
    });
    let (width, height) = initial_size(aspect, config.initial_width, config.limits);
    let flags = state.flags();

    let mut window = host.open_window(WindowSpec {
        title: params.title.clone(),
        bounds: Rect::new(INITIAL_ORIGIN.0, INITIAL_ORIGIN.1, width, height),
        always_on_top: flags.always_on_top,
        opacity: flags.opacity.value(),
        aspect_ratio: None,
    })?;
    if let Some(frame) = probe.as_deref() {
        state.observe_frame(frame, window.as_mut());
    }

    let now = Instant::now();
    let overlay = OverlayState::new(config.hide_delay, now);
    let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot(overlay.visible()));
    let (commands_tx, commands_rx) = mpsc::channel(32);
    let (stop_tx, stop_rx) = oneshot::channel();

    let runner = SurfaceRunner {
        session_id: params.session_id,
        state,
        overlay,
        window,
        host,
        provider,
        config,
        notices,
        snapshot: snapshot_tx,
        last_frame_ts: None,
        exit_sent: false,
    };
    let task = tokio::spawn(runner.run(commands_rx, stop_rx));

    tracing::info!(session_id = %params.session_id, width, height, "Surface opened");

    Ok(SurfaceHandle {
        control: SurfaceControl {
            session_id: params.session_id,
            commands: commands_tx,
        },
        snapshot: snapshot_rx,
        stop: Some(stop_tx),
        task: Some(task),
    })
}

struct SurfaceRunner {
    session_id: SessionId,
    state: SurfaceState,
    overlay: OverlayState,
    window: Box<dyn HostWindow>,
    host: Arc<dyn WindowHost>,
    provider: ProviderHandle,
    config: SurfaceConfig,
    notices: mpsc::UnboundedSender<SurfaceNotice>,
    snapshot: watch::Sender<SurfaceSnapshot>,
    last_frame_ts: Option<u64>,
    exit_sent: bool,
}

impl SurfaceRunner {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SurfaceCommand>,
        mut stop: oneshot::Receiver<()>,
    ) -> ProviderStats {
        let mut render = tokio::time::interval(self.config.tick);
        render.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut hover = tokio::time::interval(self.config.hover_poll);
        hover.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut provider_live = true;

        loop {
            tokio::select! {
                _ = &mut stop => break,
                Some(command) = commands.recv() => self.handle_command(command),
                event = self.provider.next_event(), if provider_live => match event {
                    Some(event) => self.handle_provider_event(event),
                    None => provider_live = false,
                },
                _ = render.tick() => self.render_tick(),
                _ = hover.tick() => self.hover_poll(),
            }
        }

        self.window.close();
        let stats = self.provider.shutdown().await;
        tracing::info!(
            session_id = %self.session_id,
            frames = stats.frames_captured,
            errors = stats.capture_errors,
            "Surface closed"
        );
        stats
    }

    fn publish(&self) {
        self.snapshot
            .send_replace(self.state.snapshot(self.overlay.visible()));
    }

    fn request_close(&mut self, exit: SurfaceExit) {
        if self.exit_sent {
            return;
        }
        self.exit_sent = true;
        let notice = SurfaceNotice {
            session_id: self.session_id,
            exit,
        };
        if self.notices.send(notice).is_err() {
            tracing::debug!(session_id = %self.session_id, "Registry gone, close notice dropped");
        }
    }

    /// State changes are published before the reply is sent.
    fn handle_command(&mut self, command: SurfaceCommand) {
        let now = Instant::now();
        match command {
            SurfaceCommand::SetOpacity { value, reply } => {
                let result = self
                    .state
                    .set_opacity(value, self.window.as_mut(), now)
                    .map(|o| o.value());
                self.publish();
                let _ = reply.send(result);
            }
            SurfaceCommand::SetAlwaysOnTop { value, reply } => {
                let result = self.state.set_always_on_top(value, self.window.as_mut());
                self.publish();
                let _ = reply.send(result);
            }
            SurfaceCommand::SetAspectRatio { ratio, reply } => {
                let result = self.state.set_aspect_ratio(ratio, self.window.as_mut());
                self.publish();
                let _ = reply.send(result);
            }
            SurfaceCommand::IsCursorInside { reply } => {
                let inside = self
                    .host
                    .pointer_position()
                    .map(|p| self.window.bounds().contains(p));
                let _ = reply.send(inside);
            }
            SurfaceCommand::DragCrop { dx, dy, reply } => {
                let crop = self.state.drag_crop(dx, dy);
                self.publish();
                let _ = reply.send(Ok(crop));
            }
        }
    }

    fn handle_provider_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::SourceResized { width, height } => {
                match self.state.on_source_resized(width, height, self.window.as_mut()) {
                    Ok(true) => {
                        tracing::debug!(session_id = %self.session_id, width, height, "Source aspect changed");
                        self.publish();
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(session_id = %self.session_id, error = %e, "Auto-resize failed")
                    }
                }
            }
            ProviderEvent::StrategyChanged(strategy) => {
                tracing::debug!(session_id = %self.session_id, ?strategy, "Capture strategy changed");
            }
            ProviderEvent::SourceLost { reason } => {
                tracing::info!(session_id = %self.session_id, %reason, "Source lost, closing session");
                self.request_close(SurfaceExit::SourceLost { reason });
            }
        }
    }

    fn render_tick(&mut self) {
        let now = Instant::now();
        let mut changed = false;

        for event in self.window.drain_events() {
            changed = true;
            self.overlay.on_activity();
            match self.state.handle_event(event, self.window.as_mut(), now) {
                Ok(EventOutcome::Handled) => {}
                Ok(EventOutcome::CloseRequested) => self.request_close(SurfaceExit::UserClosed),
                Err(e) => {
                    tracing::debug!(session_id = %self.session_id, error = %e, "Surface input ignored")
                }
            }
        }

        let Some(frame) = self.provider.latest() else {
            if changed {
                self.publish();
            }
            return;
        };
        if self.last_frame_ts != Some(frame.timestamp_ns) {
            self.last_frame_ts = Some(frame.timestamp_ns);
            changed |= self.state.observe_frame(&frame, self.window.as_mut());
        }

        if let Some(plan) = self.state.plan(
            &frame,
            self.window.as_ref(),
            self.config.background,
            self.overlay.visible(),
            now,
        ) {
            if let Err(e) = self.window.present(&frame, &plan) {
                tracing::trace!(session_id = %self.session_id, error = %e, "Present failed");
            }
        }

        if changed {
            self.publish();
        }
    }

    fn hover_poll(&mut self) {
        let pointer = match self.host.pointer_position() {
            Ok(pointer) => pointer,
            Err(e) => {
                tracing::trace!(session_id = %self.session_id, error = %e, "Pointer query failed");
                return;
            }
        };
        let inside = self.window.bounds().contains(pointer);
        if let Some(change) = self.overlay.on_poll(inside, Instant::now()) {
            let interactive = change == OverlayChange::Shown;
            if let Err(e) = self.window.set_controls_interactive(interactive) {
                tracing::debug!(session_id = %self.session_id, error = %e, "Overlay update failed");
            }
            self.publish();
        }
    }
}
