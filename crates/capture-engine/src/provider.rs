//! Capture Source Provider.
//!
//! One provider task per session turns a [`SourceId`] into a live stream of
//! frames. Delivery is push, most-recent-frame-only: every captured frame
//! replaces the previous one in a `watch` slot, so a slow consumer simply
//! sees fewer frames and the provider never waits on it.

use std::sync::Arc;
use std::time::Duration;

use pipview_common::clock::{RateController, SessionClock};
use pipview_common::config::CaptureDefaults;
use pipview_common::error::{PipError, PipResult};
use pipview_platform_core::{CaptureFrame, Rect, MINIMIZED_LABEL};
use pipview_session_model::{SourceId, SourceType, WindowDescriptor};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::backend::{CaptureBackend, WindowGrab};
use crate::tracking::{Relocation, WindowStrategy, WindowTracker};

/// Provider timing parameters.
#[derive(Debug, Clone, Copy)]
pub struct ProviderConfig {
    pub tick: Duration,
    pub lost_after_misses: u32,
}

impl From<&CaptureDefaults> for ProviderConfig {
    fn from(defaults: &CaptureDefaults) -> Self {
        Self {
            tick: Duration::from_millis(defaults.tick_ms.max(1)),
            lost_after_misses: defaults.lost_after_misses,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::from(&CaptureDefaults::default())
    }
}

/// Out-of-band notifications from a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Captured frames changed size.
    SourceResized { width: u32, height: u32 },
    /// A window source switched capture strategy.
    StrategyChanged(WindowStrategy),
    /// The source is confirmed gone; the provider has stopped.
    SourceLost { reason: String },
}

/// Runtime statistics from a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Frames delivered to the slot.
    pub frames_captured: u64,

    /// Placeholder frames delivered for minimized windows.
    pub placeholders: u64,

    /// Capture calls that failed transiently.
    pub capture_errors: u64,

    /// Times a tracked window's bounding box changed.
    pub relocations: u64,
}

impl ProviderStats {
    /// Failed captures as a percentage of all attempts.
    pub fn error_rate(&self) -> f64 {
        let total = self.frames_captured + self.capture_errors;
        if total == 0 {
            return 0.0;
        }
        self.capture_errors as f64 / total as f64 * 100.0
    }
}

enum CaptureTarget {
    Monitor { index: usize },
    Region(Rect),
    Window(WindowTracker),
}

enum Step {
    Frame(CaptureFrame),
    Lost(String),
}

struct CaptureSourceProvider {
    backend: Arc<dyn CaptureBackend>,
    source_id: String,
    target: CaptureTarget,
    config: ProviderConfig,
    clock: SessionClock,
    error_log: RateController,
    last_size: Option<(u32, u32)>,
    stats: ProviderStats,
    frames: watch::Sender<Option<Arc<CaptureFrame>>>,
    events: mpsc::UnboundedSender<ProviderEvent>,
}

/// Owner's side of a running provider.
pub struct ProviderHandle {
    source_type: SourceType,
    frames: watch::Receiver<Option<Arc<CaptureFrame>>>,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<ProviderStats>>,
}

/// Resolve `source`, capture a first frame, and start the provider task.
///
/// Fails with `SourceUnavailable` when the source cannot be found or the
/// first capture fails; nothing keeps running in that case.
pub async fn open_provider(
    backend: Arc<dyn CaptureBackend>,
    source: &SourceId,
    window: Option<&WindowDescriptor>,
    config: ProviderConfig,
) -> PipResult<ProviderHandle> {
    let target = resolve_target(backend.as_ref(), source, window, &config).await?;
    let (frames_tx, frames_rx) = watch::channel(None);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let mut provider = CaptureSourceProvider {
        backend,
        source_id: source.to_string(),
        target,
        config,
        clock: SessionClock::start(),
        error_log: RateController::new(1),
        last_size: None,
        stats: ProviderStats::default(),
        frames: frames_tx,
        events: events_tx,
    };

    match provider.capture_once().await {
        Ok(Step::Frame(frame)) => provider.deliver(frame),
        Ok(Step::Lost(reason)) => return Err(PipError::source_unavailable(reason)),
        Err(e) => {
            return Err(PipError::source_unavailable(format!(
                "first capture of {source} failed: {}",
                e.detail()
            )))
        }
    }

    tracing::info!(source_id = %source, backend = provider.backend.name(), "Capture provider started");

    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(provider.run(stop_rx));

    Ok(ProviderHandle {
        source_type: source.source_type(),
        frames: frames_rx,
        events: events_rx,
        stop: Some(stop_tx),
        task: Some(task),
    })
}

async fn resolve_target(
    backend: &dyn CaptureBackend,
    source: &SourceId,
    window: Option<&WindowDescriptor>,
    config: &ProviderConfig,
) -> PipResult<CaptureTarget> {
    let unavailable = |e: PipError| PipError::source_unavailable(e.detail());
    let direct = backend.capabilities().direct_window_capture;

    match source {
        SourceId::Monitor { index } => {
            let monitors = backend.monitors().await.map_err(unavailable)?;
            if *index >= monitors.len() {
                return Err(PipError::source_unavailable(format!(
                    "monitor {index} not connected ({} available)",
                    monitors.len()
                )));
            }
            Ok(CaptureTarget::Monitor { index: *index })
        }
        SourceId::Region(rect) => Ok(CaptureTarget::Region(*rect)),
        SourceId::Window { handle } => {
            let windows = backend.windows().await.map_err(unavailable)?;
            let (title, bbox) = match windows.iter().find(|w| w.handle == Some(*handle)) {
                Some(found) => (found.title.clone(), found.bounds),
                None => match window {
                    Some(desc) => (desc.title.clone(), desc.bbox),
                    None => {
                        return Err(PipError::source_unavailable(format!(
                            "no window with handle {handle}"
                        )))
                    }
                },
            };
            if !direct {
                tracing::debug!(handle, "Direct window capture unavailable, tracking by title");
            }
            Ok(CaptureTarget::Window(WindowTracker::new(
                title,
                bbox,
                Some(*handle),
                direct,
                config.lost_after_misses,
            )))
        }
        SourceId::WindowTitle { title } => {
            let windows = backend.windows().await.map_err(unavailable)?;
            let (bbox, handle) = match windows.iter().find(|w| &w.title == title) {
                Some(found) => (found.bounds, found.handle),
                None => match window {
                    Some(desc) => (desc.bbox, desc.handle),
                    None => {
                        return Err(PipError::source_unavailable(format!(
                            "no window titled '{title}'"
                        )))
                    }
                },
            };
            Ok(CaptureTarget::Window(WindowTracker::new(
                title.clone(),
                bbox,
                handle,
                direct,
                config.lost_after_misses,
            )))
        }
    }
}

impl CaptureSourceProvider {
    async fn run(mut self, mut stop: oneshot::Receiver<()>) -> ProviderStats {
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the probe frame covers it.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = interval.tick() => {
                    if self.frames.is_closed() {
                        break;
                    }
                    match self.capture_once().await {
                        Ok(Step::Frame(frame)) => self.deliver(frame),
                        Ok(Step::Lost(reason)) => {
                            tracing::warn!(source_id = %self.source_id, %reason, "Capture source lost");
                            let _ = self.events.send(ProviderEvent::SourceLost { reason });
                            break;
                        }
                        Err(e) => {
                            self.stats.capture_errors += 1;
                            if self.error_log.should_tick(self.clock.elapsed_ns()) {
                                tracing::warn!(
                                    source_id = %self.source_id,
                                    error = %e,
                                    errors = self.stats.capture_errors,
                                    "Capture failed, keeping last frame"
                                );
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!(source_id = %self.source_id, stats = ?self.stats, "Capture provider stopped");
        self.stats
    }

    async fn capture_once(&mut self) -> PipResult<Step> {
        match &mut self.target {
            CaptureTarget::Monitor { index } => match self.backend.capture_monitor(*index).await {
                Ok(frame) => Ok(Step::Frame(frame)),
                Err(PipError::NotFound { .. }) => {
                    Ok(Step::Lost(format!("monitor {index} disconnected")))
                }
                Err(e) => Err(e),
            },
            CaptureTarget::Region(rect) => {
                self.backend.capture_region(*rect).await.map(Step::Frame)
            }
            CaptureTarget::Window(tracker) => {
                if let WindowStrategy::Direct { handle } = tracker.strategy() {
                    match self.backend.capture_window(handle).await? {
                        WindowGrab::Frame(frame) => {
                            tracker.direct_ok();
                            return Ok(Step::Frame(frame));
                        }
                        WindowGrab::Minimized => {
                            tracker.direct_ok();
                            self.stats.placeholders += 1;
                            return Ok(Step::Frame(CaptureFrame::placeholder(MINIMIZED_LABEL, 0)));
                        }
                        WindowGrab::Gone => {
                            tracing::info!(
                                source_id = %self.source_id,
                                handle,
                                "Window handle gone, falling back to title tracking"
                            );
                            tracker.handle_gone();
                            let _ = self
                                .events
                                .send(ProviderEvent::StrategyChanged(tracker.strategy()));
                        }
                    }
                }

                match self.backend.windows().await {
                    Ok(windows) => match tracker.relocate(&windows) {
                        Relocation::Found { moved: true } => {
                            self.stats.relocations += 1;
                            tracing::debug!(source_id = %self.source_id, bbox = ?tracker.bbox(), "Window moved");
                        }
                        Relocation::Found { moved: false } => {}
                        Relocation::Missing { misses } => {
                            if tracker.is_lost() {
                                return Ok(Step::Lost(format!(
                                    "window '{}' closed",
                                    tracker.title()
                                )));
                            }
                            tracing::trace!(source_id = %self.source_id, misses, "Window not located, using last box");
                        }
                    },
                    Err(e) => {
                        tracing::debug!(source_id = %self.source_id, error = %e, "Window enumeration failed");
                    }
                }

                self.backend
                    .capture_region(tracker.bbox())
                    .await
                    .map(Step::Frame)
            }
        }
    }

    fn deliver(&mut self, mut frame: CaptureFrame) {
        frame.timestamp_ns = self.clock.elapsed_ns();

        if !frame.is_placeholder() {
            let size = frame.size();
            if self.last_size.is_some_and(|last| last != size) {
                let _ = self.events.send(ProviderEvent::SourceResized {
                    width: size.0,
                    height: size.1,
                });
            }
            self.last_size = Some(size);
        }

        self.stats.frames_captured += 1;
        self.frames.send_replace(Some(Arc::new(frame)));
    }
}

impl ProviderHandle {
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// The most recent frame, if any. Never waits.
    pub fn latest(&self) -> Option<Arc<CaptureFrame>> {
        self.frames.borrow().clone()
    }

    /// Next queued event without waiting.
    pub fn try_event(&mut self) -> Option<ProviderEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the next event. `None` once the provider has stopped and
    /// all events were consumed.
    pub async fn next_event(&mut self) -> Option<ProviderEvent> {
        self.events.recv().await
    }

    /// Stop the provider task and wait for it to release the source.
    pub async fn shutdown(mut self) -> ProviderStats {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.task.take() {
            Some(task) => match task.await {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::warn!(error = %e, "Capture provider task join failed");
                    ProviderStats::default()
                }
            },
            None => ProviderStats::default(),
        }
    }
}

impl Drop for ProviderHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
