//! Registry and control channel behaviour over the synthetic backend and
//! the headless host.

use std::sync::Arc;
use std::time::Duration;

use pipview_capture_engine::{BackendCapabilities, CaptureBackend, SyntheticBackend, WindowGrab};
use pipview_common::error::{ErrorKind, PipError, PipResult};
use pipview_control_plane::{ControlChannel, RegistryConfig, SessionRegistry};
use pipview_platform_core::headless::HeadlessHost;
use pipview_platform_core::{CaptureFrame, HostEvent, MonitorInfo, Point, Rect, WindowInfo};
use pipview_session_model::{
    ControlPush, ControlRequest, ControlResponse, CropRect, OpenRequest, SessionId, SourceType,
};

struct Harness {
    backend: Arc<SyntheticBackend>,
    host: HeadlessHost,
    channel: ControlChannel,
}

fn harness() -> Harness {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let host = HeadlessHost::new();
    let channel = SessionRegistry::spawn(
        backend.clone(),
        Arc::new(host.clone()),
        RegistryConfig::default(),
    );
    Harness {
        backend,
        host,
        channel,
    }
}

fn monitor() -> OpenRequest {
    OpenRequest::new("monitor:0", "Monitor 1")
}

#[tokio::test(start_paused = true)]
async fn open_assigns_first_id_and_broadcasts() {
    let h = harness();
    let id = h.channel.open(monitor()).await.unwrap();
    assert_eq!(id, SessionId(1));

    let list = h.channel.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, id);
    assert_eq!(list[0].source_type, SourceType::Monitor);
    assert_eq!(list[0].source_name, "Monitor 1");
    assert_eq!(h.channel.roster().count, 1);
}

#[tokio::test(start_paused = true)]
async fn open_without_source_is_invalid_and_changes_nothing() {
    let h = harness();
    let before = h.channel.roster();

    let err = h.channel.open(OpenRequest::default()).await.unwrap_err();
    assert!(matches!(err, PipError::InvalidRequest { .. }));
    assert!(h.channel.list().await.unwrap().is_empty());
    assert_eq!(h.channel.roster(), before);

    let response = h
        .channel
        .dispatch(ControlRequest::Open(OpenRequest::default()))
        .await;
    match response {
        ControlResponse::Error { kind, message } => {
            assert_eq!(kind, ErrorKind::InvalidRequest);
            assert_eq!(message, "sourceId is required");
        }
        other => panic!("unexpected response {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn close_removes_only_that_session() {
    let h = harness();
    let first = h.channel.open(monitor()).await.unwrap();
    let second = h
        .channel
        .open(OpenRequest::new("window:1001", "Terminal"))
        .await
        .unwrap();
    assert_eq!((first, second), (SessionId(1), SessionId(2)));

    h.channel.close(first).await.unwrap();
    let list = h.channel.list().await.unwrap();
    assert_eq!(list.iter().map(|s| s.id).collect::<Vec<_>>(), vec![second]);
    assert_eq!(h.channel.roster().count, 1);
    // The closed session's window is gone before close returns.
    assert!(h.host.window(1).unwrap().closed);
    assert!(!h.host.window(2).unwrap().closed);

    let err = h.channel.close(first).await.unwrap_err();
    assert!(matches!(err, PipError::NotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn opacity_requests_are_clamped() {
    let h = harness();
    let id = h.channel.open(monitor()).await.unwrap();

    let response = h
        .channel
        .dispatch(ControlRequest::SetOpacity {
            session_id: id,
            value: -5.0,
        })
        .await;
    assert_eq!(response, ControlResponse::Ok);
    assert_eq!(h.channel.list().await.unwrap()[0].flags.opacity.value(), 0.1);
    assert_eq!(h.host.window(1).unwrap().opacity, 0.1);

    assert_eq!(h.channel.set_opacity(id, 5.0).await.unwrap(), 1.0);
    assert_eq!(h.channel.list().await.unwrap()[0].flags.opacity.value(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn scoped_requests_for_unknown_session_are_not_found() {
    let h = harness();
    let response = h
        .channel
        .dispatch(ControlRequest::SetAlwaysOnTop {
            session_id: SessionId(42),
            value: false,
        })
        .await;
    assert!(matches!(
        response,
        ControlResponse::Error {
            kind: ErrorKind::NotFound,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn close_all_is_idempotent() {
    let h = harness();
    h.channel.close_all().await.unwrap();
    assert!(h.channel.list().await.unwrap().is_empty());

    h.channel.open(monitor()).await.unwrap();
    h.channel.open(monitor()).await.unwrap();
    h.channel.close_all().await.unwrap();
    assert!(h.channel.list().await.unwrap().is_empty());
    assert_eq!(h.channel.roster().count, 0);

    h.channel.close_all().await.unwrap();
    assert_eq!(h.channel.roster().count, 0);

    // Ids are never reused.
    assert_eq!(h.channel.open(monitor()).await.unwrap(), SessionId(3));
}

#[tokio::test(start_paused = true)]
async fn unavailable_source_creates_no_session() {
    let h = harness();
    let err = h
        .channel
        .open(OpenRequest::new("monitor:4", "Monitor 5"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(h.channel.list().await.unwrap().is_empty());
    assert!(h.host.open_window_ids().is_empty());

    // The failed attempt's id is not handed out again.
    assert_eq!(h.channel.open(monitor()).await.unwrap(), SessionId(2));
}

#[tokio::test(start_paused = true)]
async fn crop_outside_source_is_rejected() {
    let h = harness();
    let request = OpenRequest {
        crop: Some(CropRect::new(1800, 0, 640, 480)),
        ..monitor()
    };
    let err = h.channel.open(request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(h.channel.roster().count, 0);
}

#[tokio::test(start_paused = true)]
async fn source_loss_closes_session_autonomously() {
    let h = harness();
    let mut roster = h.channel.subscribe_roster();
    h.channel.open(monitor()).await.unwrap();
    roster.borrow_and_update();

    h.backend.unplug_monitor(0);
    roster.changed().await.unwrap();
    assert_eq!(roster.borrow().count, 0);
    assert!(h.channel.list().await.unwrap().is_empty());
    assert!(h.host.window(1).unwrap().closed);
}

#[tokio::test(start_paused = true)]
async fn user_close_removes_session() {
    let h = harness();
    h.channel.open(monitor()).await.unwrap();
    let mut roster = h.channel.subscribe_roster();
    roster.borrow_and_update();

    assert!(h.host.push_event(1, HostEvent::Menu(pipview_platform_core::MenuAction::Close)));
    roster.changed().await.unwrap();
    assert!(roster.borrow().list.is_empty());
}

#[tokio::test(start_paused = true)]
async fn pushes_announce_new_sessions() {
    let h = harness();
    let mut pushes = h.channel.subscribe_pushes();
    let id = h.channel.open(monitor()).await.unwrap();

    match pushes.recv().await.unwrap() {
        ControlPush::Init {
            session_id,
            source_name,
            ..
        } => {
            assert_eq!(session_id, id);
            assert_eq!(source_name, "Monitor 1");
        }
        other => panic!("expected init, got {other:?}"),
    }
    assert_eq!(pushes.recv().await.unwrap(), ControlPush::PipsCount { count: 1 });
    match pushes.recv().await.unwrap() {
        ControlPush::PipsList { list } => assert_eq!(list.len(), 1),
        other => panic!("expected list, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn surface_link_targets_its_own_session() {
    let h = harness();
    let first = h.channel.open(monitor()).await.unwrap();
    let second = h.channel.open(monitor()).await.unwrap();
    let link = h.channel.link(second);

    link.set_opacity(0.5).await.unwrap();
    link.set_aspect_ratio(0.0).await.unwrap();
    link.set_always_on_top(false).await.unwrap();

    let list = h.channel.list().await.unwrap();
    let a = list.iter().find(|s| s.id == first).unwrap();
    let b = list.iter().find(|s| s.id == second).unwrap();
    assert_eq!(a.flags.opacity.value(), 1.0);
    assert_eq!(b.flags.opacity.value(), 0.5);
    assert!(!b.flags.maintain_aspect_ratio);
    assert!(!h.host.window(2).unwrap().always_on_top);
    assert!(h.host.window(1).unwrap().always_on_top);

    assert!(!link.is_cursor_inside().await.unwrap());
    let bounds = h.host.window(2).unwrap().bounds;
    h.host.set_pointer(Point::new(bounds.x + 5, bounds.y + 5));
    assert!(link.is_cursor_inside().await.unwrap());

    link.close().await.unwrap();
    assert_eq!(h.channel.roster().ids(), vec![first]);
}

#[tokio::test(start_paused = true)]
async fn roster_matches_list_after_any_sequence() {
    let h = harness();
    let mut open_ids = Vec::new();
    let steps: [i32; 10] = [1, 1, -1, 1, 1, -2, 1, -1, 1, -1];

    for step in steps {
        if step > 0 {
            open_ids.push(h.channel.open(monitor()).await.unwrap());
        } else {
            let idx = (-step - 1) as usize % open_ids.len();
            let id = open_ids.remove(idx);
            h.channel.close(id).await.unwrap();
        }
        let list = h.channel.list().await.unwrap();
        assert_eq!(list.len(), h.channel.roster().count);
        let ids: Vec<_> = list.iter().map(|s| s.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }
    assert_eq!(
        h.channel.roster().ids(),
        vec![SessionId(5), SessionId(6)]
    );
}

#[tokio::test(start_paused = true)]
async fn dropping_every_channel_closes_sessions() {
    let h = harness();
    h.channel.open(monitor()).await.unwrap();
    drop(h.channel);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.host.window(1).unwrap().closed);
}

/// Synthetic desktop whose region captures take a long time.
struct SlowRegions {
    inner: SyntheticBackend,
    delay: Duration,
}

#[async_trait::async_trait]
impl CaptureBackend for SlowRegions {
    fn name(&self) -> &str {
        "slow-regions"
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.inner.capabilities()
    }

    async fn monitors(&self) -> PipResult<Vec<MonitorInfo>> {
        self.inner.monitors().await
    }

    async fn windows(&self) -> PipResult<Vec<WindowInfo>> {
        self.inner.windows().await
    }

    async fn capture_monitor(&self, index: usize) -> PipResult<CaptureFrame> {
        self.inner.capture_monitor(index).await
    }

    async fn capture_window(&self, handle: u64) -> PipResult<WindowGrab> {
        self.inner.capture_window(handle).await
    }

    async fn capture_region(&self, rect: Rect) -> PipResult<CaptureFrame> {
        tokio::time::sleep(self.delay).await;
        self.inner.capture_region(rect).await
    }
}

#[tokio::test(start_paused = true)]
async fn slow_source_acquisition_does_not_block_other_requests() {
    let host = HeadlessHost::new();
    let channel = SessionRegistry::spawn(
        Arc::new(SlowRegions {
            inner: SyntheticBackend::with_default_layout(),
            delay: Duration::from_secs(60),
        }),
        Arc::new(host.clone()),
        RegistryConfig::default(),
    );
    let first = channel.open(monitor()).await.unwrap();

    let pending = {
        let channel = channel.clone();
        tokio::spawn(async move {
            channel
                .open(OpenRequest::new("region:0,0,100,100", "Region"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!pending.is_finished());

    let limit = Duration::from_secs(5);
    let list = tokio::time::timeout(limit, channel.list())
        .await
        .expect("list waited on a pending open")
        .unwrap();
    assert_eq!(list.iter().map(|s| s.id).collect::<Vec<_>>(), vec![first]);
    tokio::time::timeout(limit, channel.set_opacity(first, 0.5))
        .await
        .expect("scoped request waited on a pending open")
        .unwrap();
    tokio::time::timeout(limit, channel.close(first))
        .await
        .expect("close waited on a pending open")
        .unwrap();
    assert_eq!(channel.roster().count, 0);

    let second = pending.await.unwrap().unwrap();
    assert_eq!(second, SessionId(2));
    assert_eq!(channel.roster().ids(), vec![second]);
    assert_eq!(channel.list().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_source_is_gone_from_the_next_listing() {
    let h = harness();
    h.channel.open(monitor()).await.unwrap();
    let keep = h
        .channel
        .open(OpenRequest::new("region:0,0,320,240", "Corner"))
        .await
        .unwrap();

    h.backend.unplug_monitor(0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let list = h.channel.list().await.unwrap();
    assert_eq!(list.iter().map(|s| s.id).collect::<Vec<_>>(), vec![keep]);
    assert_eq!(h.channel.roster().count, list.len());
    assert!(h.host.window(1).unwrap().closed);
}
