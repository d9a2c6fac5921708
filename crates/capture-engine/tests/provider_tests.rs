//! Provider behaviour against the synthetic virtual desktop.

use std::sync::Arc;
use std::time::Duration;

use pipview_capture_engine::{
    open_provider, ProviderConfig, ProviderEvent, ProviderHandle, SyntheticBackend,
    WindowStrategy,
};
use pipview_common::error::PipError;
use pipview_platform_core::Rect;
use pipview_session_model::{SourceId, WindowDescriptor};

fn config() -> ProviderConfig {
    ProviderConfig {
        tick: Duration::from_millis(10),
        lost_after_misses: 3,
    }
}

fn drain(handle: &mut ProviderHandle) -> Vec<ProviderEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.try_event() {
        events.push(event);
    }
    events
}

async fn run_ticks(n: u64) {
    tokio::time::sleep(Duration::from_millis(10 * n + 5)).await;
}

#[tokio::test(start_paused = true)]
async fn region_frames_match_requested_size() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let source: SourceId = "region:10,20,320,240".parse().unwrap();
    let handle = open_provider(backend.clone(), &source, None, config())
        .await
        .unwrap();

    run_ticks(5).await;
    let frame = handle.latest().unwrap();
    assert_eq!(frame.size(), (320, 240));
    assert!(backend.capture_count() >= 5);

    let stats = handle.shutdown().await;
    assert!(stats.frames_captured >= 5);
    assert_eq!(stats.capture_errors, 0);
}

#[tokio::test(start_paused = true)]
async fn latest_frame_timestamps_advance() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let handle = open_provider(backend, &SourceId::Monitor { index: 0 }, None, config())
        .await
        .unwrap();
    let first = handle.latest().unwrap().timestamp_ns;
    run_ticks(3).await;
    let later = handle.latest().unwrap().timestamp_ns;
    assert!(later > first);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_window_title_is_unavailable() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let source = SourceId::WindowTitle {
        title: "Nowhere".to_string(),
    };
    let err = open_provider(backend, &source, None, config())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, PipError::SourceUnavailable { .. }));
}

#[tokio::test(start_paused = true)]
async fn first_capture_failure_is_unavailable() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    backend.inject_failures(1);
    let err = open_provider(backend, &SourceId::Monitor { index: 0 }, None, config())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, PipError::SourceUnavailable { .. }));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_keep_last_frame() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let mut handle = open_provider(backend.clone(), &SourceId::Monitor { index: 0 }, None, config())
        .await
        .unwrap();

    backend.inject_failures(4);
    run_ticks(2).await;
    assert!(handle.latest().is_some());
    run_ticks(6).await;
    assert!(drain(&mut handle).is_empty());

    let stats = handle.shutdown().await;
    assert_eq!(stats.capture_errors, 4);
}

#[tokio::test(start_paused = true)]
async fn unplugged_monitor_reports_source_lost() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let mut handle = open_provider(backend.clone(), &SourceId::Monitor { index: 0 }, None, config())
        .await
        .unwrap();

    backend.unplug_monitor(0);
    let event = handle.next_event().await.unwrap();
    assert!(matches!(event, ProviderEvent::SourceLost { .. }));
    // Provider has stopped and the event stream ends.
    assert!(handle.next_event().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn window_resize_is_reported_once() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    backend.set_direct_window_capture(false);
    let source = SourceId::WindowTitle {
        title: "Terminal".to_string(),
    };
    let mut handle = open_provider(backend.clone(), &source, None, config())
        .await
        .unwrap();
    assert_eq!(handle.latest().unwrap().size(), (800, 600));

    backend.set_window_bounds("Terminal", Rect::new(150, 150, 1000, 500));
    run_ticks(4).await;

    let events = drain(&mut handle);
    assert_eq!(
        events,
        vec![ProviderEvent::SourceResized {
            width: 1000,
            height: 500
        }]
    );
    assert_eq!(handle.latest().unwrap().size(), (1000, 500));

    let stats = handle.shutdown().await;
    assert_eq!(stats.relocations, 1);
}

#[tokio::test(start_paused = true)]
async fn minimized_window_yields_placeholder() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let mut handle = open_provider(backend.clone(), &SourceId::Window { handle: 1001 }, None, config())
        .await
        .unwrap();

    backend.set_minimized("Terminal", true);
    run_ticks(2).await;
    let frame = handle.latest().unwrap();
    assert!(frame.is_placeholder());
    assert_eq!(frame.size(), (400, 300));
    // Placeholders do not count as a source resize.
    assert!(drain(&mut handle).is_empty());

    backend.set_minimized("Terminal", false);
    run_ticks(2).await;
    assert_eq!(handle.latest().unwrap().size(), (800, 600));
    assert!(drain(&mut handle).is_empty());

    let stats = handle.shutdown().await;
    assert!(stats.placeholders >= 1);
}

#[tokio::test(start_paused = true)]
async fn gone_handle_falls_back_to_title_tracking() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let mut handle = open_provider(backend.clone(), &SourceId::Window { handle: 1001 }, None, config())
        .await
        .unwrap();

    // Window recreated under the same title with a new handle.
    backend.remove_window("Terminal");
    backend.add_window("Terminal", Rect::new(0, 0, 800, 600), Some(2002));
    run_ticks(3).await;

    let events = drain(&mut handle);
    assert_eq!(
        events,
        vec![ProviderEvent::StrategyChanged(WindowStrategy::BoundingBox)]
    );
    assert_eq!(handle.latest().unwrap().size(), (800, 600));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn closed_window_is_lost_after_misses() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    let mut handle = open_provider(backend.clone(), &SourceId::Window { handle: 1002 }, None, config())
        .await
        .unwrap();

    backend.remove_window("Browser");
    let mut saw_strategy_change = false;
    loop {
        match handle.next_event().await {
            Some(ProviderEvent::StrategyChanged(_)) => saw_strategy_change = true,
            Some(ProviderEvent::SourceLost { reason }) => {
                assert!(reason.contains("Browser"));
                break;
            }
            Some(other) => panic!("unexpected event {other:?}"),
            None => panic!("provider stopped without SourceLost"),
        }
    }
    assert!(saw_strategy_change);
}

#[tokio::test(start_paused = true)]
async fn descriptor_covers_window_missing_from_enumeration() {
    let backend = Arc::new(SyntheticBackend::with_default_layout());
    backend.set_direct_window_capture(false);
    let descriptor = WindowDescriptor {
        title: "Editor".to_string(),
        bbox: Rect::new(0, 0, 640, 480),
        handle: None,
    };
    let source = SourceId::WindowTitle {
        title: "Editor".to_string(),
    };
    let mut handle = open_provider(backend, &source, Some(&descriptor), config())
        .await
        .unwrap();
    assert_eq!(handle.latest().unwrap().size(), (640, 480));

    // Title-only sources are never declared lost.
    run_ticks(10).await;
    assert!(drain(&mut handle).is_empty());
    handle.shutdown().await;
}
