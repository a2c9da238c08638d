use super::*;
use crate::capture::{GestureKind, MemoryImageStore};
use crate::config::{LensCamConfig, WidgetProps};
use crate::engine::{Capability, CapturedImage, Facing, MockCameraEngine, PermissionOutcome};
use crate::events::{EventBus, WidgetEvent};
use crate::lenses::LensDescriptor;
use crate::main_context::MainContext;
use crate::safe_region::Rect;
use crate::session::{SessionState, REQUIRED_CAPABILITIES};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn valid_props() -> WidgetProps {
    WidgetProps {
        api_token: "t1".to_string(),
        group_id: "g1".to_string(),
        lens_id: "l1".to_string(),
        ..WidgetProps::default()
    }
}

fn auto_engine() -> MockCameraEngine {
    MockCameraEngine::new()
        .with_auto_permissions(PermissionOutcome::granting(REQUIRED_CAPABILITIES))
        .with_auto_catalog(vec![LensDescriptor::new("l1"), LensDescriptor::new("l2")])
        .with_auto_snapshot(CapturedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 1,
            height: 1,
        })
}

fn adapter(engine: &MockCameraEngine, main: &MainContext, props: WidgetProps) -> WidgetAdapter {
    let config = LensCamConfig {
        props,
        ..LensCamConfig::default()
    };
    WidgetAdapter::builder()
        .widget_id("w1")
        .config(config)
        .engine(Arc::new(engine.clone()))
        .image_store(Arc::new(MemoryImageStore::new()))
        .main_context(main.clone())
        .build()
        .unwrap()
}

async fn wait_until<F: Fn() -> bool>(main: &MainContext, condition: F) {
    for _ in 0..200 {
        main.flush().await;
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_missing_group_id_keeps_widget_created() {
    let engine = auto_engine();
    let main = MainContext::spawn();
    let props = WidgetProps {
        group_id: String::new(),
        ..valid_props()
    };
    let mut widget = adapter(&engine, &main, props);

    widget.attach();
    main.flush().await;

    assert_eq!(widget.state(), SessionState::Created);
    assert!(widget.controller().is_none());
    assert!(engine.permission_requests().is_empty());
}

#[tokio::test]
async fn test_group_mode_requires_no_lens_id() {
    let engine = auto_engine();
    let main = MainContext::spawn();
    let props = WidgetProps {
        lens_id: String::new(),
        single_lens: false,
        ..valid_props()
    };
    let mut widget = adapter(&engine, &main, props);

    widget.attach();
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;
    let session = engine.latest_session().unwrap();
    wait_until(&main, || session.applied_lenses() == vec!["l1"]).await;
}

#[tokio::test]
async fn test_props_becoming_valid_starts_session() {
    let engine = auto_engine();
    let main = MainContext::spawn();
    let mut widget = adapter(&engine, &main, WidgetProps::default());

    widget.attach();
    assert_eq!(widget.state(), SessionState::Created);

    widget.update_props(valid_props());
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;
    assert_eq!(engine.sessions_created(), 1);
}

#[tokio::test]
async fn test_identity_change_rebuilds_without_double_session() {
    let engine = auto_engine();
    let main = MainContext::spawn();
    let mut widget = adapter(&engine, &main, valid_props());

    widget.attach();
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;
    let first = engine.latest_session().unwrap();

    widget.update_props(WidgetProps {
        lens_id: "l2".to_string(),
        ..valid_props()
    });
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;
    let second = engine.latest_session().unwrap();
    wait_until(&main, || second.applied_lenses() == vec!["l2"]).await;

    assert!(first.is_closed());
    assert_ne!(first.id(), second.id());
    assert_eq!(engine.sessions_created(), 2);
    assert_eq!(engine.live_sessions(), 1);
    assert_eq!(engine.max_live_sessions(), 1);
}

#[tokio::test]
async fn test_non_identity_props_update_in_place() {
    let engine = auto_engine();
    let main = MainContext::spawn();
    let mut widget = adapter(&engine, &main, valid_props());

    widget.attach();
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;

    widget.update_props(WidgetProps {
        show_preview: false,
        show_front_camera: true,
        ..valid_props()
    });
    main.flush().await;

    let session = engine.latest_session().unwrap();
    assert_eq!(engine.sessions_created(), 1);
    let facings: Vec<Facing> = session.previews().into_iter().map(|(f, _)| f).collect();
    assert_eq!(facings, vec![Facing::Back, Facing::Front]);
    assert_eq!(widget.controller().unwrap().facing(), Facing::Front);
}

#[tokio::test]
async fn test_props_becoming_invalid_tears_down_until_restored() {
    let engine = auto_engine();
    let main = MainContext::spawn();
    let mut widget = adapter(&engine, &main, valid_props());

    widget.attach();
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;

    widget.update_props(WidgetProps {
        api_token: String::new(),
        ..valid_props()
    });
    assert_eq!(widget.state(), SessionState::Created);
    assert_eq!(engine.live_sessions(), 0);

    widget.update_props(valid_props());
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;
    assert_eq!(engine.sessions_created(), 2);
    assert_eq!(engine.max_live_sessions(), 1);
}

#[tokio::test]
async fn test_reattach_builds_fresh_controller() {
    let engine = auto_engine();
    let main = MainContext::spawn();
    let mut widget = adapter(&engine, &main, valid_props());

    widget.attach();
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;
    widget.detach();
    assert!(widget.controller().is_none());
    assert_eq!(engine.live_sessions(), 0);

    widget.attach();
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;
    assert_eq!(engine.permission_requests().len(), 2);
    assert_eq!(engine.max_live_sessions(), 1);
}

#[tokio::test]
async fn test_layout_survives_rebuild() {
    let engine = auto_engine();
    let main = MainContext::spawn();
    let mut widget = adapter(&engine, &main, valid_props());

    widget.set_capture_button(Rect::new(440, 1700, 640, 1900));
    widget.on_layout_change(Rect::new(0, 0, 0, 0), Rect::new(0, 0, 1080, 1920));
    widget.attach();
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;

    widget.update_props(WidgetProps {
        group_id: "g2".to_string(),
        ..valid_props()
    });
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;

    let session = engine.latest_session().unwrap();
    assert_eq!(session.safe_area(), Some(Rect::new(0, 0, 1080, 1700)));
}

#[tokio::test]
async fn test_host_bridge_emits_named_events() {
    let temp_dir = TempDir::new().unwrap();
    let engine = auto_engine();
    let main = MainContext::spawn();
    let mut config = LensCamConfig::default();
    config.props = WidgetProps {
        lens_id: String::new(),
        single_lens: false,
        ..valid_props()
    };
    config.capture.cache_dir = temp_dir.path().to_path_buf();

    let mut widget = WidgetAdapter::builder()
        .config(config)
        .engine(Arc::new(engine.clone()))
        .main_context(main.clone())
        .build()
        .unwrap();
    let emitter = Arc::new(RecordingEmitter::new());
    let bridge = HostBridge::spawn(widget.bus(), emitter.clone());

    widget.attach();
    wait_until(&main, || widget.state() == SessionState::SessionActive).await;
    widget.on_gesture_start();
    widget.on_gesture_end(GestureKind::Snapshot);
    wait_until(&main, || emitter.names().contains(&"onImageCaptured")).await;
    wait_until(&main, || emitter.names().contains(&"onPreviewRequested")).await;

    let events = emitter.events();
    let by_name = |name: &str| {
        events
            .iter()
            .find(|event| event.name == name)
            .map(|event| event.payload.clone())
            .unwrap()
    };
    assert_eq!(by_name("onLensCatalog"), json!({ "lensIds": ["l1", "l2"] }));
    assert_eq!(by_name("onLensChange"), json!({ "lensId": "l1" }));

    let uri = by_name("onImageCaptured")["imageUri"]
        .as_str()
        .unwrap()
        .to_string();
    let path = uri.strip_prefix("file://").unwrap();
    assert!(std::path::Path::new(path).starts_with(temp_dir.path()));
    assert!(std::path::Path::new(path).exists());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_permission_error_forwarded_once_to_host() {
    let engine = MockCameraEngine::new()
        .with_auto_permissions(PermissionOutcome::new().with(Capability::Camera, false));
    let main = MainContext::spawn();
    let mut widget = adapter(&engine, &main, valid_props());
    let emitter = Arc::new(RecordingEmitter::new());
    let bridge = HostBridge::spawn(widget.bus(), emitter.clone());

    widget.attach();
    wait_until(&main, || !emitter.events().is_empty()).await;

    assert_eq!(widget.state(), SessionState::PermissionDenied);
    assert_eq!(
        emitter.events()[0].payload,
        json!({ "kind": "PermissionError", "message": "Permissions missing: camera" })
    );
    assert_eq!(emitter.names(), vec!["onError"]);
    assert_eq!(engine.sessions_created(), 0);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_bridge_stops_on_shutdown() {
    let bus = EventBus::new(8);
    let emitter = Arc::new(RecordingEmitter::new());
    let bridge = HostBridge::spawn(&bus, emitter.clone());
    assert!(bridge.is_running());

    bridge.shutdown().await;
    let _ = bus.publish(WidgetEvent::LensChanged {
        lens_id: "l1".to_string(),
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(emitter.events().is_empty());
}

#[test]
fn test_bus_listener_publishes_and_tracks_preview_flag() {
    let bus = EventBus::new(8);
    let mut receiver = bus.subscribe();
    let listener = BusListener::new(bus.clone(), true);

    listener.on_lens_change("l7");
    listener.on_image_captured("file:///tmp/a.jpg");
    assert!(listener.should_show_default_preview());
    listener.set_show_preview(false);
    assert!(!listener.should_show_default_preview());

    assert_eq!(
        receiver.try_recv().unwrap(),
        WidgetEvent::LensChanged {
            lens_id: "l7".to_string()
        }
    );
    assert_eq!(
        receiver.try_recv().unwrap(),
        WidgetEvent::ImageCaptured {
            image_uri: "file:///tmp/a.jpg".to_string()
        }
    );
}

#[test]
fn test_fn_listener_defaults_are_inert() {
    let listener = FnListener::default();
    listener.on_image_captured("memory://x");
    listener.on_lens_change("l1");
    assert!(!listener.should_show_default_preview());
}
