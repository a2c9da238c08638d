pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod error_channel;
pub mod events;
pub mod executor;
pub mod lenses;
pub mod main_context;
pub mod safe_region;
pub mod scope;
pub mod session;
pub mod widget;

pub use capture::{CacheDirImageStore, CaptureGate, CaptureState, CaptureStats, GestureKind, ImageStore, MemoryImageStore};
pub use config::{CaptureConfig, EventConfig, LensCamConfig, LensMode, PreviewConfig, SessionIdentity, WidgetProps};
pub use engine::{
    CameraEngine, CameraSession, Capability, CapturedImage, Facing, InputOptions,
    MockCameraEngine, MockSession, PermissionOutcome, SessionConfig,
};
pub use error::{EventBusError, LensCamError, Result, SessionError, WidgetError};
pub use error_channel::ErrorChannel;
pub use events::{EventBus, EventFilter, EventReceiver, HostEvent, WidgetEvent};
pub use executor::SerialExecutor;
pub use lenses::{ApplyClaim, LensAction, LensDescriptor, LensFacing, LensSelectionState};
pub use main_context::MainContext;
pub use safe_region::{Rect, SafeRegionTracker};
pub use scope::{Handle, ResourceScope};
pub use session::{ControllerContext, SessionController, SessionState, REQUIRED_CAPABILITIES};
pub use widget::{
    BusListener, CameraListener, FnListener, HostBridge, HostEmitter, RecordingEmitter,
    WidgetAdapter, WidgetAdapterBuilder,
};
