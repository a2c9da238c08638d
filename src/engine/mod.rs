//! Boundary to the external AR camera engine.
//!
//! The engine owns frames, lens metadata and capture primitives. Every call
//! here is fire-and-forget: results come back later through the supplied
//! callback, possibly on an engine thread.

mod mock;

pub use mock::{MockCameraEngine, MockSession};

use crate::error::SessionError;
use crate::executor::SerialExecutor;
use crate::lenses::LensDescriptor;
use crate::safe_region::Rect;
use crate::scope::Handle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;

pub type Callback<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Live catalog feed; may fire any number of times
pub type CatalogCallback = Box<dyn FnMut(Result<Vec<LensDescriptor>, SessionError>) + Send + 'static>;

/// Capability the widget needs the user to grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    Camera,
    Microphone,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Camera => "camera",
            Capability::Microphone => "microphone",
        }
    }
}

/// Resolved permission request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionOutcome {
    results: BTreeMap<Capability, bool>,
}

impl PermissionOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability, granted: bool) -> Self {
        self.results.insert(capability, granted);
        self
    }

    pub fn granting(capabilities: &[Capability]) -> Self {
        capabilities
            .iter()
            .fold(Self::new(), |outcome, capability| outcome.with(*capability, true))
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.results.get(&capability).copied().unwrap_or(false)
    }

    /// Required capabilities that were denied or never answered
    pub fn denied(&self, required: &[Capability]) -> Vec<Capability> {
        required
            .iter()
            .copied()
            .filter(|capability| !self.is_granted(*capability))
            .collect()
    }

    pub fn all_granted(&self, required: &[Capability]) -> bool {
        self.denied(required).is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Back,
}

/// Frame input options passed when starting the preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputOptions {
    pub mirror_horizontally: bool,
    pub aspect_ratio: String,
}

/// Encoded still image produced by a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Everything the engine needs to build a session
pub struct SessionConfig {
    pub api_token: String,
    /// Serial background context for the image pipeline
    pub executor: Arc<SerialExecutor>,
    /// Render-safe-area input
    pub safe_area: watch::Receiver<Option<Rect>>,
}

pub trait CameraEngine: Send + Sync {
    fn request_permissions(
        &self,
        capabilities: &[Capability],
        on_result: Callback<PermissionOutcome>,
    ) -> Handle;

    fn is_supported(&self) -> bool;

    fn create_session(&self, config: SessionConfig) -> Result<Arc<dyn CameraSession>, SessionError>;
}

pub trait CameraSession: Send + Sync {
    fn start_preview(&self, facing: Facing, options: InputOptions, on_ack: Callback<bool>);

    fn stop_preview(&self);

    fn take_snapshot(&self, on_image: Callback<Result<CapturedImage, SessionError>>);

    fn observe_lenses(&self, group_ids: &BTreeSet<String>, on_result: CatalogCallback) -> Handle;

    fn apply_lens(&self, lens: &LensDescriptor, on_ack: Callback<bool>);

    fn close(&self);
}
