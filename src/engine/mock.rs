use super::{
    Callback, CameraEngine, CameraSession, Capability, CapturedImage, CatalogCallback, Facing,
    InputOptions, PermissionOutcome, SessionConfig,
};
use crate::error::SessionError;
use crate::executor::SerialExecutor;
use crate::lenses::LensDescriptor;
use crate::safe_region::Rect;
use crate::scope::Handle;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

type ImageCallback = Callback<Result<CapturedImage, SessionError>>;

/// In-process engine for tests and local simulation.
///
/// By default nothing resolves on its own: permission results, catalogs,
/// apply acks and snapshots are delivered by the caller, which makes every
/// callback interleaving reproducible.
#[derive(Clone)]
pub struct MockCameraEngine {
    state: Arc<Mutex<EngineState>>,
}

struct EngineState {
    supported: bool,
    fail_create: Option<String>,
    auto_permissions: Option<PermissionOutcome>,
    auto_catalog: Option<Vec<LensDescriptor>>,
    auto_snapshot: Option<CapturedImage>,
    auto_ack_apply: bool,
    permission_requests: Vec<Vec<Capability>>,
    pending_permissions: VecDeque<Callback<PermissionOutcome>>,
    sessions: Vec<Arc<MockSession>>,
    live_sessions: Arc<AtomicUsize>,
    max_live_sessions: Arc<AtomicUsize>,
}

impl MockCameraEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                supported: true,
                fail_create: None,
                auto_permissions: None,
                auto_catalog: None,
                auto_snapshot: None,
                auto_ack_apply: true,
                permission_requests: Vec::new(),
                pending_permissions: VecDeque::new(),
                sessions: Vec::new(),
                live_sessions: Arc::new(AtomicUsize::new(0)),
                max_live_sessions: Arc::new(AtomicUsize::new(0)),
            })),
        }
    }

    pub fn with_supported(self, supported: bool) -> Self {
        self.state.lock().supported = supported;
        self
    }

    pub fn with_create_failure<S: Into<String>>(self, details: S) -> Self {
        self.state.lock().fail_create = Some(details.into());
        self
    }

    /// Resolve every permission request immediately with `outcome`
    pub fn with_auto_permissions(self, outcome: PermissionOutcome) -> Self {
        self.state.lock().auto_permissions = Some(outcome);
        self
    }

    /// Deliver `lenses` as soon as a catalog is observed
    pub fn with_auto_catalog(self, lenses: Vec<LensDescriptor>) -> Self {
        self.state.lock().auto_catalog = Some(lenses);
        self
    }

    /// Answer snapshots with `image` from the session's serial executor
    pub fn with_auto_snapshot(self, image: CapturedImage) -> Self {
        self.state.lock().auto_snapshot = Some(image);
        self
    }

    /// Whether apply requests succeed immediately (default) or wait for `complete_applies`
    pub fn with_auto_ack_apply(self, auto: bool) -> Self {
        self.state.lock().auto_ack_apply = auto;
        self
    }

    /// Resolve the oldest pending permission request
    pub fn resolve_permissions(&self, outcome: PermissionOutcome) -> bool {
        let callback = self.state.lock().pending_permissions.pop_front();
        match callback {
            Some(callback) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }

    pub fn permission_requests(&self) -> Vec<Vec<Capability>> {
        self.state.lock().permission_requests.clone()
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.state.lock().sessions.clone()
    }

    pub fn latest_session(&self) -> Option<Arc<MockSession>> {
        self.state.lock().sessions.last().cloned()
    }

    pub fn sessions_created(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().live_sessions.load(Ordering::SeqCst)
    }

    /// Highest number of sessions that were open at the same time
    pub fn max_live_sessions(&self) -> usize {
        self.state.lock().max_live_sessions.load(Ordering::SeqCst)
    }
}

impl Default for MockCameraEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraEngine for MockCameraEngine {
    fn request_permissions(
        &self,
        capabilities: &[Capability],
        on_result: Callback<PermissionOutcome>,
    ) -> Handle {
        let auto = {
            let mut state = self.state.lock();
            state.permission_requests.push(capabilities.to_vec());
            match state.auto_permissions.clone() {
                Some(outcome) => Some((outcome, on_result)),
                None => {
                    state.pending_permissions.push_back(on_result);
                    None
                }
            }
        };

        if let Some((outcome, on_result)) = auto {
            on_result(outcome);
        }

        Handle::new("mock:permission_request", || {
            debug!("Mock permission request released");
        })
    }

    fn is_supported(&self) -> bool {
        self.state.lock().supported
    }

    fn create_session(&self, config: SessionConfig) -> Result<Arc<dyn CameraSession>, SessionError> {
        let mut state = self.state.lock();
        if let Some(details) = state.fail_create.clone() {
            return Err(SessionError::Create { details });
        }

        let live = state.live_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_live_sessions.fetch_max(live, Ordering::SeqCst);

        let session = Arc::new(MockSession {
            id: state.sessions.len(),
            api_token: config.api_token,
            executor: config.executor,
            safe_area: config.safe_area,
            auto_catalog: state.auto_catalog.clone(),
            auto_snapshot: state.auto_snapshot.clone(),
            auto_ack_apply: state.auto_ack_apply,
            live_sessions: Arc::clone(&state.live_sessions),
            closed: AtomicBool::new(false),
            inner: Mutex::new(SessionState::default()),
        });
        state.sessions.push(Arc::clone(&session));
        debug!("Mock session {} created", session.id);

        Ok(session)
    }
}

struct Observer {
    released: Arc<AtomicBool>,
    callback: Arc<Mutex<CatalogCallback>>,
}

#[derive(Default)]
struct SessionState {
    previews: Vec<(Facing, InputOptions)>,
    preview_running: bool,
    observers: Vec<Observer>,
    applied: Vec<String>,
    pending_applies: VecDeque<Callback<bool>>,
    snapshot_requests: usize,
    pending_snapshots: VecDeque<ImageCallback>,
}

/// Session handed out by [`MockCameraEngine`]
pub struct MockSession {
    id: usize,
    api_token: String,
    executor: Arc<SerialExecutor>,
    safe_area: watch::Receiver<Option<Rect>>,
    auto_catalog: Option<Vec<LensDescriptor>>,
    auto_snapshot: Option<CapturedImage>,
    auto_ack_apply: bool,
    live_sessions: Arc<AtomicUsize>,
    closed: AtomicBool,
    inner: Mutex<SessionState>,
}

impl MockSession {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// Deliver a catalog to every observer that is still subscribed
    pub fn deliver_catalog(&self, lenses: Vec<LensDescriptor>) {
        self.deliver(Ok(lenses), false);
    }

    /// Deliver a catalog to every observer ever registered, including those
    /// released while the query was in flight
    pub fn deliver_catalog_in_flight(&self, lenses: Vec<LensDescriptor>) {
        self.deliver(Ok(lenses), true);
    }

    pub fn fail_catalog<S: Into<String>>(&self, details: S) {
        self.deliver(
            Err(SessionError::CatalogQuery {
                details: details.into(),
            }),
            false,
        );
    }

    /// Acknowledge every pending apply with `success`
    pub fn complete_applies(&self, success: bool) -> usize {
        let pending: Vec<_> = self.inner.lock().pending_applies.drain(..).collect();
        let count = pending.len();
        for ack in pending {
            ack(success);
        }
        count
    }

    /// Answer the oldest pending snapshot request
    pub fn complete_snapshot(&self, result: Result<CapturedImage, SessionError>) -> bool {
        let callback = self.inner.lock().pending_snapshots.pop_front();
        match callback {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    pub fn applied_lenses(&self) -> Vec<String> {
        self.inner.lock().applied.clone()
    }

    pub fn snapshot_requests(&self) -> usize {
        self.inner.lock().snapshot_requests
    }

    pub fn previews(&self) -> Vec<(Facing, InputOptions)> {
        self.inner.lock().previews.clone()
    }

    pub fn is_preview_running(&self) -> bool {
        self.inner.lock().preview_running
    }

    pub fn active_observers(&self) -> usize {
        self.inner
            .lock()
            .observers
            .iter()
            .filter(|observer| !observer.released.load(Ordering::SeqCst))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_executor_shut_down(&self) -> bool {
        self.executor.is_shut_down()
    }

    pub fn safe_area(&self) -> Option<Rect> {
        *self.safe_area.borrow()
    }

    fn deliver(&self, result: Result<Vec<LensDescriptor>, SessionError>, include_released: bool) {
        let callbacks: Vec<_> = self
            .inner
            .lock()
            .observers
            .iter()
            .filter(|observer| include_released || !observer.released.load(Ordering::SeqCst))
            .map(|observer| Arc::clone(&observer.callback))
            .collect();

        for callback in callbacks {
            (callback.lock())(result.clone());
        }
    }
}

impl CameraSession for MockSession {
    fn start_preview(&self, facing: Facing, options: InputOptions, on_ack: Callback<bool>) {
        {
            let mut inner = self.inner.lock();
            inner.previews.push((facing, options));
            inner.preview_running = true;
        }
        on_ack(true);
    }

    fn stop_preview(&self) {
        self.inner.lock().preview_running = false;
    }

    fn take_snapshot(&self, on_image: ImageCallback) {
        let mut inner = self.inner.lock();
        inner.snapshot_requests += 1;

        match self.auto_snapshot.clone() {
            Some(image) => {
                drop(inner);
                self.executor.execute(move || on_image(Ok(image)));
            }
            None => inner.pending_snapshots.push_back(on_image),
        }
    }

    fn observe_lenses(&self, group_ids: &BTreeSet<String>, on_result: CatalogCallback) -> Handle {
        debug!("Mock session {} observing groups {:?}", self.id, group_ids);
        let released = Arc::new(AtomicBool::new(false));
        let callback = Arc::new(Mutex::new(on_result));
        self.inner.lock().observers.push(Observer {
            released: Arc::clone(&released),
            callback: Arc::clone(&callback),
        });

        if let Some(lenses) = self.auto_catalog.clone() {
            (callback.lock())(Ok(lenses));
        }

        Handle::new("mock:lens_observer", move || {
            released.store(true, Ordering::SeqCst);
        })
    }

    fn apply_lens(&self, lens: &LensDescriptor, on_ack: Callback<bool>) {
        let mut inner = self.inner.lock();
        inner.applied.push(lens.id.clone());

        if self.auto_ack_apply {
            drop(inner);
            on_ack(true);
        } else {
            inner.pending_applies.push_back(on_ack);
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.live_sessions.fetch_sub(1, Ordering::SeqCst);
            debug!("Mock session {} closed", self.id);
        }
    }
}
