use super::SessionState;
use crate::capture::{CaptureGate, CaptureStats, GestureKind, ImageStore};
use crate::config::{LensMode, PreviewConfig, WidgetProps};
use crate::engine::{
    CameraEngine, CameraSession, Capability, CatalogCallback, Facing, PermissionOutcome,
    SessionConfig,
};
use crate::error::{SessionError, WidgetError};
use crate::error_channel::{ErrorCallback, ErrorChannel};
use crate::events::{EventBus, WidgetEvent};
use crate::executor::SerialExecutor;
use crate::lenses::{LensAction, LensDescriptor, LensSelectionState};
use crate::main_context::MainContext;
use crate::safe_region::{Rect, SafeRegionTracker};
use crate::scope::{Handle, ResourceScope};
use crate::widget::CameraListener;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Capabilities that must all be granted before a session is created
pub const REQUIRED_CAPABILITIES: &[Capability] = &[Capability::Camera];

/// Collaborators injected into every controller of one widget
#[derive(Clone)]
pub struct ControllerContext {
    pub engine: Arc<dyn CameraEngine>,
    pub listener: Arc<dyn CameraListener>,
    pub image_store: Arc<dyn ImageStore>,
    pub main: MainContext,
    pub bus: EventBus,
    /// Installed on the error channel for the duration of the attachment
    pub error_sink: Option<ErrorCallback>,
}

/// Drives one camera session from permission request to teardown.
///
/// Every engine callback is bounced onto the main context and resolved
/// through a weak reference plus the attached flag, so callbacks that race
/// a detach find nothing to act on.
pub struct SessionController {
    inner: Arc<Inner>,
}

struct Inner {
    widget_id: String,
    props: WidgetProps,
    preview: PreviewConfig,
    ctx: ControllerContext,
    errors: ErrorChannel,
    scope: ResourceScope,
    safe_region: SafeRegionTracker,
    attached: AtomicBool,
    state: Mutex<State>,
}

struct State {
    lifecycle: SessionState,
    facing: Facing,
    session: Option<Arc<dyn CameraSession>>,
    executor: Option<Arc<SerialExecutor>>,
    lenses: LensSelectionState,
    capture: CaptureGate,
}

impl SessionController {
    pub fn new<S: Into<String>>(
        widget_id: S,
        props: WidgetProps,
        preview: PreviewConfig,
        ctx: ControllerContext,
    ) -> Self {
        let widget_id = widget_id.into();
        let state = State {
            lifecycle: SessionState::Created,
            facing: props.facing(),
            session: None,
            executor: None,
            lenses: LensSelectionState::new([props.group_id.clone()]),
            capture: CaptureGate::new(),
        };

        Self {
            inner: Arc::new(Inner {
                errors: ErrorChannel::new(ctx.main.clone()),
                scope: ResourceScope::new(format!("widget:{}", widget_id)),
                safe_region: SafeRegionTracker::new(),
                attached: AtomicBool::new(false),
                state: Mutex::new(state),
                widget_id,
                props,
                preview,
                ctx,
            }),
        }
    }

    /// Start the attach cycle: `Created -> AwaitingPermission`
    pub fn attach(&self) {
        let inner = &self.inner;
        let current = inner.lifecycle();
        if current != SessionState::Created {
            warn!(
                "Widget {} attach ignored in state {}, a new controller is required",
                inner.widget_id, current
            );
            return;
        }
        if let Err(e) = inner.props.validate() {
            warn!("Widget {} stays created: {}", inner.widget_id, e);
            return;
        }

        inner.scope.attach();
        inner.attached.store(true, Ordering::SeqCst);

        if let Some(sink) = inner.ctx.error_sink.clone() {
            inner.scope.register(inner.errors.subscribe(move |e| sink(e)));
        }

        if inner.transition(SessionState::AwaitingPermission) {
            inner.request_permissions();
        }
    }

    /// Tear everything down. Irreversible and idempotent.
    pub fn close(&self) {
        let inner = &self.inner;
        inner.attached.store(false, Ordering::SeqCst);
        if inner.lifecycle() == SessionState::Closed {
            debug!("Widget {} already closed", inner.widget_id);
            return;
        }

        let session = {
            let mut state = inner.state.lock();
            state.capture.reset();
            state.executor = None;
            state.session.take()
        };
        if let Some(session) = session {
            session.stop_preview();
        }

        let failures = inner.scope.detach();
        for failure in &failures {
            error!(
                "Widget {} teardown hit a release failure: {}",
                inner.widget_id, failure
            );
        }
        debug_assert!(
            failures.is_empty(),
            "widget teardown released a stale handle: {:?}",
            failures
        );

        inner.transition(SessionState::Closed);
    }

    /// User pick from the selection list; always issues an apply.
    ///
    /// Needs a running session. Without one the pick fails with a
    /// recoverable `SessionError::LensApply` and can simply be repeated.
    pub fn select_lens(&self, lens_id: &str) -> Result<(), WidgetError> {
        let inner = &self.inner;
        if !inner.is_active() {
            return Err(SessionError::LensApply {
                lens_id: lens_id.to_string(),
                details: format!("widget {} is {}", inner.widget_id, inner.lifecycle()),
            }
            .into());
        }

        let selected = inner.state.lock().lenses.select(lens_id);
        match selected {
            Ok(lens) => {
                info!("Widget {} user selected lens {}", inner.widget_id, lens.id);
                inner.apply_lens(&lens);
                Ok(())
            }
            Err(e) => {
                let error = WidgetError::from(e);
                inner.report(error.clone());
                Err(error)
            }
        }
    }

    pub fn on_gesture_start(&self) {
        if !self.inner.is_active() {
            debug!("Capture start ignored, no active session");
            return;
        }
        self.inner.state.lock().capture.on_gesture_start();
    }

    pub fn on_gesture_end(&self, kind: GestureKind) {
        if !self.inner.is_active() {
            debug!("Capture end ignored, no active session");
            return;
        }
        let take = self.inner.state.lock().capture.on_gesture_end(kind);
        if take {
            self.inner.take_snapshot();
        }
    }

    pub fn on_layout_change(&self, old: Rect, new: Rect) {
        self.inner.safe_region.on_layout_change(old, new);
    }

    pub fn set_surface(&self, surface: Rect) {
        self.inner.safe_region.set_surface(surface);
    }

    pub fn set_capture_button(&self, bounds: Rect) {
        self.inner.safe_region.set_capture_button(bounds);
    }

    pub fn set_status_bar_offset(&self, offset: i32) {
        self.inner.safe_region.set_status_bar_offset(offset);
    }

    /// Switch camera; restarts the preview in place while active
    pub fn set_facing(&self, facing: Facing) {
        let inner = &self.inner;
        let session = {
            let mut state = inner.state.lock();
            if state.facing == facing {
                return;
            }
            state.facing = facing;
            match state.lifecycle {
                SessionState::SessionActive => state.session.clone(),
                _ => None,
            }
        };

        if let Some(session) = session {
            info!("Widget {} switching preview to {:?}", inner.widget_id, facing);
            session.stop_preview();
            inner.start_preview(&session, facing);
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lifecycle()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    pub fn widget_id(&self) -> &str {
        &self.inner.widget_id
    }

    pub fn props(&self) -> &WidgetProps {
        &self.inner.props
    }

    pub fn errors(&self) -> &ErrorChannel {
        &self.inner.errors
    }

    pub fn facing(&self) -> Facing {
        self.inner.state.lock().facing
    }

    pub fn catalog(&self) -> Vec<LensDescriptor> {
        self.inner.state.lock().lenses.catalog().to_vec()
    }

    pub fn applied_lens(&self) -> Option<String> {
        self.inner.state.lock().lenses.applied_id().map(str::to_string)
    }

    pub fn capture_stats(&self) -> CaptureStats {
        self.inner.state.lock().capture.stats()
    }

    pub fn safe_region(&self) -> Option<Rect> {
        self.inner.safe_region.current()
    }
}

impl Inner {
    /// Run `f` on the main context, but only while the widget is attached
    fn post_live<F>(weak: Weak<Inner>, main: &MainContext, what: &'static str, f: F)
    where
        F: FnOnce(&Arc<Inner>) + Send + 'static,
    {
        main.post(move || match weak.upgrade() {
            Some(inner) if inner.is_attached() => f(&inner),
            _ => debug!("Dropping {} callback for a detached widget", what),
        });
    }

    fn lifecycle(&self) -> SessionState {
        self.state.lock().lifecycle
    }

    fn is_active(&self) -> bool {
        self.is_attached() && self.lifecycle() == SessionState::SessionActive
    }

    fn session(&self) -> Option<Arc<dyn CameraSession>> {
        self.state.lock().session.clone()
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Move to `to`; returns false when the current state does not allow it
    fn transition(&self, to: SessionState) -> bool {
        let from = {
            let mut state = self.state.lock();
            let from = state.lifecycle;
            if from == to {
                return true;
            }
            if !from.can_transition_to(to) {
                warn!(
                    "Widget {} refused transition {} -> {}",
                    self.widget_id, from, to
                );
                return false;
            }
            state.lifecycle = to;
            from
        };
        info!("Widget {} state {} -> {}", self.widget_id, from, to);
        self.publish(WidgetEvent::StateChanged {
            widget_id: self.widget_id.clone(),
            from,
            to,
        });
        true
    }

    fn publish(&self, event: WidgetEvent) {
        if let Err(e) = self.ctx.bus.publish(event) {
            debug!("Widget {} event not delivered: {}", self.widget_id, e);
        }
    }

    fn report(&self, error: WidgetError) {
        warn!(
            "Widget {} reporting {}: {}",
            self.widget_id,
            error.kind(),
            error
        );
        self.errors.report(error);
    }

    fn request_permissions(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let main = self.ctx.main.clone();
        let handle = self.ctx.engine.request_permissions(
            REQUIRED_CAPABILITIES,
            Box::new(move |outcome| {
                Inner::post_live(weak, &main, "permission", move |inner| {
                    inner.on_permission_result(outcome)
                });
            }),
        );
        self.scope.register(handle);
    }

    fn on_permission_result(self: &Arc<Self>, outcome: PermissionOutcome) {
        let current = self.lifecycle();
        if current != SessionState::AwaitingPermission {
            warn!(
                "Widget {} permission result ignored in state {}",
                self.widget_id, current
            );
            return;
        }

        let denied = outcome.denied(REQUIRED_CAPABILITIES);
        if !denied.is_empty() {
            if self.transition(SessionState::PermissionDenied) {
                self.report(WidgetError::Permission {
                    denied: denied.iter().map(|c| c.as_str().to_string()).collect(),
                });
            }
            return;
        }

        if self.transition(SessionState::Ready) {
            self.start_session();
        }
    }

    fn start_session(self: &Arc<Self>) {
        // Engine calls may race a detach; recheck after each one
        let supported = self.ctx.engine.is_supported();
        if !self.is_attached() {
            debug!("Widget {} detached during support check", self.widget_id);
            return;
        }
        if !supported {
            if self.transition(SessionState::Unsupported) {
                self.report(WidgetError::UnsupportedDevice {
                    details: "camera engine does not support this device".to_string(),
                });
            }
            return;
        }

        let executor = match SerialExecutor::new(format!("lenscam-{}", self.widget_id)) {
            Ok(executor) => executor,
            Err(e) => {
                self.report(
                    SessionError::Create {
                        details: e.to_string(),
                    }
                    .into(),
                );
                return;
            }
        };
        self.scope.register(executor.shutdown_handle());
        if !self.is_attached() {
            debug!("Widget {} detached while the executor started", self.widget_id);
            return;
        }

        let config = SessionConfig {
            api_token: self.props.api_token.clone(),
            executor: Arc::clone(&executor),
            safe_area: self.safe_region.subscribe(),
        };
        let session = match self.ctx.engine.create_session(config) {
            Ok(session) => session,
            Err(e) => {
                self.report(e.into());
                return;
            }
        };

        // A detached scope closes the session right away
        let closing = Arc::clone(&session);
        self.scope.register(Handle::new(
            format!("session:{}", self.widget_id),
            move || closing.close(),
        ));

        let facing = {
            let mut state = self.state.lock();
            if !self.is_attached() || state.lifecycle != SessionState::Ready {
                None
            } else {
                state.session = Some(Arc::clone(&session));
                state.executor = Some(executor);
                Some(state.facing)
            }
        };
        let Some(facing) = facing else {
            debug!("Widget {} detached while the session was created", self.widget_id);
            return;
        };
        if !self.transition(SessionState::SessionActive) {
            return;
        }

        self.bind_lenses(&session);
        self.start_preview(&session, facing);
    }

    fn bind_lenses(self: &Arc<Self>, session: &Arc<dyn CameraSession>) {
        let weak = Arc::downgrade(self);
        let main = self.ctx.main.clone();
        let on_result: CatalogCallback = Box::new(move |result| {
            Inner::post_live(weak.clone(), &main, "lens catalog", move |inner| {
                inner.on_catalog_result(result)
            });
        });

        let (handle, pending) = {
            let mut state = self.state.lock();
            let pending = match self.props.mode() {
                LensMode::Single => state.lenses.request_apply(self.props.lens_id.clone()),
                LensMode::Group => None,
            };
            (state.lenses.observe(session.as_ref(), on_result), pending)
        };
        self.scope.register(handle);

        if let Some(action) = pending {
            self.run_lens_actions(vec![action]);
        }
    }

    fn on_catalog_result(self: &Arc<Self>, result: Result<Vec<LensDescriptor>, SessionError>) {
        if self.lifecycle() != SessionState::SessionActive {
            debug!("Widget {} catalog delivery after session end", self.widget_id);
            return;
        }

        match result {
            Ok(lenses) => {
                let actions = self.state.lock().lenses.on_catalog(lenses);
                self.run_lens_actions(actions);
            }
            Err(e) => self.report(e.into()),
        }
    }

    fn run_lens_actions(self: &Arc<Self>, actions: Vec<LensAction>) {
        for action in actions {
            match action {
                LensAction::ShowCatalog(lenses) => {
                    self.publish(WidgetEvent::LensCatalogUpdated { lenses })
                }
                LensAction::Apply(lens) => self.apply_lens(&lens),
            }
        }
    }

    fn apply_lens(self: &Arc<Self>, lens: &LensDescriptor) {
        let Some(session) = self.session() else {
            debug!("Widget {} has no session to apply {} on", self.widget_id, lens.id);
            return;
        };

        let weak = Arc::downgrade(self);
        let main = self.ctx.main.clone();
        let lens_id = lens.id.clone();
        debug!("Widget {} applying lens {}", self.widget_id, lens_id);
        session.apply_lens(
            lens,
            Box::new(move |applied| {
                Inner::post_live(weak, &main, "lens apply", move |inner| {
                    inner.on_lens_applied(lens_id, applied)
                });
            }),
        );
    }

    fn on_lens_applied(&self, lens_id: String, applied: bool) {
        if !applied {
            self.report(
                SessionError::LensApply {
                    lens_id,
                    details: "engine rejected the lens".to_string(),
                }
                .into(),
            );
            return;
        }

        self.state.lock().lenses.mark_applied(lens_id.clone());
        self.ctx.listener.on_lens_change(&lens_id);
    }

    fn start_preview(self: &Arc<Self>, session: &Arc<dyn CameraSession>, facing: Facing) {
        let options = self.preview.input_options(facing);
        info!(
            "Widget {} starting {:?} preview (mirrored: {}, aspect {})",
            self.widget_id, facing, options.mirror_horizontally, options.aspect_ratio
        );

        let weak = Arc::downgrade(self);
        let main = self.ctx.main.clone();
        session.start_preview(
            facing,
            options,
            Box::new(move |started| {
                if started {
                    return;
                }
                Inner::post_live(weak, &main, "preview", move |inner| {
                    inner.report(
                        SessionError::Preview {
                            details: format!("engine failed to start the {:?} preview", facing),
                        }
                        .into(),
                    )
                });
            }),
        );
    }

    fn take_snapshot(self: &Arc<Self>) {
        let (session, executor) = {
            let state = self.state.lock();
            (state.session.clone(), state.executor.clone())
        };
        let (Some(session), Some(executor)) = (session, executor) else {
            return;
        };

        let weak = Arc::downgrade(self);
        let main = self.ctx.main.clone();
        let store = Arc::clone(&self.ctx.image_store);
        session.take_snapshot(Box::new(move |result| match result {
            Ok(image) => {
                let accepted = executor.execute(move || {
                    let live = weak.upgrade().is_some_and(|inner| inner.is_attached());
                    if !live {
                        debug!("Discarding snapshot taken before detach");
                        return;
                    }
                    let stored = store.store(&image);
                    Inner::post_live(weak, &main, "image stored", move |inner| {
                        inner.on_image_stored(stored)
                    });
                });
                if !accepted {
                    warn!("Snapshot arrived after the image executor shut down");
                }
            }
            Err(e) => Inner::post_live(weak, &main, "snapshot", move |inner| {
                inner.report(e.into())
            }),
        }));
    }

    fn on_image_stored(&self, stored: Result<String, SessionError>) {
        match stored {
            Ok(image_uri) => {
                self.ctx.listener.on_image_captured(&image_uri);
                if self.ctx.listener.should_show_default_preview() {
                    self.publish(WidgetEvent::PreviewRequested { image_uri });
                }
            }
            Err(e) => self.report(e.into()),
        }
    }
}
