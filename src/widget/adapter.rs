use super::listener::BusListener;
use crate::capture::{CacheDirImageStore, GestureKind, ImageStore};
use crate::config::{LensCamConfig, WidgetProps};
use crate::engine::CameraEngine;
use crate::error::{LensCamError, Result, SessionError, WidgetError};
use crate::error_channel::ErrorCallback;
use crate::events::{EventBus, EventFilter, EventReceiver, WidgetEvent};
use crate::main_context::MainContext;
use crate::safe_region::Rect;
use crate::session::{ControllerContext, SessionController, SessionState};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Last known layout, replayed onto a rebuilt controller
#[derive(Debug, Default, Clone, Copy)]
struct LayoutCache {
    surface: Option<Rect>,
    capture_button: Option<Rect>,
    status_bar_offset: i32,
}

/// Binds a session controller to the host view and prop lifecycle
pub struct WidgetAdapter {
    widget_id: String,
    config: LensCamConfig,
    engine: Arc<dyn CameraEngine>,
    image_store: Arc<dyn ImageStore>,
    main: MainContext,
    bus: EventBus,
    listener: Arc<BusListener>,
    props: WidgetProps,
    attached: bool,
    layout: LayoutCache,
    generation: u64,
    controller: Option<SessionController>,
}

impl WidgetAdapter {
    pub fn builder() -> WidgetAdapterBuilder {
        WidgetAdapterBuilder::new()
    }

    /// Apply a new set of host properties.
    ///
    /// Identity changes rebuild the controller, `show_preview` and
    /// `show_front_camera` are applied in place, and an invalid set tears
    /// the controller down until a valid one arrives.
    pub fn update_props(&mut self, props: WidgetProps) {
        let previous = std::mem::replace(&mut self.props, props);
        self.listener.set_show_preview(self.props.show_preview);

        if let Err(e) = self.props.validate() {
            if self.controller.is_some() {
                warn!(
                    "Widget {} props became invalid, tearing down: {}",
                    self.widget_id, e
                );
                self.teardown();
            } else {
                debug!("Widget {} props still incomplete: {}", self.widget_id, e);
            }
            return;
        }

        if self.controller.is_none() {
            self.start_if_attached();
            return;
        }

        if previous.identity() != self.props.identity() {
            info!("Widget {} identity changed, rebuilding session", self.widget_id);
            self.teardown();
            self.start_if_attached();
            return;
        }

        if previous.show_front_camera != self.props.show_front_camera {
            if let Some(controller) = &self.controller {
                controller.set_facing(self.props.facing());
            }
        }
    }

    /// Host view attached
    pub fn attach(&mut self) {
        if self.attached {
            debug!("Widget {} already attached", self.widget_id);
            return;
        }
        self.attached = true;
        info!("Widget {} attached", self.widget_id);
        self.start_if_attached();
    }

    /// Host view detached; the controller is closed for good
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        info!("Widget {} detached", self.widget_id);
        self.teardown();
    }

    /// Controller state, `Created` while no controller is running
    pub fn state(&self) -> SessionState {
        self.controller
            .as_ref()
            .map_or(SessionState::Created, SessionController::state)
    }

    pub fn controller(&self) -> Option<&SessionController> {
        self.controller.as_ref()
    }

    pub fn widget_id(&self) -> &str {
        &self.widget_id
    }

    pub fn props(&self) -> &WidgetProps {
        &self.props
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Filtered receiver on this widget's events
    pub fn subscribe(&self, filter: EventFilter) -> EventReceiver {
        EventReceiver::new(
            self.bus.subscribe(),
            filter,
            format!("widget:{}", self.widget_id),
        )
    }

    pub fn select_lens(&self, lens_id: &str) -> std::result::Result<(), WidgetError> {
        match &self.controller {
            Some(controller) => controller.select_lens(lens_id),
            None => Err(SessionError::LensApply {
                lens_id: lens_id.to_string(),
                details: "no running session".to_string(),
            }
            .into()),
        }
    }

    pub fn on_gesture_start(&self) {
        if let Some(controller) = &self.controller {
            controller.on_gesture_start();
        }
    }

    pub fn on_gesture_end(&self, kind: GestureKind) {
        if let Some(controller) = &self.controller {
            controller.on_gesture_end(kind);
        }
    }

    pub fn on_layout_change(&mut self, old: Rect, new: Rect) {
        if old != new {
            self.layout.surface = Some(new);
        }
        if let Some(controller) = &self.controller {
            controller.on_layout_change(old, new);
        }
    }

    pub fn set_capture_button(&mut self, bounds: Rect) {
        self.layout.capture_button = Some(bounds);
        if let Some(controller) = &self.controller {
            controller.set_capture_button(bounds);
        }
    }

    pub fn set_status_bar_offset(&mut self, offset: i32) {
        self.layout.status_bar_offset = offset;
        if let Some(controller) = &self.controller {
            controller.set_status_bar_offset(offset);
        }
    }

    fn start_if_attached(&mut self) {
        if !self.attached || self.controller.is_some() {
            return;
        }
        if let Err(e) = self.props.validate() {
            info!("Widget {} waiting for valid props: {}", self.widget_id, e);
            return;
        }

        self.generation += 1;
        let controller = SessionController::new(
            format!("{}#{}", self.widget_id, self.generation),
            self.props.clone(),
            self.config.preview.clone(),
            self.controller_context(),
        );

        controller.set_status_bar_offset(self.layout.status_bar_offset);
        if let Some(bounds) = self.layout.capture_button {
            controller.set_capture_button(bounds);
        }
        if let Some(surface) = self.layout.surface {
            controller.set_surface(surface);
        }

        controller.attach();
        self.controller = Some(controller);
    }

    fn teardown(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.close();
        }
    }

    fn controller_context(&self) -> ControllerContext {
        let bus = self.bus.clone();
        let error_sink: ErrorCallback = Arc::new(move |error: &WidgetError| {
            let event = WidgetEvent::Error {
                kind: error.kind().to_string(),
                message: error.to_string(),
            };
            if let Err(e) = bus.publish(event) {
                debug!("Error event not delivered: {}", e);
            }
        });

        ControllerContext {
            engine: Arc::clone(&self.engine),
            listener: self.listener.clone(),
            image_store: Arc::clone(&self.image_store),
            main: self.main.clone(),
            bus: self.bus.clone(),
            error_sink: Some(error_sink),
        }
    }
}

impl Drop for WidgetAdapter {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Builder for [`WidgetAdapter`]
pub struct WidgetAdapterBuilder {
    widget_id: Option<String>,
    config: Option<LensCamConfig>,
    engine: Option<Arc<dyn CameraEngine>>,
    image_store: Option<Arc<dyn ImageStore>>,
    main: Option<MainContext>,
    bus: Option<EventBus>,
}

impl WidgetAdapterBuilder {
    pub fn new() -> Self {
        Self {
            widget_id: None,
            config: None,
            engine: None,
            image_store: None,
            main: None,
            bus: None,
        }
    }

    pub fn widget_id<S: Into<String>>(mut self, widget_id: S) -> Self {
        self.widget_id = Some(widget_id.into());
        self
    }

    pub fn config(mut self, config: LensCamConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn CameraEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn image_store(mut self, image_store: Arc<dyn ImageStore>) -> Self {
        self.image_store = Some(image_store);
        self
    }

    pub fn main_context(mut self, main: MainContext) -> Self {
        self.main = Some(main);
        self
    }

    /// Inject the bus host events flow through; one per widget by default
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Result<WidgetAdapter> {
        let engine = self
            .engine
            .ok_or_else(|| LensCamError::system("Camera engine must be specified"))?;
        let main = self
            .main
            .ok_or_else(|| LensCamError::system("Main context must be specified"))?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let bus = self.bus.unwrap_or_else(|| {
            if config.events.debug_logging {
                EventBus::with_debug_logging(config.events.bus_capacity)
            } else {
                EventBus::new(config.events.bus_capacity)
            }
        });
        let image_store = self
            .image_store
            .unwrap_or_else(|| Arc::new(CacheDirImageStore::from_config(&config.capture)));
        let listener = Arc::new(BusListener::new(bus.clone(), config.props.show_preview));
        let widget_id = self
            .widget_id
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..8].to_string());

        let mut adapter = WidgetAdapter {
            widget_id,
            props: WidgetProps::default(),
            config,
            engine,
            image_store,
            main,
            bus,
            listener,
            attached: false,
            layout: LayoutCache::default(),
            generation: 0,
            controller: None,
        };
        let initial = adapter.config.props.clone();
        adapter.update_props(initial);
        Ok(adapter)
    }
}

impl Default for WidgetAdapterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
