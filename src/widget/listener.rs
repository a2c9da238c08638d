use crate::events::{EventBus, WidgetEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Outward callbacks of a camera widget, one implementation per host binding
pub trait CameraListener: Send + Sync {
    fn on_image_captured(&self, image_uri: &str);

    fn on_lens_change(&self, lens_id: &str);

    /// Whether the widget should open its own preview of a captured image
    fn should_show_default_preview(&self) -> bool;
}

/// Listener that forwards to the widget's event bus
#[derive(Clone)]
pub struct BusListener {
    bus: EventBus,
    show_preview: Arc<AtomicBool>,
}

impl BusListener {
    pub fn new(bus: EventBus, show_preview: bool) -> Self {
        Self {
            bus,
            show_preview: Arc::new(AtomicBool::new(show_preview)),
        }
    }

    /// Live update of the preview flag, no rebuild needed
    pub fn set_show_preview(&self, show_preview: bool) {
        self.show_preview.store(show_preview, Ordering::SeqCst);
    }

    fn publish(&self, event: WidgetEvent) {
        if let Err(e) = self.bus.publish(event) {
            debug!("Listener event not delivered: {}", e);
        }
    }
}

impl CameraListener for BusListener {
    fn on_image_captured(&self, image_uri: &str) {
        self.publish(WidgetEvent::ImageCaptured {
            image_uri: image_uri.to_string(),
        });
    }

    fn on_lens_change(&self, lens_id: &str) {
        self.publish(WidgetEvent::LensChanged {
            lens_id: lens_id.to_string(),
        });
    }

    fn should_show_default_preview(&self) -> bool {
        self.show_preview.load(Ordering::SeqCst)
    }
}

type UriFn = Box<dyn Fn(&str) + Send + Sync + 'static>;

/// Closure-backed listener for direct embedding
pub struct FnListener {
    on_image: UriFn,
    on_lens: UriFn,
    show_preview: bool,
}

impl FnListener {
    pub fn new() -> Self {
        Self {
            on_image: Box::new(|_| {}),
            on_lens: Box::new(|_| {}),
            show_preview: false,
        }
    }

    pub fn on_image<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_image = Box::new(f);
        self
    }

    pub fn on_lens<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_lens = Box::new(f);
        self
    }

    pub fn show_preview(mut self, show_preview: bool) -> Self {
        self.show_preview = show_preview;
        self
    }
}

impl Default for FnListener {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraListener for FnListener {
    fn on_image_captured(&self, image_uri: &str) {
        (self.on_image)(image_uri)
    }

    fn on_lens_change(&self, lens_id: &str) {
        (self.on_lens)(lens_id)
    }

    fn should_show_default_preview(&self) -> bool {
        self.show_preview
    }
}
