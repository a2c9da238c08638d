use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Rectangle in view coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

#[derive(Debug, Default)]
struct Layout {
    surface: Option<Rect>,
    capture_button: Option<Rect>,
    status_bar_offset: i32,
}

/// Tracks the part of the preview not covered by the capture control.
///
/// Values are pushed through a watch channel: consumers only ever see the
/// most recent region, intermediate ones may be skipped.
pub struct SafeRegionTracker {
    layout: Mutex<Layout>,
    sender: watch::Sender<Option<Rect>>,
}

impl SafeRegionTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            layout: Mutex::new(Layout::default()),
            sender,
        }
    }

    /// Safe region for the given layout, if the surface is visible
    pub fn compute(surface: Rect, capture_button: Option<Rect>, status_bar_offset: i32) -> Option<Rect> {
        if surface.is_empty() {
            return None;
        }

        let mut safe = surface;
        if let Some(button) = capture_button.filter(|button| !button.is_empty()) {
            safe.bottom = button.top - status_bar_offset;
        }
        Some(safe)
    }

    /// Subscribe the render-safe-area consumer.
    ///
    /// Recomputes once right away so a consumer arriving after layout has
    /// settled still gets a value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Rect>> {
        self.recompute();
        self.sender.subscribe()
    }

    /// Layout change notification for the capture surface
    pub fn on_layout_change(&self, old: Rect, new: Rect) {
        if old == new {
            trace!("Layout pass without movement, skipping safe region update");
            return;
        }
        self.layout.lock().surface = Some(new);
        self.recompute();
    }

    pub fn set_surface(&self, surface: Rect) {
        self.layout.lock().surface = Some(surface);
        self.recompute();
    }

    pub fn set_capture_button(&self, bounds: Rect) {
        self.layout.lock().capture_button = Some(bounds);
        self.recompute();
    }

    pub fn set_status_bar_offset(&self, offset: i32) {
        self.layout.lock().status_bar_offset = offset;
        self.recompute();
    }

    /// Latest computed region
    pub fn current(&self) -> Option<Rect> {
        *self.sender.borrow()
    }

    fn recompute(&self) {
        let region = {
            let layout = self.layout.lock();
            layout.surface.and_then(|surface| {
                Self::compute(surface, layout.capture_button, layout.status_bar_offset)
            })
        };

        let Some(region) = region else {
            return;
        };

        let changed = self.sender.send_if_modified(|current| {
            if *current == Some(region) {
                false
            } else {
                *current = Some(region);
                true
            }
        });
        if changed {
            debug!("Safe region updated: {:?}", region);
        }
    }
}

impl Default for SafeRegionTracker {
    fn default() -> Self {
        Self::new()
    }
}
