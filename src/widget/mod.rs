//! Host-facing side of a camera widget: prop and view lifecycle, outward
//! listener callbacks and the bridge that emits host events.

mod adapter;
mod bridge;
mod listener;
#[cfg(test)]
mod tests;

pub use adapter::{WidgetAdapter, WidgetAdapterBuilder};
pub use bridge::{HostBridge, HostEmitter, RecordingEmitter};
pub use listener::{BusListener, CameraListener, FnListener};
