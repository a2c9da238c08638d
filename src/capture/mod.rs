//! Capture gesture gating and captured image persistence

mod gate;
mod store;

pub use gate::{CaptureGate, CaptureState, CaptureStats, GestureKind};
pub use store::{CacheDirImageStore, ImageStore, MemoryImageStore};
