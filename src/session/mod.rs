//! Camera session lifecycle: permission, session creation, preview, lenses
//! and capture wiring for one attached widget.

mod controller;
mod state;

pub use controller::{ControllerContext, SessionController, REQUIRED_CAPABILITIES};
pub use state::SessionState;
