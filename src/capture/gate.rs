use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Kind of gesture reported by the capture control when it ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureKind {
    /// Tap: request one still image
    Snapshot,
    /// Press and hold: continuous recording, not captured as a still
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
}

/// Gesture counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub gestures_started: u64,
    pub duplicate_starts: u64,
    pub stray_ends: u64,
    pub snapshots_requested: u64,
}

/// Turns capture-control start/end signals into one-shot snapshot requests.
///
/// A snapshot is only requested for an end that closes an observed start;
/// a stray end while idle never captures.
#[derive(Debug, Default)]
pub struct CaptureGate {
    state: CaptureState,
    stats: CaptureStats,
}

impl CaptureGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the gate moved to `Capturing`
    pub fn on_gesture_start(&mut self) -> bool {
        match self.state {
            CaptureState::Idle => {
                self.state = CaptureState::Capturing;
                self.stats.gestures_started += 1;
                debug!("Capture gesture started");
                true
            }
            CaptureState::Capturing => {
                self.stats.duplicate_starts += 1;
                debug!("Duplicate capture start ignored");
                false
            }
        }
    }

    /// Returns true if exactly one snapshot must be requested
    pub fn on_gesture_end(&mut self, kind: GestureKind) -> bool {
        let paired = self.state == CaptureState::Capturing;
        self.state = CaptureState::Idle;

        if !paired {
            self.stats.stray_ends += 1;
            warn!("Capture end ({:?}) without a matching start ignored", kind);
            return false;
        }

        if kind == GestureKind::Snapshot {
            self.stats.snapshots_requested += 1;
            debug!("Capture gesture ended, requesting snapshot");
            true
        } else {
            debug!("Capture gesture ended ({:?})", kind);
            false
        }
    }

    /// Drop an in-progress gesture, e.g. when the session goes away
    pub fn reset(&mut self) {
        self.state = CaptureState::Idle;
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == CaptureState::Capturing
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_gesture_requests_exactly_one_capture() {
        let mut gate = CaptureGate::new();

        assert!(gate.on_gesture_start());
        assert!(gate.is_capturing());
        assert!(gate.on_gesture_end(GestureKind::Snapshot));
        assert_eq!(gate.state(), CaptureState::Idle);
        assert_eq!(gate.stats().snapshots_requested, 1);
    }

    #[test]
    fn test_duplicate_start_is_swallowed() {
        let mut gate = CaptureGate::new();

        assert!(gate.on_gesture_start());
        assert!(!gate.on_gesture_start());
        assert_eq!(gate.state(), CaptureState::Capturing);

        assert!(gate.on_gesture_end(GestureKind::Snapshot));
        // Second end has no start left to close
        assert!(!gate.on_gesture_end(GestureKind::Snapshot));

        let stats = gate.stats();
        assert_eq!(stats.gestures_started, 1);
        assert_eq!(stats.duplicate_starts, 1);
        assert_eq!(stats.stray_ends, 1);
        assert_eq!(stats.snapshots_requested, 1);
    }

    #[test]
    fn test_stray_end_never_captures() {
        let mut gate = CaptureGate::new();

        assert!(!gate.on_gesture_end(GestureKind::Snapshot));
        assert_eq!(gate.state(), CaptureState::Idle);
        assert_eq!(gate.stats().snapshots_requested, 0);
    }

    #[test]
    fn test_continuous_end_returns_to_idle_without_capture() {
        let mut gate = CaptureGate::new();

        gate.on_gesture_start();
        assert!(!gate.on_gesture_end(GestureKind::Continuous));
        assert_eq!(gate.state(), CaptureState::Idle);
    }

    #[test]
    fn test_reset_discards_pending_gesture() {
        let mut gate = CaptureGate::new();

        gate.on_gesture_start();
        gate.reset();
        assert!(!gate.on_gesture_end(GestureKind::Snapshot));
    }
}
