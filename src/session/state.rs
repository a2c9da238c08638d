use serde::{Deserialize, Serialize};

/// Lifecycle of one controller instance.
///
/// `PermissionDenied`, `Unsupported` and `Closed` are terminal: a new
/// attach cycle always starts from a fresh controller in `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Created,
    AwaitingPermission,
    PermissionDenied,
    Ready,
    Unsupported,
    SessionActive,
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::PermissionDenied | SessionState::Unsupported | SessionState::Closed
        )
    }

    /// Terminal states only move on to `Closed`; `Closed` never moves
    pub fn can_transition_to(&self, to: SessionState) -> bool {
        match self {
            SessionState::Closed => false,
            state if state.is_terminal() => to == SessionState::Closed,
            _ => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::AwaitingPermission => "awaiting_permission",
            SessionState::PermissionDenied => "permission_denied",
            SessionState::Ready => "ready",
            SessionState::Unsupported => "unsupported",
            SessionState::SessionActive => "session_active",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
