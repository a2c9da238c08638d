use thiserror::Error;

#[derive(Error, Debug)]
pub enum LensCamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Widget error: {0}")]
    Widget(#[from] WidgetError),

    #[error("System error: {message}")]
    System { message: String },
}

impl LensCamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LensCamError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

/// Errors surfaced to the host through the error channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WidgetError {
    #[error("Permissions missing: {}", denied.join(", "))]
    Permission { denied: Vec<String> },

    #[error("Device not supported: {details}")]
    UnsupportedDevice { details: String },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("State mismatch: {details}")]
    StateMismatch { details: String },
}

/// Non-fatal failures of an active session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Failed to create session: {details}")]
    Create { details: String },

    #[error("Lens catalog query failed: {details}")]
    CatalogQuery { details: String },

    #[error("Failed to apply lens {lens_id}: {details}")]
    LensApply { lens_id: String, details: String },

    #[error("Lens {lens_id} is not in the current catalog")]
    UnknownLens { lens_id: String },

    #[error("Capture failed: {details}")]
    Capture { details: String },

    #[error("Preview failed to start: {details}")]
    Preview { details: String },

    #[error("Failed to store captured image: {details}")]
    ImageStore { details: String },
}

impl WidgetError {
    pub fn state_mismatch<S: Into<String>>(details: S) -> Self {
        Self::StateMismatch {
            details: details.into(),
        }
    }

    /// Session errors leave the widget usable; everything else ends the attach cycle
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WidgetError::Session(_))
    }

    /// Taxonomy name carried in host error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            WidgetError::Permission { .. } => "PermissionError",
            WidgetError::UnsupportedDevice { .. } => "UnsupportedDeviceError",
            WidgetError::Session(_) => "SessionError",
            WidgetError::StateMismatch { .. } => "StateMismatchError",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            WidgetError::Permission { .. } => "Permissions missing".to_string(),
            WidgetError::UnsupportedDevice { .. } => "Device not supported".to_string(),
            WidgetError::Session(SessionError::UnknownLens { lens_id }) => {
                format!("Lens {} is not available", lens_id)
            }
            WidgetError::Session(SessionError::Capture { .. })
            | WidgetError::Session(SessionError::ImageStore { .. }) => {
                "Could not capture the image, please try again".to_string()
            }
            WidgetError::Session(e) => e.to_string(),
            WidgetError::StateMismatch { details } => format!("Internal error: {}", details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let denied = WidgetError::Permission {
            denied: vec!["camera".to_string()],
        };
        assert_eq!(denied.kind(), "PermissionError");
        assert!(!denied.is_recoverable());
        assert_eq!(denied.to_string(), "Permissions missing: camera");

        let session: WidgetError = SessionError::Capture {
            details: "boom".to_string(),
        }
        .into();
        assert_eq!(session.kind(), "SessionError");
        assert!(session.is_recoverable());
    }

    #[test]
    fn test_widget_error_converts_into_crate_error() {
        let err: LensCamError = WidgetError::state_mismatch("double release").into();
        assert!(matches!(
            err,
            LensCamError::Widget(WidgetError::StateMismatch { .. })
        ));
    }
}
