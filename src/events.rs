use crate::error::EventBusError;
use crate::lenses::LensDescriptor;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events emitted by a widget instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WidgetEvent {
    /// A captured image was persisted and is ready for hand-off
    ImageCaptured { image_uri: String },
    /// A lens was applied to the session
    LensChanged { lens_id: String },
    /// The lens catalog shown in the selection list changed
    LensCatalogUpdated { lenses: Vec<LensDescriptor> },
    /// The built-in preview should be shown for a captured image
    PreviewRequested { image_uri: String },
    /// The session controller moved to a new state
    StateChanged {
        widget_id: String,
        from: SessionState,
        to: SessionState,
    },
    /// An error reported through the error channel
    Error { kind: String, message: String },
}

/// Named event with the fixed payload shape delivered to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostEvent {
    pub name: &'static str,
    pub payload: serde_json::Value,
}

impl WidgetEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            WidgetEvent::ImageCaptured { image_uri } => format!("Image captured: {}", image_uri),
            WidgetEvent::LensChanged { lens_id } => format!("Lens changed to {}", lens_id),
            WidgetEvent::LensCatalogUpdated { lenses } => {
                format!("Lens catalog updated ({} lenses)", lenses.len())
            }
            WidgetEvent::PreviewRequested { image_uri } => {
                format!("Preview requested for {}", image_uri)
            }
            WidgetEvent::StateChanged {
                widget_id,
                from,
                to,
            } => format!("Widget {} state {:?} -> {:?}", widget_id, from, to),
            WidgetEvent::Error { kind, message } => format!("{}: {}", kind, message),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            WidgetEvent::ImageCaptured { .. } => "image_captured",
            WidgetEvent::LensChanged { .. } => "lens_changed",
            WidgetEvent::LensCatalogUpdated { .. } => "lens_catalog_updated",
            WidgetEvent::PreviewRequested { .. } => "preview_requested",
            WidgetEvent::StateChanged { .. } => "state_changed",
            WidgetEvent::Error { .. } => "error",
        }
    }

    /// Map to the host-facing event, if this event crosses the host boundary
    pub fn host_event(&self) -> Option<HostEvent> {
        let (name, payload) = match self {
            WidgetEvent::ImageCaptured { image_uri } => {
                ("onImageCaptured", json!({ "imageUri": image_uri }))
            }
            WidgetEvent::LensChanged { lens_id } => ("onLensChange", json!({ "lensId": lens_id })),
            WidgetEvent::LensCatalogUpdated { lenses } => {
                let ids: Vec<&str> = lenses.iter().map(|lens| lens.id.as_str()).collect();
                ("onLensCatalog", json!({ "lensIds": ids }))
            }
            WidgetEvent::PreviewRequested { image_uri } => {
                ("onPreviewRequested", json!({ "imageUri": image_uri }))
            }
            WidgetEvent::Error { kind, message } => {
                ("onError", json!({ "kind": kind, "message": message }))
            }
            WidgetEvent::StateChanged { .. } => return None,
        };

        Some(HostEvent { name, payload })
    }
}

/// Event bus for widget events using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<WidgetEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: WidgetEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            WidgetEvent::Error { kind, message } => {
                error!("Widget error {}: {}", kind, message);
            }
            WidgetEvent::LensChanged { lens_id } => {
                info!("Lens applied: {}", lens_id);
            }
            WidgetEvent::ImageCaptured { image_uri } => {
                info!("Image captured: {}", image_uri);
            }
            _ => {}
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept only events that cross the host boundary
    HostVisible,
    /// Custom filter function
    Custom(fn(&WidgetEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &WidgetEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::HostVisible => event.host_event().is_some(),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<WidgetEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(receiver: broadcast::Receiver<WidgetEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<WidgetEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<WidgetEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Drain every event currently queued that passes the filter
    ///
    /// A lagged receiver logs the skipped count and keeps draining from the
    /// oldest event still buffered.
    pub fn drain(&mut self) -> Vec<WidgetEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(Some(event)) => events.push(event),
                Ok(None) => break,
                Err(EventBusError::Lagged { skipped }) => {
                    warn!(
                        "Receiver '{}' lagged, skipped {} events while draining",
                        self.name, skipped
                    );
                }
                Err(e) => {
                    debug!("Receiver '{}' stopped draining: {}", self.name, e);
                    break;
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(WidgetEvent::LensChanged {
                lens_id: "l1".to_string(),
            })
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            WidgetEvent::LensChanged { lens_id } => assert_eq!(lens_id, "l1"),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(4);
        assert!(!event_bus.has_subscribers());
        assert!(event_bus
            .publish(WidgetEvent::ImageCaptured {
                image_uri: "file:///tmp/a.jpg".to_string(),
            })
            .is_err());
    }

    #[test]
    fn test_host_event_payloads() {
        let captured = WidgetEvent::ImageCaptured {
            image_uri: "file:///tmp/a.jpg".to_string(),
        }
        .host_event()
        .unwrap();
        assert_eq!(captured.name, "onImageCaptured");
        assert_eq!(captured.payload, json!({ "imageUri": "file:///tmp/a.jpg" }));

        let lens = WidgetEvent::LensChanged {
            lens_id: "l2".to_string(),
        }
        .host_event()
        .unwrap();
        assert_eq!(lens.name, "onLensChange");
        assert_eq!(lens.payload, json!({ "lensId": "l2" }));

        let state = WidgetEvent::StateChanged {
            widget_id: "w".to_string(),
            from: SessionState::Created,
            to: SessionState::AwaitingPermission,
        };
        assert!(state.host_event().is_none());
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut receiver = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::HostVisible,
            "test".to_string(),
        );

        event_bus
            .publish(WidgetEvent::StateChanged {
                widget_id: "w".to_string(),
                from: SessionState::Created,
                to: SessionState::AwaitingPermission,
            })
            .unwrap();
        event_bus
            .publish(WidgetEvent::LensChanged {
                lens_id: "l1".to_string(),
            })
            .unwrap();

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "lens_changed");
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn test_drain_continues_past_lag() {
        let event_bus = EventBus::new(2);
        let mut receiver =
            EventReceiver::new(event_bus.subscribe(), EventFilter::All, "lagging".to_string());

        for id in ["l1", "l2", "l3", "l4"] {
            event_bus
                .publish(WidgetEvent::LensChanged {
                    lens_id: id.to_string(),
                })
                .unwrap();
        }

        let drained = receiver.drain();
        assert_eq!(
            drained,
            vec![
                WidgetEvent::LensChanged {
                    lens_id: "l3".to_string()
                },
                WidgetEvent::LensChanged {
                    lens_id: "l4".to_string()
                },
            ]
        );
    }
}
