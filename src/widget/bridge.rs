use crate::error::{EventBusError, Result};
use crate::events::{EventBus, EventFilter, EventReceiver, HostEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sink for named host events, one per host binding
#[async_trait]
pub trait HostEmitter: Send + Sync {
    async fn emit(&self, event: HostEvent) -> Result<()>;
}

/// Emitter that keeps every event, for tests and simulation
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|event| event.name).collect()
    }
}

#[async_trait]
impl HostEmitter for RecordingEmitter {
    async fn emit(&self, event: HostEvent) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Forwards host-visible widget events to an emitter until stopped
pub struct HostBridge {
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl HostBridge {
    /// Subscribe to `bus` and start forwarding on the current runtime
    pub fn spawn(bus: &EventBus, emitter: Arc<dyn HostEmitter>) -> Self {
        let mut receiver = EventReceiver::new(
            bus.subscribe(),
            EventFilter::HostVisible,
            "host-bridge".to_string(),
        );
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        let task = tokio::spawn(async move {
            info!("Host bridge started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(event) => {
                            let Some(host_event) = event.host_event() else {
                                continue;
                            };
                            debug!("Emitting host event {}", host_event.name);
                            if let Err(e) = emitter.emit(host_event).await {
                                error!("Host emitter failed: {}", e);
                            }
                        }
                        Err(EventBusError::Lagged { skipped }) => {
                            warn!("Host bridge lagged, {} events skipped", skipped);
                        }
                        Err(e) => {
                            debug!("Host bridge stopping: {}", e);
                            break;
                        }
                    },
                }
            }
            info!("Host bridge stopped");
        });

        Self {
            cancellation_token,
            task,
        }
    }

    /// Stop forwarding and wait for the task to finish
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        if let Err(e) = self.task.await {
            error!("Host bridge task failed: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
