use crate::error::WidgetError;
use crate::main_context::MainContext;
use crate::scope::Handle;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub type ErrorCallback = Arc<dyn Fn(&WidgetError) + Send + Sync + 'static>;

/// Single-slot error sink.
///
/// `report` never fails and never blocks: delivery happens later on the main
/// context, and an error arriving while nobody listens is logged and dropped.
#[derive(Clone)]
pub struct ErrorChannel {
    slot: Arc<Mutex<Option<(u64, ErrorCallback)>>>,
    next_token: Arc<AtomicU64>,
    main: MainContext,
}

impl ErrorChannel {
    pub fn new(main: MainContext) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_token: Arc::new(AtomicU64::new(1)),
            main,
        }
    }

    /// Install `callback`, replacing any previous subscriber.
    ///
    /// The returned handle clears the slot only if it still holds this
    /// subscriber; releasing a handle whose subscriber was replaced yields
    /// `StateMismatch`.
    pub fn subscribe<F>(&self, callback: F) -> Handle
    where
        F: Fn(&WidgetError) + Send + Sync + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let previous = self.slot.lock().replace((token, Arc::new(callback)));
        if previous.is_some() {
            debug!("Error subscriber replaced by subscriber {}", token);
        }

        let slot = Arc::clone(&self.slot);
        Handle::fallible(format!("error_channel:{}", token), move || {
            let mut slot = slot.lock();
            match slot.as_ref() {
                Some((current, _)) if *current == token => {
                    *slot = None;
                    Ok(())
                }
                _ => Err(WidgetError::state_mismatch(format!(
                    "expected error subscriber {} to be removed by its own handle",
                    token
                ))),
            }
        })
    }

    /// Deliver `error` to the current subscriber on the main context
    pub fn report(&self, error: WidgetError) {
        let slot = Arc::clone(&self.slot);
        let posted = self.main.post(move || {
            let callback = slot.lock().as_ref().map(|(_, callback)| Arc::clone(callback));
            match callback {
                Some(callback) => callback(&error),
                None => warn!(
                    "Ignoring an unhandled error due to a missing error handler: {}",
                    error
                ),
            }
        });

        if !posted {
            warn!("Error reported after main context shutdown was dropped");
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    fn capture_error() -> WidgetError {
        SessionError::Capture {
            details: "camera busy".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_report_is_delivered_on_main_context() {
        let main = MainContext::spawn();
        let channel = ErrorChannel::new(main.clone());
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&received);
        let handle = channel.subscribe(move |e| sink.lock().push(e.clone()));

        channel.report(capture_error());
        // Delivery is asynchronous
        assert!(received.lock().is_empty());

        main.flush().await;
        assert_eq!(*received.lock(), vec![capture_error()]);

        handle.release().unwrap();
        assert!(!channel.has_subscriber());
    }

    #[tokio::test]
    async fn test_report_without_subscriber_is_dropped() {
        let main = MainContext::spawn();
        let channel = ErrorChannel::new(main.clone());

        channel.report(capture_error());
        main.flush().await;
        assert!(!channel.has_subscriber());
    }

    #[tokio::test]
    async fn test_stale_handle_release_is_state_mismatch() {
        let main = MainContext::spawn();
        let channel = ErrorChannel::new(main.clone());

        let first = channel.subscribe(|_| {});
        let second = channel.subscribe(|_| {});

        let err = first.release().unwrap_err();
        assert_eq!(err.kind(), "StateMismatchError");
        // The newer subscriber is untouched by the stale release
        assert!(channel.has_subscriber());

        second.release().unwrap();
        assert!(!channel.has_subscriber());
    }
}
