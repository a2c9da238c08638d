use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Host "main" execution context.
///
/// Every callback-driven transition of a widget runs here, one job at a time
/// and in posting order, so controller state needs no further locking
/// discipline than its own short critical sections.
#[derive(Clone)]
pub struct MainContext {
    sender: mpsc::UnboundedSender<Job>,
    cancellation_token: CancellationToken,
}

impl MainContext {
    /// Spawn the dispatcher task on the current tokio runtime
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    job = receiver.recv() => match job {
                        Some(job) => job(),
                        None => break,
                    },
                }
            }
            debug!("Main context dispatcher stopped");
        });

        Self {
            sender,
            cancellation_token,
        }
    }

    /// Queue a job; returns false if the context is already shut down
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.cancellation_token.is_cancelled() || self.sender.send(Box::new(job)).is_err() {
            warn!("Main context is shut down, dropping posted job");
            return false;
        }
        true
    }

    /// Wait until every job posted before this call has run
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.post(move || {
            let _ = tx.send(());
        }) {
            let _ = rx.await;
        }
    }

    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_jobs_run_in_posting_order() {
        let main = MainContext::spawn();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = Arc::clone(&seen);
            assert!(main.post(move || seen.lock().push(i)));
        }
        main.flush().await;

        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_post_after_shutdown_is_dropped() {
        let main = MainContext::spawn();
        main.shutdown();
        assert!(main.is_shut_down());
        assert!(!main.post(|| panic!("must not run")));
        // flush must not hang on a dead context
        main.flush().await;
    }
}
