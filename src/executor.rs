use crate::error::Result;
use crate::scope::Handle;
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single worker thread that runs jobs strictly one after another.
///
/// One executor is owned per session; the image pipeline and captured image
/// persistence run here, off the main context.
pub struct SerialExecutor {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
}

impl SerialExecutor {
    pub fn new<S: Into<String>>(name: S) -> Result<Arc<Self>> {
        let name = name.into();
        let (sender, receiver) = channel::unbounded::<Job>();

        let worker_name = name.clone();
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                // Ends once every sender is dropped and the queue is drained
                for job in receiver.iter() {
                    job();
                }
                debug!("Serial executor '{}' worker exited", worker_name);
            })?;

        info!("Serial executor '{}' started", name);

        Ok(Arc::new(Self {
            name,
            sender: Mutex::new(Some(sender)),
        }))
    }

    /// Queue a job; returns false once the executor is shut down
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => {
                warn!("Serial executor '{}' is shut down, rejecting job", self.name);
                false
            }
        }
    }

    /// Stop accepting jobs; already queued jobs still run
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_some() {
            info!("Serial executor '{}' shut down", self.name);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Release handle that shuts this executor down
    pub fn shutdown_handle(self: &Arc<Self>) -> Handle {
        let executor = Arc::clone(self);
        Handle::new(format!("executor:{}", self.name), move || executor.shutdown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_serially_in_order() {
        let executor = SerialExecutor::new("test-serial").unwrap();
        let (tx, rx) = crossbeam::channel::unbounded();

        for i in 0..10 {
            let tx = tx.clone();
            assert!(executor.execute(move || tx.send(i).unwrap()));
        }

        let received: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(received, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_shutdown_handle_stops_executor() {
        let executor = SerialExecutor::new("test-shutdown").unwrap();
        let handle = executor.shutdown_handle();

        assert!(!executor.is_shut_down());
        handle.release().unwrap();
        assert!(executor.is_shut_down());
        assert!(!executor.execute(|| {}));
    }
}
