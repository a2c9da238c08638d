use crate::error::WidgetError;
use parking_lot::Mutex;
use tracing::{debug, error};

type ReleaseFn = Box<dyn FnOnce() -> Result<(), WidgetError> + Send + 'static>;

/// A releasable resource: subscription, executor, session
#[must_use = "a handle that is never released leaks its resource"]
pub struct Handle {
    label: String,
    release: ReleaseFn,
}

impl Handle {
    pub fn new<S, F>(label: S, release: F) -> Self
    where
        S: Into<String>,
        F: FnOnce() + Send + 'static,
    {
        Self::fallible(label, move || {
            release();
            Ok(())
        })
    }

    /// Handle whose release can detect a broken invariant
    pub fn fallible<S, F>(label: S, release: F) -> Self
    where
        S: Into<String>,
        F: FnOnce() -> Result<(), WidgetError> + Send + 'static,
    {
        Self {
            label: label.into(),
            release: Box::new(release),
        }
    }

    pub fn noop<S: Into<String>>(label: S) -> Self {
        Self::new(label, || {})
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Consumes the handle, so a release can never run twice
    pub fn release(self) -> Result<(), WidgetError> {
        debug!("Releasing '{}'", self.label);
        (self.release)()
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").field("label", &self.label).finish()
    }
}

/// Ordered set of handles whose lifetime matches widget attachment
pub struct ResourceScope {
    name: String,
    inner: Mutex<ScopeInner>,
}

struct ScopeInner {
    attached: bool,
    handles: Vec<Handle>,
}

impl ResourceScope {
    /// Create a detached scope
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(ScopeInner {
                attached: false,
                handles: Vec::new(),
            }),
        }
    }

    /// Store a handle; while detached the handle is released on the spot
    pub fn register(&self, handle: Handle) {
        let mut inner = self.inner.lock();
        if inner.attached {
            inner.handles.push(handle);
            return;
        }
        drop(inner);

        debug!(
            "Scope '{}' is detached, releasing '{}' immediately",
            self.name,
            handle.label()
        );
        if let Err(e) = handle.release() {
            error!("Scope '{}' release failed: {}", self.name, e);
        }
    }

    /// Release every stored handle in registration order, then clear the store
    pub fn release_all(&self) -> Vec<WidgetError> {
        // Taken under the lock, released outside it so releases may re-enter
        let handles = std::mem::take(&mut self.inner.lock().handles);
        if !handles.is_empty() {
            debug!("Scope '{}' releasing {} handles", self.name, handles.len());
        }

        let mut failures = Vec::new();
        for handle in handles {
            let label = handle.label().to_string();
            if let Err(e) = handle.release() {
                error!("Scope '{}' failed to release '{}': {}", self.name, label, e);
                failures.push(e);
            }
        }
        failures
    }

    pub fn attach(&self) {
        self.inner.lock().attached = true;
        debug!("Scope '{}' attached", self.name);
    }

    /// Flip to detached and release everything stored
    pub fn detach(&self) -> Vec<WidgetError> {
        self.inner.lock().attached = false;
        debug!("Scope '{}' detached", self.name);
        self.release_all()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().attached
    }

    pub fn len(&self) -> usize {
        self.inner.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
