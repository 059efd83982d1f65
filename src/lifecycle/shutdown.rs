//! Shutdown hooks.

use std::sync::Mutex;

type Hook = Box<dyn FnOnce() + Send>;

/// Callbacks run once when graceful shutdown begins.
///
/// Hooks run in registration order. A hook registered after the hooks have
/// run is kept but never called.
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Mutex<Vec<Hook>>,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook.
    pub fn register<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock().push(Box::new(hook));
    }

    /// Run and remove every registered hook. Returns how many ran.
    pub fn run(&self) -> usize {
        let hooks = std::mem::take(&mut *self.lock());
        let count = hooks.len();
        for hook in hooks {
            hook();
        }
        count
    }

    /// Number of hooks waiting to run.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Hook>> {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHooks")
            .field("pending", &self.len())
            .finish()
    }
}
