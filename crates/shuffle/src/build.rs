//! A reference-counted handle to a task's catalog build, acquired by each
//! ring at start and released at exit. Rings never see the build's
//! contents through this core (catalog build I/O is an external
//! collaborator); the handle exists purely to keep the build's backing
//! resources alive for as long as a ring reads under it.

use std::sync::Arc;

/// Acquires and releases build handles on behalf of rings. An external
/// collaborator (the catalog build database) implements this; tests and
/// this core's own examples can use a no-op service.
#[async_trait::async_trait]
pub trait BuildService: Send + Sync {
    async fn acquire(&self, build_id: &str) -> crate::Result<BuildHandle>;
}

struct Inner {
    build_id: String,
    released: std::sync::atomic::AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.released.load(std::sync::atomic::Ordering::Acquire) {
            // A missing explicit release is a development-time logic
            // error: surface it loudly rather than leak silently.
            if !std::thread::panicking() {
                panic!("build handle for {:?} dropped without being released", self.build_id);
            }
        }
    }
}

/// A live reference to an acquired build. Must be released via
/// [`BuildHandle::release`]; dropping it without releasing panics.
#[derive(Clone)]
pub struct BuildHandle(Arc<Inner>);

impl BuildHandle {
    pub fn new(build_id: &str) -> Self {
        Self(Arc::new(Inner {
            build_id: build_id.to_string(),
            released: std::sync::atomic::AtomicBool::new(false),
        }))
    }

    pub fn build_id(&self) -> &str {
        &self.0.build_id
    }

    /// Mark this handle released. Must be called exactly once per
    /// `acquire`, when the last clone of the handle is dropped.
    pub fn release(self) {
        self.0.released.store(true, std::sync::atomic::Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_then_drop_does_not_panic() {
        let h = BuildHandle::new("build-1");
        h.clone().release();
        drop(h);
    }

    #[test]
    #[should_panic(expected = "dropped without being released")]
    fn test_drop_without_release_panics() {
        let h = BuildHandle::new("build-1");
        drop(h);
    }
}
