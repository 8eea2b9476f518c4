//! CPU-GPU synchronization primitives.
//!
//! A [`Fence`] is a monotonically increasing 64-bit timeline. Queues advance it
//! when the work submitted before a signal has finished. An [`Event`] is a
//! waitable flag the fence sets once it reaches a requested value. [`GpuSync`]
//! pairs the two with the counter bookkeeping needed to wait for "everything
//! submitted so far".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::command::CommandQueue;
use crate::error::GraphicsError;

#[derive(Debug, Default)]
struct EventInner {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl EventInner {
    fn set(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_all();
    }
}

/// An auto-reset event.
///
/// The event has a single owner. Fences only hold weak references to it, so
/// dropping the event cancels any pending completion request.
#[derive(Debug, Default)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// Create an unsignaled event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the event, waking a waiter.
    pub fn set(&self) {
        self.inner.set();
    }

    /// Block until the event is signaled, then reset it.
    ///
    /// With `timeout == None` this waits indefinitely. Returns `false` if the
    /// timeout elapsed first.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut signaled = self.inner.signaled.lock();
        match timeout {
            None => {
                while !*signaled {
                    self.inner.condvar.wait(&mut signaled);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !*signaled {
                    if self.inner.condvar.wait_until(&mut signaled, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        std::mem::take(&mut *signaled)
    }

    fn downgrade(&self) -> Weak<EventInner> {
        Arc::downgrade(&self.inner)
    }
}

#[derive(Debug, Default)]
struct FenceInner {
    completed: AtomicU64,
    waiters: Mutex<Vec<(u64, Weak<EventInner>)>>,
}

/// A GPU timeline fence.
///
/// Clones share the same timeline. The completed value starts at zero and only
/// ever grows.
///
/// # Example
///
/// ```ignore
/// let fence = Fence::new();
/// queue.signal(&fence, 1)?;
///
/// let event = Event::new();
/// fence.set_event_on_completion(1, &event);
/// event.wait(None);
/// assert!(fence.completed_value() >= 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Fence {
    inner: Arc<FenceInner>,
}

impl Fence {
    /// Create a fence with completed value zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The highest value the GPU has reached.
    pub fn completed_value(&self) -> u64 {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Arrange for `event` to be set once the fence reaches `value`.
    ///
    /// Sets the event immediately if the value was already reached.
    pub fn set_event_on_completion(&self, value: u64, event: &Event) {
        let mut waiters = self.inner.waiters.lock();
        if self.completed_value() >= value {
            event.set();
        } else {
            waiters.push((value, event.downgrade()));
        }
    }

    /// Advance the timeline to `value` and wake matching events.
    pub(crate) fn complete(&self, value: u64) {
        self.inner.completed.fetch_max(value, Ordering::AcqRel);
        let reached = self.completed_value();
        let mut waiters = self.inner.waiters.lock();
        waiters.retain(|(target, event)| {
            if *target > reached {
                return true;
            }
            if let Some(event) = event.upgrade() {
                event.set();
            }
            false
        });
        log::trace!("Fence: completed value {reached}");
    }
}

/// A fence, an event and the counters to wait for submitted work.
///
/// `next_value` is always `wait_value + 1`: [`signal`](Self::signal) enqueues
/// `next_value` and makes it the value later waits block on.
///
/// # Example
///
/// ```ignore
/// let mut sync = device.create_sync();
/// context.submit(&queue)?;
/// sync.signal(&queue)?;
/// sync.wait()?;
/// ```
#[derive(Debug)]
pub struct GpuSync {
    fence: Fence,
    event: Event,
    wait_value: u64,
    next_value: u64,
    default_timeout: Option<Duration>,
}

impl Default for GpuSync {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuSync {
    /// Create a sync object whose [`wait`](Self::wait) blocks indefinitely.
    pub fn new() -> Self {
        Self {
            fence: Fence::new(),
            event: Event::new(),
            wait_value: 0,
            next_value: 1,
            default_timeout: None,
        }
    }

    /// Set the timeout used by [`wait`](Self::wait).
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The underlying fence.
    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Value the next wait blocks on.
    pub fn wait_value(&self) -> u64 {
        self.wait_value
    }

    /// Value the next signal enqueues.
    pub fn next_value(&self) -> u64 {
        self.next_value
    }

    /// Enqueue a fence signal behind all work submitted to `queue` so far.
    pub fn signal(&mut self, queue: &CommandQueue) -> Result<(), GraphicsError> {
        queue.signal(&self.fence, self.next_value)?;
        self.wait_value = self.next_value;
        self.next_value += 1;
        Ok(())
    }

    /// Wait for the last signaled value using the default timeout.
    pub fn wait(&self) -> Result<(), GraphicsError> {
        self.wait_for(self.default_timeout)
    }

    /// Wait for the last signaled value for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::Timeout`] if the fence did not reach the value
    /// in time.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), GraphicsError> {
        self.wait_for(Some(timeout))
    }

    fn wait_for(&self, timeout: Option<Duration>) -> Result<(), GraphicsError> {
        if self.fence.completed_value() >= self.wait_value {
            return Ok(());
        }
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        self.fence.set_event_on_completion(self.wait_value, &self.event);
        // The event may carry a stale signal from an earlier wait that timed out.
        while self.fence.completed_value() < self.wait_value {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(self.timed_out());
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            if !self.event.wait(remaining) && self.fence.completed_value() < self.wait_value {
                return Err(self.timed_out());
            }
        }
        Ok(())
    }

    fn timed_out(&self) -> GraphicsError {
        log::error!(
            "GpuSync: timed out waiting for fence value {} (completed {})",
            self.wait_value,
            self.fence.completed_value()
        );
        GraphicsError::Timeout {
            value: self.wait_value,
        }
    }
}

static_assertions::assert_impl_all!(Fence: Send, Sync, Clone);
static_assertions::assert_impl_all!(Event: Send, Sync);
static_assertions::assert_not_impl_any!(Event: Clone);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_starts_at_zero() {
        let fence = Fence::new();
        assert_eq!(fence.completed_value(), 0);
    }

    #[test]
    fn test_fence_is_monotonic() {
        let fence = Fence::new();
        fence.complete(5);
        fence.complete(3);
        assert_eq!(fence.completed_value(), 5);
    }

    #[test]
    fn test_fence_clone_shares_state() {
        let fence1 = Fence::new();
        let fence2 = fence1.clone();
        fence1.complete(2);
        assert_eq!(fence2.completed_value(), 2);
    }

    #[test]
    fn test_event_set_before_wait() {
        let event = Event::new();
        event.set();
        assert!(event.wait(Some(Duration::from_millis(1))));
        // Auto-reset
        assert!(!event.wait(Some(Duration::from_millis(1))));
    }

    #[test]
    fn test_event_on_reached_value_fires_immediately() {
        let fence = Fence::new();
        fence.complete(4);
        let event = Event::new();
        fence.set_event_on_completion(3, &event);
        assert!(event.wait(Some(Duration::from_millis(1))));
    }

    #[test]
    fn test_fence_completion_from_another_thread() {
        let fence = Fence::new();
        let event = Event::new();
        fence.set_event_on_completion(1, &event);

        let fence_clone = fence.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            fence_clone.complete(1);
        });

        assert!(event.wait(Some(Duration::from_secs(5))));
        assert_eq!(fence.completed_value(), 1);
        handle.join().unwrap();
    }

    #[test]
    fn test_dropped_event_is_skipped() {
        let fence = Fence::new();
        {
            let event = Event::new();
            fence.set_event_on_completion(1, &event);
        }
        fence.complete(1);
        assert!(fence.inner.waiters.lock().is_empty());
    }

    #[test]
    fn test_wait_before_signal_returns_immediately() {
        let sync = GpuSync::new();
        assert_eq!(sync.wait_value(), 0);
        assert_eq!(sync.next_value(), 1);
        assert!(sync.wait().is_ok());
        assert!(sync.wait_timeout(Duration::ZERO).is_ok());
    }

    #[test]
    fn test_wait_timeout_on_unreached_value() {
        let mut sync = GpuSync::new();
        // Pretend a signal was enqueued that the GPU never reaches.
        sync.wait_value = 1;
        sync.next_value = 2;
        let result = sync.wait_timeout(Duration::from_millis(10));
        assert_eq!(result, Err(GraphicsError::Timeout { value: 1 }));
    }

    #[test]
    fn test_wait_ignores_stale_event_signal() {
        let mut sync = GpuSync::new();
        sync.wait_value = 1;
        sync.next_value = 2;
        assert!(sync.wait_timeout(Duration::from_millis(1)).is_err());
        // The earlier request fires late, then a new value is awaited.
        sync.fence.complete(1);
        sync.wait_value = 2;
        sync.next_value = 3;
        assert_eq!(
            sync.wait_timeout(Duration::from_millis(10)),
            Err(GraphicsError::Timeout { value: 2 })
        );
    }

    #[test]
    fn test_default_timeout_applies_to_wait() {
        let mut sync = GpuSync::new().with_default_timeout(Some(Duration::from_millis(5)));
        sync.wait_value = 1;
        sync.next_value = 2;
        assert!(matches!(sync.wait(), Err(GraphicsError::Timeout { value: 1 })));
    }
}
