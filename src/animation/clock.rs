use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Shareable time source for transitions.
///
/// Clones share the same underlying time. Tests pin the time with [`Clock::set_time`].
#[derive(Debug, Clone)]
pub struct Clock {
    inner: Rc<RefCell<ClockInner>>,
}

#[derive(Debug)]
struct ClockInner {
    start: Instant,
    overridden: Option<Duration>,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ClockInner {
                start: Instant::now(),
                overridden: None,
            })),
        }
    }

    /// Creates a clock pinned to `time`.
    pub fn with_time(time: Duration) -> Self {
        let clock = Self::new();
        clock.set_time(time);
        clock
    }

    /// Current time since the clock was created, or the pinned time.
    pub fn now(&self) -> Duration {
        let inner = self.inner.borrow();
        inner.overridden.unwrap_or_else(|| inner.start.elapsed())
    }

    /// Pins the clock to `time` until [`Clock::unpin`] is called.
    pub fn set_time(&self, time: Duration) {
        self.inner.borrow_mut().overridden = Some(time);
    }

    pub fn advance(&self, by: Duration) {
        let now = self.now();
        self.set_time(now + by);
    }

    pub fn unpin(&self) {
        self.inner.borrow_mut().overridden = None;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
