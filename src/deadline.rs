//! Deadlines and scoped countdown overrides.

use std::time::{Duration, Instant};

/// A three-valued bound on how long a blocking operation may wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deadline {
    /// Use the tube's (or the process-wide `Context`'s) current deadline.
    Default,
    /// Never time out.
    Forever,
    /// Time out after this many seconds.
    Finite(Duration),
}

impl Deadline {
    pub fn from_secs_f64(secs: f64) -> Self {
        Deadline::Finite(Duration::from_secs_f64(secs.max(0.0)))
    }

    /// `min(self, other)`, with `Forever` as the identity element and
    /// `Default` treated as "defer to whatever `other` resolves to" (the
    /// caller is expected to have already resolved `Default` against the
    /// context before combining).
    pub(crate) fn combine(self, other: Deadline) -> Deadline {
        match (self, other) {
            (Deadline::Forever, x) | (x, Deadline::Forever) => x,
            (Deadline::Finite(a), Deadline::Finite(b)) => Deadline::Finite(a.min(b)),
            (Deadline::Default, x) | (x, Deadline::Default) => x,
        }
    }

    /// A concrete countdown timer snapshotted from this deadline.
    pub(crate) fn start(self) -> Countdown {
        match self {
            Deadline::Forever => Countdown {
                deadline: None,
                started: Instant::now(),
            },
            Deadline::Default => Countdown {
                // Resolved by the caller before reaching here; treat a
                // stray `Default` as "expired immediately" so a forgotten
                // resolution fails loud rather than blocking forever.
                deadline: Some(Instant::now()),
                started: Instant::now(),
            },
            Deadline::Finite(d) => Countdown {
                deadline: Some(Instant::now() + d),
                started: Instant::now(),
            },
        }
    }
}

/// A running countdown derived from a [`Deadline`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Countdown {
    deadline: Option<Instant>,
    started: Instant,
}

impl Countdown {
    /// Remaining time, or `None` if this countdown never expires.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// True while the budget is strictly positive, or the countdown is
    /// unbounded.
    pub(crate) fn active(&self) -> bool {
        match self.remaining() {
            None => true,
            Some(d) => !d.is_zero(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The remaining budget, re-expressed as a [`Deadline`] so it can be
    /// threaded into the next `recv_raw` call of a multi-read operation.
    pub(crate) fn as_deadline(&self) -> Deadline {
        match self.remaining() {
            None => Deadline::Forever,
            Some(d) => Deadline::Finite(d),
        }
    }
}

/// A RAII scope acquired by [`crate::Tube::countdown`]. On `Drop`, the
/// previous deadline is restored on every exit path, including panics,
/// matching the Python `with countdown(t):` context manager.
pub struct CountdownGuard<'a> {
    stack: &'a std::sync::Mutex<Vec<Deadline>>,
}

impl<'a> CountdownGuard<'a> {
    pub(crate) fn acquire(stack: &'a std::sync::Mutex<Vec<Deadline>>, requested: Deadline) -> Self {
        let mut guard = stack.lock().unwrap();
        let current = *guard.last().expect("deadline stack is never empty");
        guard.push(current.combine(requested));
        drop(guard);
        CountdownGuard { stack }
    }
}

impl Drop for CountdownGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self.stack.lock().unwrap();
        guard.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forever_is_identity_for_combine() {
        let d = Deadline::Finite(Duration::from_secs(3));
        assert_eq!(d.combine(Deadline::Forever), d);
        assert_eq!(Deadline::Forever.combine(d), d);
    }

    #[test]
    fn combine_takes_the_minimum() {
        let a = Deadline::Finite(Duration::from_secs(3));
        let b = Deadline::Finite(Duration::from_secs(1));
        assert_eq!(a.combine(b), b);
    }

    #[test]
    fn zero_deadline_is_immediately_inactive() {
        let countdown = Deadline::Finite(Duration::ZERO).start();
        // A brief scheduling delay is fine; it must never report active.
        std::thread::sleep(Duration::from_millis(1));
        assert!(!countdown.active());
    }

    #[test]
    fn forever_is_always_active() {
        let countdown = Deadline::Forever.start();
        assert!(countdown.active());
        assert_eq!(countdown.remaining(), None);
    }

    #[test]
    fn countdown_guard_restores_previous_on_drop() {
        let stack = std::sync::Mutex::new(vec![Deadline::Forever]);
        {
            let _g = CountdownGuard::acquire(&stack, Deadline::Finite(Duration::from_secs(1)));
            assert_eq!(stack.lock().unwrap().len(), 2);
        }
        assert_eq!(stack.lock().unwrap().len(), 1);
        assert_eq!(*stack.lock().unwrap().last().unwrap(), Deadline::Forever);
    }
}
