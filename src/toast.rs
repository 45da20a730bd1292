use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::domain::Severity;

/// Anything that can show a notification to the user.
pub trait ToastSink {
    fn show_toast(&mut self, message: &str, severity: Severity);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    /// None when the toast outlives what `Instant` can represent.
    pub expires_at: Option<Instant>,
}

/// Stack of visible toasts. Each one expires on its own deadline.
#[derive(Debug)]
pub struct ToastStack {
    toasts: VecDeque<Toast>,
    next_id: u64,
    duration: Duration,
    capacity: usize,
}

impl ToastStack {
    pub fn new(duration: Duration, capacity: usize) -> Self {
        Self {
            toasts: VecDeque::new(),
            next_id: 1,
            duration,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity, now: Instant) -> u64 {
        let message = message.into();
        match severity {
            Severity::Error => error!("Toast: {message}"),
            Severity::Warning => warn!("Toast: {message}"),
            Severity::Info | Severity::Success => info!("Toast: {message}"),
        }
        if self.toasts.len() == self.capacity
            && let Some(dropped) = self.toasts.pop_front()
        {
            debug!("Toast stack full, dropping #{}", dropped.id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.toasts.push_back(Toast {
            id,
            message,
            severity,
            expires_at: now.checked_add(self.duration),
        });
        id
    }

    /// Removes expired toasts, returns true if anything changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.expires_at.is_none_or(|at| at > now));
        before != self.toasts.len()
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        before != self.toasts.len()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

impl ToastSink for ToastStack {
    fn show_toast(&mut self, message: &str, severity: Severity) {
        self.push(message, severity, Instant::now());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records toasts instead of showing them.
    #[derive(Default)]
    pub struct RecordingSink {
        pub toasts: Vec<(String, Severity)>,
    }

    impl RecordingSink {
        pub fn count(&self, severity: Severity) -> usize {
            self.toasts.iter().filter(|(_, s)| *s == severity).count()
        }
    }

    impl ToastSink for RecordingSink {
        fn show_toast(&mut self, message: &str, severity: Severity) {
            self.toasts.push((message.to_string(), severity));
        }
    }

    #[test]
    fn toasts_stack_and_expire_independently() {
        let start = Instant::now();
        let mut stack = ToastStack::new(Duration::from_secs(3), 5);
        stack.push("first", Severity::Info, start);
        stack.push("second", Severity::Error, start + Duration::from_secs(2));
        assert_eq!(stack.len(), 2);

        assert!(!stack.expire(start + Duration::from_secs(1)));
        assert!(stack.expire(start + Duration::from_secs(3)));
        let left: Vec<_> = stack.visible().map(|t| t.message.as_str()).collect();
        assert_eq!(left, vec!["second"]);

        assert!(stack.expire(start + Duration::from_secs(5)));
        assert!(stack.is_empty());
    }

    #[test]
    fn full_stack_drops_the_oldest() {
        let now = Instant::now();
        let mut stack = ToastStack::new(Duration::from_secs(3), 2);
        let first = stack.push("a", Severity::Info, now);
        stack.push("b", Severity::Warning, now);
        stack.push("c", Severity::Success, now);
        assert_eq!(stack.len(), 2);
        assert!(stack.visible().all(|t| t.id != first));
        assert!(!stack.dismiss(first));
    }

    #[test]
    fn huge_duration_does_not_overflow() {
        let now = Instant::now();
        let mut stack = ToastStack::new(Duration::MAX, 2);
        let id = stack.push("sticky", Severity::Warning, now);
        assert!(!stack.expire(now + Duration::from_secs(3600)));
        assert!(stack.dismiss(id));
    }

    #[test]
    fn dismiss_removes_one() {
        let now = Instant::now();
        let mut stack = ToastStack::new(Duration::from_secs(3), 4);
        let a = stack.push("a", Severity::Info, now);
        stack.push("b", Severity::Info, now);
        assert!(stack.dismiss(a));
        assert_eq!(stack.len(), 1);
    }
}
