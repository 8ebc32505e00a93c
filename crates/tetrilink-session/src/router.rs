//! Prefix-based dispatch of received lines.
//!
//! Every line the session receives goes through [`MessageRouter::dispatch`]
//! on the receive task. The registered prefix that is the longest literal
//! leading substring of the line wins, so `item:speed-up:` beats `item:`.
//! Lines nobody registered for are dropped.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

/// A registered line handler. Receives the payload after the prefix.
pub type Handler = Arc<dyn Fn(&str) + Send + Sync>;

/// Prefix to handler registry.
///
/// Registration may happen from any task, concurrently with dispatch.
/// Handlers run outside the registry lock, so a handler may register or
/// remove callbacks (including its own).
#[derive(Default)]
pub struct MessageRouter {
    handlers: Mutex<HashMap<String, Handler>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `prefix`, replacing any previous handler
    /// under the same key.
    pub fn add(&self, prefix: impl Into<String>, handler: Handler) {
        let prefix = prefix.into();
        let replaced = self.handlers.lock().insert(prefix.clone(), handler);
        if replaced.is_some() {
            tracing::debug!(prefix, "callback replaced");
        }
    }

    /// Removes the handler for `prefix`. Returns whether one existed.
    pub fn remove(&self, prefix: &str) -> bool {
        self.handlers.lock().remove(prefix).is_some()
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.handlers.lock().contains_key(prefix)
    }

    /// Routes one line to the handler with the longest matching prefix.
    ///
    /// Returns `true` if a handler ran. A panicking handler is logged and
    /// counts as handled; it never takes the receive task down.
    pub fn dispatch(&self, line: &str) -> bool {
        let matched = {
            let handlers = self.handlers.lock();
            handlers
                .iter()
                .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(prefix, handler)| (prefix.len(), Arc::clone(handler)))
        };

        let Some((prefix_len, handler)) = matched else {
            tracing::trace!(line, "no callback for line");
            return false;
        };

        let payload = &line[prefix_len..];
        if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
            tracing::error!(line, "callback panicked");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Handler, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Handler = Arc::new(move |payload: &str| sink.lock().push(payload.to_owned()));
        (handler, seen)
    }

    #[test]
    fn test_dispatch_longest_prefix_wins() {
        let router = MessageRouter::new();
        let (short, short_seen) = recorder();
        let (long, long_seen) = recorder();
        router.add("item:", short);
        router.add("item:speed-up:", long);

        assert!(router.dispatch("item:speed-up:3000"));
        assert!(router.dispatch("item:other"));

        assert_eq!(*long_seen.lock(), vec!["3000"]);
        assert_eq!(*short_seen.lock(), vec!["other"]);
    }

    #[test]
    fn test_dispatch_unmatched_line_is_dropped() {
        let router = MessageRouter::new();
        let (handler, seen) = recorder();
        router.add("board:", handler);
        assert!(!router.dispatch("attack-apply"));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_dispatch_prefix_must_lead_the_line() {
        let router = MessageRouter::new();
        let (handler, seen) = recorder();
        router.add("ready", handler);
        assert!(!router.dispatch("not-ready"));
        assert!(router.dispatch("ready"));
        assert_eq!(*seen.lock(), vec![""]);
    }

    #[test]
    fn test_add_same_prefix_replaces() {
        let router = MessageRouter::new();
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();
        router.add("start", first);
        router.add("start", second);
        router.dispatch("start");
        assert_eq!(router.len(), 1);
        assert!(first_seen.lock().is_empty());
        assert_eq!(second_seen.lock().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let router = MessageRouter::new();
        let (a, _) = recorder();
        let (b, _) = recorder();
        router.add("a", a);
        router.add("b", b);
        assert!(router.remove("a"));
        assert!(!router.remove("a"));
        assert!(router.contains("b"));
        router.clear();
        assert!(router.is_empty());
    }

    #[test]
    fn test_handler_can_remove_itself() {
        let router = Arc::new(MessageRouter::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&router);
        let c = Arc::clone(&calls);
        router.add(
            "once",
            Arc::new(move |_: &str| {
                c.fetch_add(1, Ordering::SeqCst);
                r.remove("once");
            }),
        );
        router.dispatch("once");
        router.dispatch("once");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let router = MessageRouter::new();
        router.add("boom", Arc::new(|_: &str| panic!("handler failure")));
        assert!(router.dispatch("boom"));
        // The router is still usable afterwards.
        let (handler, seen) = recorder();
        router.add("ok", handler);
        router.dispatch("ok:1");
        assert_eq!(*seen.lock(), vec![":1"]);
    }
}
