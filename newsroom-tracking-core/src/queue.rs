//! Pending call queue
//!
//! Calls issued before the analytics client is ready wait here in FIFO
//! order. Each entry is a fully built invocation whose arguments were bound
//! when it was queued; the client itself is looked up when it runs.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use serde::Deserialize;

use crate::client::{Capability, ClientRef};

/// How many queued calls a single notification drains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// At most one call per notification
    #[default]
    OnePerTick,
    /// Drain until the queue is empty
    Eager,
}

/// One queued analytics invocation
pub struct PendingCall {
    operation: Capability,
    run: Box<dyn FnOnce()>,
}

impl PendingCall {
    pub fn new(operation: Capability, run: impl FnOnce() + 'static) -> Self {
        Self {
            operation,
            run: Box::new(run),
        }
    }

    /// The client method this call targets
    pub fn operation(&self) -> Capability {
        self.operation
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Result of one drain attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No client is known yet; nothing ran
    NoClient,
    /// Nothing was queued
    Empty,
    /// The oldest call ran
    Delivered(Capability),
    /// The oldest call panicked; it was dropped and will not be retried
    Failed(Capability),
}

impl DrainOutcome {
    /// Whether a queued call was consumed
    pub fn consumed(&self) -> bool {
        matches!(self, DrainOutcome::Delivered(_) | DrainOutcome::Failed(_))
    }
}

/// FIFO of pending calls
#[derive(Debug, Default)]
pub struct CallQueue {
    calls: VecDeque<PendingCall>,
}

impl CallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, call: PendingCall) {
        self.calls.push_back(call);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Remove the oldest call if a client is currently known.
    ///
    /// The caller runs it with [`run_call`] after releasing any borrow of the
    /// queue, so the call may enqueue further work.
    pub fn take_ready(&mut self, client: &ClientRef) -> Result<PendingCall, DrainOutcome> {
        if !client.is_present() {
            return Err(DrainOutcome::NoClient);
        }
        self.calls.pop_front().ok_or(DrainOutcome::Empty)
    }
}

/// Run a call taken from the queue.
///
/// A panicking call is logged and reported as [`DrainOutcome::Failed`]; it is
/// never retried.
pub fn run_call(call: PendingCall) -> DrainOutcome {
    let operation = call.operation;
    match panic::catch_unwind(AssertUnwindSafe(call.run)) {
        Ok(()) => DrainOutcome::Delivered(operation),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(
                operation = %operation,
                error = %message,
                "Queued analytics call failed, dropping it"
            );
            DrainOutcome::Failed(operation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AnalyticsClient;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Noop;
    impl AnalyticsClient for Noop {}

    fn drain_one(queue: &mut CallQueue, client: &ClientRef) -> DrainOutcome {
        match queue.take_ready(client) {
            Ok(call) => run_call(call),
            Err(outcome) => outcome,
        }
    }

    fn recording_call(log: &Rc<RefCell<Vec<u32>>>, n: u32) -> PendingCall {
        let log = Rc::clone(log);
        PendingCall::new(Capability::Track, move || log.borrow_mut().push(n))
    }

    #[test]
    fn test_no_drain_without_client() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut queue = CallQueue::new();
        queue.push(recording_call(&log, 1));

        let outcome = drain_one(&mut queue, &ClientRef::default());
        assert_eq!(outcome, DrainOutcome::NoClient);
        assert_eq!(queue.len(), 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_drains_one_in_fifo_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let client = ClientRef::new(Some(Rc::new(Noop)));
        let mut queue = CallQueue::new();
        for n in 1..=3 {
            queue.push(recording_call(&log, n));
        }

        assert_eq!(drain_one(&mut queue, &client), DrainOutcome::Delivered(Capability::Track));
        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(queue.len(), 2);

        drain_one(&mut queue, &client);
        drain_one(&mut queue, &client);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert_eq!(drain_one(&mut queue, &client), DrainOutcome::Empty);
    }

    #[test]
    fn test_panicking_call_is_dropped() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let client = ClientRef::new(Some(Rc::new(Noop)));
        let mut queue = CallQueue::new();
        queue.push(PendingCall::new(Capability::Identify, || panic!("client blew up")));
        queue.push(recording_call(&log, 2));

        let outcome = drain_one(&mut queue, &client);
        assert_eq!(outcome, DrainOutcome::Failed(Capability::Identify));
        assert!(outcome.consumed());
        assert_eq!(queue.len(), 1);

        drain_one(&mut queue, &client);
        assert_eq!(*log.borrow(), vec![2]);
    }

    #[test]
    fn test_drain_mode_parses() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: DrainMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"eager\"").unwrap();
        assert_eq!(parsed.mode, DrainMode::Eager);
        assert_eq!(DrainMode::default(), DrainMode::OnePerTick);
    }
}
