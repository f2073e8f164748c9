//! Asynchronous completion of task bodies.
//!
//! A body that cannot finish before returning asks for a [`Done`] handle and
//! signals it later, possibly from another thread. The executor parks on the
//! matching [`CompletionGate`] until the first signal arrives.
//!
//! No timeout is imposed here: a handle that is kept alive but never signaled
//! blocks the pipeline forever. Bodies talking to slow external services must
//! bound their own wait and call [`Done::fail`] on expiry. Dropping every clone
//! of a handle without signaling is reported as [`TaskFailure::Abandoned`].

use flume::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::logger::{debug, warn};
use crate::task::error::{TaskFailure, TaskResult};

/// Completion handle handed to an asynchronous task body.
///
/// Clones share one signal; only the first `succeed`/`fail` is delivered.
#[derive(Clone, Debug)]
pub struct Done {
    tx: Sender<TaskResult>,
    signaled: Arc<AtomicBool>,
}

impl Done {
    pub fn succeed(&self) -> bool {
        self.signal(Ok(()))
    }

    pub fn fail(&self, reason: TaskFailure) -> bool {
        self.signal(Err(reason))
    }

    /// Returns `false` when the handle had already been signaled.
    pub fn signal(&self, result: TaskResult) -> bool {
        if self.signaled.swap(true, Ordering::SeqCst) {
            warn!("completion already signaled; ignoring {:?}", result);
            return false;
        }
        debug!("completion signaled: {:?}", result);
        // The gate may be gone if the executor stopped waiting; nothing to do then.
        let _ = self.tx.send(result);
        true
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }
}

/// Receiving side of a [`Done`] handle.
#[derive(Debug)]
pub struct CompletionGate {
    rx: Receiver<TaskResult>,
}

impl CompletionGate {
    pub fn wait(self) -> TaskResult {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(TaskFailure::Abandoned),
        }
    }
}

pub fn channel() -> (Done, CompletionGate) {
    let (tx, rx) = flume::bounded(1);
    (
        Done {
            tx,
            signaled: Arc::new(AtomicBool::new(false)),
        },
        CompletionGate { rx },
    )
}

/// An async request made during a body call.
///
/// Holds one handle clone so that repeated requests return the same signal.
#[derive(Debug)]
pub(crate) struct AsyncSlot {
    done: Done,
    gate: CompletionGate,
}

impl AsyncSlot {
    pub(crate) fn request(slot: &mut Option<AsyncSlot>) -> Done {
        slot.get_or_insert_with(|| {
            let (done, gate) = channel();
            AsyncSlot { done, gate }
        })
        .done
        .clone()
    }

    /// Drops the retained handle so a body that lost every clone is detected.
    pub(crate) fn into_gate(self) -> CompletionGate {
        self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_signal_from_other_thread() {
        let (done, gate) = channel();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            done.fail(TaskFailure::message("tunnel closed"));
        });
        assert_eq!(gate.wait(), Err(TaskFailure::message("tunnel closed")));
        handle.join().unwrap();
    }

    #[test]
    fn only_first_signal_is_delivered() {
        let (done, gate) = channel();
        let clone = done.clone();
        assert!(done.succeed());
        assert!(!clone.fail(TaskFailure::ReturnedFalse));
        assert!(clone.is_signaled());
        assert_eq!(gate.wait(), Ok(()));
    }

    #[test]
    fn dropped_handle_is_abandoned() {
        let (done, gate) = channel();
        drop(done);
        assert_eq!(gate.wait(), Err(TaskFailure::Abandoned));
    }

    #[test]
    fn repeated_requests_share_one_handle() {
        let mut slot = None;
        let first = AsyncSlot::request(&mut slot);
        let second = AsyncSlot::request(&mut slot);
        assert!(first.succeed());
        assert!(!second.succeed());
        let gate = slot.take().unwrap().into_gate();
        assert_eq!(gate.wait(), Ok(()));
    }
}
