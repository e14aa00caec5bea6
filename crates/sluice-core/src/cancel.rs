//! Cooperative cancellation shared by every task of a stream graph.
//!
//! The token is a crossbeam channel that never carries a message: cancelling
//! drops the only sender, which disconnects the receiver. Blocking operations
//! can therefore `select!` on [`CancelToken::signal`] next to their regular
//! channel operation and wake up the moment cancellation happens.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

/// Uninhabited message type; the signal channel only ever disconnects.
#[derive(Debug)]
pub enum Never {}

struct Inner {
    trigger: Mutex<Option<Sender<Never>>>,
    signal: Receiver<Never>,
    cancelled: AtomicBool,
}

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(tx)),
                signal: rx,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Cancel every operation observing this token. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.inner.trigger.lock() {
            Ok(mut guard) => {
                guard.take();
            }
            Err(poisoned) => {
                poisoned.into_inner().take();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled.
    pub fn signal(&self) -> &Receiver<Never> {
        &self.inner.signal
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
