use tokio::sync::watch;

/// Single cooperative cancellation signal shared by a chunker instance's
/// background loops (adaptation ticking, circuit-breaker health probing).
/// Grounded on `runtime/shared_runtime.rs`'s background-task-plus-handle
/// pattern, but instance-owned rather than a process-wide `OnceLock`
/// singleton — spec.md §9 flags the teacher's global runtime as exactly the
/// kind of hidden shared state a library embedded in someone else's process
/// should not introduce.
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn new() -> (Self, ShutdownSignal) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, ShutdownSignal { receiver })
    }

    /// Idempotent: signalling twice is a no-op the second time.
    pub fn signal(&self) {
        let _ = self.sender.send(true);
    }
}

impl ShutdownSignal {
    /// Resolves once `signal()` has been called. Safe to poll repeatedly
    /// inside a `tokio::select!` loop.
    pub async fn wait(&mut self) {
        let _ = self.receiver.changed().await;
    }

    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_wakes_a_waiting_receiver() {
        let (handle, mut signal) = ShutdownHandle::new();
        assert!(!signal.is_shutdown());
        handle.signal();
        signal.wait().await;
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn signalling_twice_is_harmless() {
        let (handle, signal) = ShutdownHandle::new();
        handle.signal();
        handle.signal();
        assert!(signal.is_shutdown());
    }
}
