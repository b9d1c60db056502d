use tokio::sync::watch;

/// Owner side of an abort signal.
#[derive(Debug)]
pub struct AbortController {
    sender: watch::Sender<bool>,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Abort every call observing a signal of this controller. Idempotent.
    pub fn abort(&self) {
        self.sender.send_replace(true);
    }
}

/// Advisory cancellation handed to the transport alongside a request.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    receiver: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Completes once the controller aborts. Never completes if the controller
    /// is dropped without aborting.
    pub async fn aborted(&self) {
        let mut receiver = self.receiver.clone();
        let result = receiver.wait_for(|aborted| *aborted).await.map(|_| ());
        if result.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}
