use tokio::sync::watch;

/// Owner side of a cancellation signal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side, cheap to clone and hand to long-running work
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            let cancelled = *rx.borrow_and_update();
            if cancelled {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
