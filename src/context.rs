use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};

struct RawContext {
    // Dropped when the last context clone goes away, which is what
    // `Handler::cancel` waits on.
    _sender: oneshot::Sender<()>,
    cancel_receiver: broadcast::Receiver<()>,
}

/// The owning half of a [`Context`]. Cancelling it wakes every clone of the
/// context and then waits for all of them to be dropped.
pub struct Handler {
    recv: oneshot::Receiver<()>,
    cancel_sender: broadcast::Sender<()>,
}

impl Handler {
    pub async fn cancel(self) {
        drop(self.cancel_sender);

        let _ = self.recv.await;
    }
}

#[derive(Clone)]
pub struct Context(Arc<RawContext>);

impl Context {
    pub fn new() -> (Self, Handler) {
        let (sender, recv) = oneshot::channel();
        let (cancel_sender, cancel_receiver) = broadcast::channel(1);

        (
            Self(Arc::new(RawContext {
                _sender: sender,
                cancel_receiver,
            })),
            Handler {
                recv,
                cancel_sender,
            },
        )
    }

    /// Resolves once the owning [`Handler`] has been cancelled.
    pub async fn done(&self) {
        let mut recv = self.0.cancel_receiver.resubscribe();
        let _ = recv.recv().await;
    }
}
