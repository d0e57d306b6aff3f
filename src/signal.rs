use tokio::signal::unix::{signal, Signal, SignalKind};

/// Multiplexes any number of unix signals into a single `recv` call.
#[derive(Default)]
pub struct SignalHandler {
    signals: Vec<(SignalKind, Signal)>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, kind: SignalKind) -> Self {
        let signal = signal(kind).expect("failed to register signal handler");
        self.signals.push((kind, signal));
        self
    }

    /// Waits for the next registered signal to arrive and returns its kind.
    pub async fn recv(&mut self) -> SignalKind {
        let polls = self.signals.iter_mut().map(|(kind, signal)| {
            let kind = *kind;
            Box::pin(async move {
                signal.recv().await;
                kind
            })
        });

        let (kind, _, _) = futures_util::future::select_all(polls).await;

        kind
    }
}
