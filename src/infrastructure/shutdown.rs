use tokio::{sync::watch, task::JoinHandle};

/// Process-wide stop signal shared by the dispatch loop and the app.
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, ShutdownListener { receiver })
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}

impl ShutdownListener {
    /// Resolves once shutdown is triggered or the sender is gone.
    pub async fn notified(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        let _ = self.receiver.changed().await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}

pub fn install_signal_handlers(shutdown: Shutdown) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "app", "interrupt received");
            ctrlc.trigger();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                tracing::info!(target: "app", "SIGTERM received");
                term.trigger();
            }
        });
    }
}

/// Calls `on_reload` for every SIGHUP until shutdown.
#[cfg(unix)]
pub fn install_reload_handler<F>(mut shutdown: ShutdownListener, on_reload: F) -> Option<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(err) => {
            tracing::warn!(target: "app", error = %err, "SIGHUP handler unavailable");
            return None;
        }
    };
    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!(target: "app", "SIGHUP received; reloading settings");
                    on_reload();
                }
                _ = shutdown.notified() => break,
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn install_reload_handler<F>(_shutdown: ShutdownListener, _on_reload: F) -> Option<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    None
}
