//! Process termination signals
//!
//! On Unix SIGINT, SIGTERM and SIGQUIT are handled, with
//! [`tokio::signal::ctrl_c`] as fallback. Elsewhere only Ctrl-C is awaited.
//!
//! Handlers are installed by [`ShutdownSignals::register`], before any
//! monitoring starts, so a failure to install them is reported up front.

use tracing::info;

#[cfg(unix)]
pub struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Install the handlers; must be called inside a tokio runtime
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }

    /// Resolve on the first termination signal
    pub async fn wait(mut self) {
        let name = tokio::select! {
            _ = tokio::signal::ctrl_c() => "ctrl-c",
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigquit.recv() => "SIGQUIT",
        };
        info!("received {name}, shutting down");
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignals(());

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self(()))
    }

    pub async fn wait(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received ctrl-c, shutting down"),
            Err(e) => {
                tracing::error!("failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        }
    }
}
