//! Stop signals for an interactive recording

use std::io::BufRead;
use std::thread;

use colored::Colorize;
use tokio::sync::mpsc;

/// Why the user asked the recording to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Enter pressed on the terminal
    Enter,
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
}

/// Stop signal handler
///
/// Listens for Ctrl-C, SIGTERM and a line on stdin, and funnels them into
/// one channel. A closed stdin (e.g. when run from a script) is not a stop.
pub struct StopSignalHandler {
    receiver: mpsc::Receiver<StopSignal>,
}

impl StopSignalHandler {
    /// Start listening for stop signals.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self, std::io::Error> {
        let (tx, rx) = mpsc::channel(4);

        // Ctrl-C
        let tx_int = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                let _ = tx_int.send(StopSignal::Interrupt).await;
            }
        });

        // SIGTERM
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let tx_term = tx.clone();
            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::spawn(async move {
                sigterm.recv().await;
                eprintln!("{} Received SIGTERM", "↓".cyan());
                let _ = tx_term.send(StopSignal::Terminate).await;
            });
        }

        // Enter. A plain thread, so a pending read never holds up runtime
        // shutdown.
        thread::Builder::new()
            .name("voicecap-stdin".into())
            .spawn(move || {
                let mut line = String::new();
                if let Ok(read) = std::io::stdin().lock().read_line(&mut line) {
                    if read > 0 {
                        let _ = tx.blocking_send(StopSignal::Enter);
                    }
                }
            })?;

        Ok(Self { receiver: rx })
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Option<StopSignal> {
        self.receiver.recv().await
    }
}
