//! One-shot stop request from the operator to the acquisition loop.
//!
//! [`stop_signal`] returns a sending [`StopHandle`] and a receiving [`StopToken`].
//! The loop owns the token and checks it between polls; handles can be cloned
//! into a watcher thread or a Ctrl-C hook.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

/// Create a connected handle/token pair in the waiting state.
pub fn stop_signal() -> (StopHandle, StopToken) {
    let (tx, rx) = mpsc::channel();
    (
        StopHandle { tx },
        StopToken {
            rx,
            signaled: false,
        },
    )
}

/// Requests a stop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Sender<()>,
}

impl StopHandle {
    /// Move the token to the signaled state. Extra calls are harmless.
    pub fn signal(&self) {
        // The loop may already be gone, which is fine.
        let _ = self.tx.send(());
    }
}

/// Observed by the acquisition loop. Once signaled it stays signaled.
#[derive(Debug)]
pub struct StopToken {
    rx: Receiver<()>,
    signaled: bool,
}

impl StopToken {
    pub fn is_signaled(&mut self) -> bool {
        if self.signaled {
            return true;
        }
        match self.rx.try_recv() {
            Ok(()) => self.signaled = true,
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                // Nothing can signal anymore; waiting would never end.
                warn!("all stop handles dropped, stopping");
                self.signaled = true;
            }
        }
        self.signaled
    }
}

/// Spawn a thread that signals once a line (or end of input) arrives on `input`.
pub fn spawn_watcher<R>(mut input: R, handle: StopHandle) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("stop-watcher".into())
        .spawn(move || {
            let mut line = String::new();
            match input.read_line(&mut line) {
                Ok(0) => debug!("operator input closed"),
                Ok(_) => info!("stop requested by operator"),
                Err(e) => warn!("failed to read operator input: {e}"),
            }
            handle.signal();
        })
}
