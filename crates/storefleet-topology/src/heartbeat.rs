use crate::service::TopologyService;
use crate::TopologyError;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Background thread calling [`TopologyService::heartbeat`] on a fixed period.
///
/// Stops when [`HeartbeatHandle::stop`] is called or the handle is dropped;
/// both wait for the thread to finish.
pub struct HeartbeatHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl HeartbeatHandle {
    pub fn spawn(service: Arc<TopologyService>, period: Duration) -> Result<Self, TopologyError> {
        let (tx, rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("storefleet-heartbeat".to_owned())
            .spawn(move || {
                debug!("heartbeat started, period {}ms", period.as_millis());
                loop {
                    match rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => service.heartbeat(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("heartbeat stopped");
            })?;
        Ok(Self {
            stop: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.halt();
    }
}
