use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// First Ctrl-C requests shutdown, a second one exits immediately.
pub fn install_signal_handler() {
    let installed = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(1);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\nshutdown requested, deregistering...");
    });
    if let Err(e) = installed {
        warn!("failed to install signal handler: {e}");
    }
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Block until a shutdown has been requested.
pub fn wait_for_shutdown(poll: Duration) {
    while !shutdown_requested() {
        std::thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_requested_by_default() {
        assert!(!shutdown_requested());
    }
}
