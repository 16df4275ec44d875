//! Process-wide shutdown flag, polled by decoder threads between subframes

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default)]
pub struct ShutdownFlag {
    requested: Mutex<bool>,
    changed: Condvar,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop to stop at its next iteration
    pub fn request(&self) {
        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        if !*requested {
            info!("Shutdown requested");
            *requested = true;
        }
        drop(requested);
        self.changed.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep until shutdown is requested or `timeout` passes; true if requested
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        let (requested, _) = self
            .changed
            .wait_timeout_while(requested, timeout, |r| !*r)
            .unwrap_or_else(PoisonError::into_inner);
        *requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_request_wakes_waiter() {
        let flag = Arc::new(ShutdownFlag::new());
        assert!(!flag.wait_timeout(Duration::from_millis(5)));

        let waiter = {
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || flag.wait_timeout(Duration::from_secs(10)))
        };
        flag.request();
        assert!(waiter.join().unwrap());
        assert!(flag.is_set());
    }
}
