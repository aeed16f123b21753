//! Bounded UART handle pool.
//!
//! Serial adapters check a handle out before opening the device and the
//! handle returns to the pool when dropped after close. The pool guarantees
//! a freshly-checked-out handle is never already in use, and the semaphore
//! bounds how many ports the process holds at once.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::NetworkError;

#[derive(Debug, Clone)]
pub struct UartPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    semaphore: Arc<Semaphore>,
    in_use: Mutex<HashSet<String>>,
}

impl UartPool {
    /// A pool that will hand out at most `capacity` handles concurrently.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                in_use: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Check a device handle out of the pool. Waits for capacity, but fails
    /// immediately if the device is already checked out.
    pub async fn checkout(&self, device: &str) -> Result<UartHandle, NetworkError> {
        if self.inner.in_use.lock().contains(device) {
            return Err(NetworkError::PortInUse(device.to_string()));
        }

        // The pool is never closed, so acquisition only fails on a device
        // already holding a slot.
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| NetworkError::PortInUse(device.to_string()))?;

        let mut in_use = self.inner.in_use.lock();
        if !in_use.insert(device.to_string()) {
            return Err(NetworkError::PortInUse(device.to_string()));
        }

        Ok(UartHandle {
            device: device.to_string(),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// How many handles are currently checked out.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.lock().len()
    }
}

/// An exclusive lease on one serial device. Dropping the handle checks the
/// device back in.
#[derive(Debug)]
pub struct UartHandle {
    device: String,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl UartHandle {
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Drop for UartHandle {
    fn drop(&mut self) {
        self.pool.in_use.lock().remove(&self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn double_checkout_of_same_device_fails() {
        let pool = UartPool::new(4);
        let _handle = pool.checkout("/dev/ttyUSB0").await.unwrap();
        assert!(matches!(
            pool.checkout("/dev/ttyUSB0").await,
            Err(NetworkError::PortInUse(_))
        ));
    }

    #[tokio::test]
    async fn dropped_handle_returns_to_pool() {
        let pool = UartPool::new(4);
        let handle = pool.checkout("/dev/ttyUSB0").await.unwrap();
        assert_eq!(pool.in_use(), 1);
        drop(handle);
        assert_eq!(pool.in_use(), 0);
        let _again = pool.checkout("/dev/ttyUSB0").await.unwrap();
    }

    #[tokio::test]
    async fn capacity_bounds_concurrent_handles() {
        let pool = UartPool::new(1);
        let first = pool.checkout("/dev/ttyUSB0").await.unwrap();

        // A second device must wait for capacity.
        let pending = tokio::time::timeout(Duration::from_millis(20), pool.checkout("/dev/ttyUSB1"));
        assert!(pending.await.is_err());

        drop(first);
        let _second = pool.checkout("/dev/ttyUSB1").await.unwrap();
    }
}
