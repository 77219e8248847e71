use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::app::error::AppError;

/// One mutex per device serial. State-mutating WiFi operations hold it for their whole run
/// because the platform's WiFi state machine is not reentrant.
#[derive(Default)]
pub struct DeviceLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, serial: &str, trace_id: &str) -> Result<Arc<Mutex<()>>, AppError> {
        let mut guard = self
            .locks
            .lock()
            .map_err(|_| AppError::system("Device lock registry poisoned", trace_id))?;
        Ok(guard
            .entry(serial.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    pub fn with_lock<T>(
        &self,
        serial: &str,
        trace_id: &str,
        work: impl FnOnce() -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let lock = self.lock_for(serial, trace_id)?;
        let _guard = lock.lock().map_err(|_| {
            warn!(trace_id = %trace_id, serial = %serial, "device lock poisoned");
            AppError::system("Failed to access the device. Please try again.", trace_id)
        })?;
        work()
    }
}
