use std::time::Duration;

use crate::store::remote::RemoteStore;
use crate::store::transaction::RetryPolicy;
use crate::store::StoreError;

pub const DEFAULT_STORE_ADDR: &str = "127.0.0.1:6379";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Everything a client command needs to reach and use the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub store_addr: String,
    /// Per read/write timeout on the store connection. `None` waits forever.
    pub io_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_addr: DEFAULT_STORE_ADDR.to_string(),
            io_timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    /// A timeout of zero milliseconds disables the timeout.
    pub fn with_timeout_ms(mut self, millis: u64) -> Self {
        self.io_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        self
    }

    pub fn connect(&self) -> Result<RemoteStore, StoreError> {
        RemoteStore::connect(&self.store_addr, self.io_timeout)
    }
}
