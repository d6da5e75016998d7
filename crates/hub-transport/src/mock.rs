use crate::traits::check_full_read;
use crate::{BusInfo, RegisterBus, Result, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A simple in-process mock hub.
///
/// Read responses are scripted with [`MockHub::push_read`] and consumed in
/// FIFO order; every write is recorded and can be inspected afterwards.
/// Clones share the same script and log, so a test can keep one handle
/// while the driver owns another.
#[derive(Clone)]
pub struct MockHub {
    name: String,
    reads: Arc<Mutex<VecDeque<Vec<u8>>>>,
    writes: Arc<Mutex<Vec<(u8, Vec<u8>)>>>,
}

impl MockHub {
    /// Queue the response returned by the next unanswered `read`.
    pub fn push_read(&self, bytes: Vec<u8>) {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push_back(bytes);
        }
    }

    /// All writes performed so far, as (register, payload) pairs.
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.writes
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }
}

impl RegisterBus for MockHub {
    fn open(name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            reads: Arc::new(Mutex::new(VecDeque::new())),
            writes: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn list() -> Result<Vec<BusInfo>> {
        Ok(vec![BusInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn read(&mut self, register: u8, len: usize) -> Result<Vec<u8>> {
        let mut reads = self
            .reads
            .lock()
            .map_err(|_| TransportError::Io("mock script lock poisoned".to_string()))?;
        let mut response = reads.pop_front().ok_or(TransportError::Timeout)?;
        tracing::debug!(bus = %self.name, register, len, "mock read");
        check_full_read(len, &response)?;
        response.truncate(len);
        Ok(response)
    }

    fn write(&mut self, register: u8, bytes: &[u8]) -> Result<()> {
        let mut writes = self
            .writes
            .lock()
            .map_err(|_| TransportError::Io("mock write log lock poisoned".to_string()))?;
        writes.push((register, bytes.to_vec()));
        Ok(())
    }
}
