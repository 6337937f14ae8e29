#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use rust_client::domain::Reading;
use simulator_service::sinks::{ReadingSink, SinkError, SinkKind};

/// In-memory sink that records everything it is handed.
pub struct RecordingSink {
    kind: SinkKind,
    pub readings: Mutex<Vec<Reading>>,
    pub flushes: AtomicUsize,
    pub closes: AtomicUsize,
    /// Number of readings seen at each flush.
    pub seen_at_flush: Mutex<Vec<usize>>,
}

impl RecordingSink {
    pub fn new(kind: SinkKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            readings: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            seen_at_flush: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.readings.lock().unwrap().len()
    }

    pub fn meter_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .readings
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.meter_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait::async_trait]
impl ReadingSink for RecordingSink {
    fn kind(&self) -> SinkKind {
        self.kind
    }

    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        self.readings.lock().unwrap().push(reading.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        let seen = self.count();
        self.seen_at_flush.lock().unwrap().push(seen);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that rejects every reading, optionally panicking for one meter.
pub struct FailingSink {
    kind: SinkKind,
    panic_on: Option<String>,
    pub attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new(kind: SinkKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            panic_on: None,
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn panicking_on(kind: SinkKind, meter_id: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            panic_on: Some(meter_id.to_string()),
            attempts: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl ReadingSink for FailingSink {
    fn kind(&self) -> SinkKind {
        self.kind
    }

    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.as_deref() == Some(reading.meter_id.as_str()) {
            panic!("simulated crash while handling {}", reading.meter_id);
        }
        Err(SinkError::Unavailable(format!("{} is down", self.kind)))
    }

    async fn flush(&self) -> Result<(), SinkError> {
        Err(SinkError::Unavailable(format!("{} flush refused", self.kind)))
    }
}
