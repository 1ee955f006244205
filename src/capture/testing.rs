//! Scripted screenshotter and collector for engine tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex,
};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::collector::Collector;
use crate::models::UploadBatch;

use super::screenshot::{CaptureTarget, Screenshotter};

/// Sleeps on the (paused) runtime clock, then lets woken tasks run.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub struct FakeScreenshotter {
    calls: AtomicUsize,
    started: AtomicUsize,
    failing: AtomicBool,
    gate: Option<Semaphore>,
}

impl FakeScreenshotter {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            gate: None,
        }
    }

    /// Screenshots block until `release` hands out permits.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn release(&self, shots: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(shots);
        }
    }

    /// Successful screenshots.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Screenshots begun, including ones still waiting on the gate.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Screenshotter for FakeScreenshotter {
    async fn capture(&self, _target: &CaptureTarget) -> Result<Vec<u8>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if self.failing.load(Ordering::SeqCst) {
            bail!("view not mounted");
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"png".to_vec())
    }
}

pub struct FakeCollector {
    calls: AtomicUsize,
    failing: AtomicBool,
    gate: Option<Semaphore>,
    batches: Mutex<Vec<UploadBatch>>,
}

impl FakeCollector {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            gate: None,
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Uploads block until `release` hands out permits.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn release(&self, uploads: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(uploads);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<UploadBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Collector for FakeCollector {
    async fn upload(&self, batch: &UploadBatch) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if self.failing.load(Ordering::SeqCst) {
            bail!("collector unavailable");
        }
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}
