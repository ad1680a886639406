//! Best-effort analytics over execution records.
//!
//! The dispatcher forwards every finished execution record here. A sink
//! failure is logged and discarded by the dispatcher; nothing in this
//! module may alter the outcome of the call that produced the record.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;

use crate::dispatcher::ToolCall;
use crate::error::AnalyticsError;

/// Consumer of finished execution records.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Record one finished execution. May fail; the failure is non-fatal to
    /// the dispatcher.
    async fn track_execution(&self, record: ToolCall) -> Result<(), AnalyticsError>;
}

/// Sink that emits each record as a structured log line.
pub struct TracingSink;

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn track_execution(&self, record: ToolCall) -> Result<(), AnalyticsError> {
        info!(
            id = %record.id,
            tool = %record.name,
            status = ?record.status,
            duration_ms = record.duration_ms,
            "tool execution recorded"
        );
        Ok(())
    }
}

/// In-process ring buffer of recent execution records, served by
/// `GET /api/executions`.
pub struct MemorySink {
    capacity: usize,
    records: Mutex<VecDeque<ToolCall>>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Recent records, newest last.
    pub fn recent(&self) -> Vec<ToolCall> {
        self.records
            .lock()
            .expect("analytics lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("analytics lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn track_execution(&self, record: ToolCall) -> Result<(), AnalyticsError> {
        let mut records = self.records.lock().expect("analytics lock poisoned");
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }
}
