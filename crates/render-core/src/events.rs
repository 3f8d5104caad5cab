//! Structured telemetry events and sinks

use crate::context::RenderContext;
use crate::memory::MemoryDelta;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Target used for all telemetry log lines
pub const TELEMETRY_TARGET: &str = "page_render::telemetry";

/// One telemetry event, correlated to a render request
#[derive(Debug, Clone, Serialize)]
pub struct RenderEvent {
    pub operation: String,
    pub document_path: PathBuf,
    pub page_number: u32,
    pub total_pages: u32,
    pub request_source: String,
    pub operation_id: Uuid,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl RenderEvent {
    pub fn new(operation: impl Into<String>, ctx: &RenderContext, kind: EventKind) -> Self {
        Self {
            operation: operation.into(),
            document_path: ctx.document_path().to_path_buf(),
            page_number: ctx.page_number(),
            total_pages: ctx.total_pages(),
            request_source: ctx.request_source().to_string(),
            operation_id: ctx.operation_id(),
            kind,
        }
    }

    /// JSON line form of the event
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"type\":\"serialization_error\",\"error\":\"{e}\"}}")
        })
    }
}

/// Event payloads
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Started,

    Succeeded {
        duration_ms: f64,
        output_bytes: u64,
        memory: MemoryDelta,
    },

    /// Emitted right after `Succeeded` when the memory delta is abnormal
    MemoryWarning { memory: MemoryDelta },

    Failed {
        duration_ms: f64,
        error: String,
        attempted: Vec<String>,
        memory_summary: String,
    },

    FallbackUsed {
        failed_strategy: String,
        succeeded_strategy: String,
        attempt: usize,
    },
}

/// Receiver of telemetry events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RenderEvent);
}

/// Renders events as `tracing` events under [`TELEMETRY_TARGET`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RenderEvent) {
        let document = event.document_path.display();
        match &event.kind {
            EventKind::Started => info!(
                target: TELEMETRY_TARGET,
                operation = %event.operation,
                document = %document,
                page = event.page_number,
                total_pages = event.total_pages,
                source = %event.request_source,
                operation_id = %event.operation_id,
                "operation started"
            ),
            EventKind::Succeeded {
                duration_ms,
                output_bytes,
                memory,
            } => info!(
                target: TELEMETRY_TARGET,
                operation = %event.operation,
                document = %document,
                page = event.page_number,
                total_pages = event.total_pages,
                source = %event.request_source,
                operation_id = %event.operation_id,
                duration_ms = *duration_ms,
                output_bytes = *output_bytes,
                memory = %memory.summary(),
                "operation succeeded"
            ),
            EventKind::MemoryWarning { memory } => warn!(
                target: TELEMETRY_TARGET,
                operation = %event.operation,
                page = event.page_number,
                operation_id = %event.operation_id,
                memory = %memory.display(),
                "abnormal memory growth"
            ),
            EventKind::Failed {
                duration_ms,
                error,
                attempted,
                memory_summary,
            } => error!(
                target: TELEMETRY_TARGET,
                operation = %event.operation,
                document = %document,
                page = event.page_number,
                total_pages = event.total_pages,
                source = %event.request_source,
                operation_id = %event.operation_id,
                duration_ms = *duration_ms,
                attempted = %attempted.join(","),
                memory = %memory_summary,
                "operation failed: {}",
                error
            ),
            EventKind::FallbackUsed {
                failed_strategy,
                succeeded_strategy,
                attempt,
            } => warn!(
                target: TELEMETRY_TARGET,
                operation = %event.operation,
                page = event.page_number,
                operation_id = %event.operation_id,
                failed = %failed_strategy,
                succeeded = %succeeded_strategy,
                attempt = *attempt,
                "fallback strategy used"
            ),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<RenderEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &RenderEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Sends every event to several sinks in order
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &RenderEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
