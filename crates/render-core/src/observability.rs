//! Scoped per-operation instrumentation.
//!
//! [`ObservabilityService::begin_operation`] returns an [`OperationScope`]
//! that snapshots memory and logs a start event on creation, and on drop
//! logs exactly one terminal event (success or failure) with duration and
//! memory delta. Drop runs on every exit path, so early returns, `?`,
//! panics and cancelled futures all still produce the terminal event.

use crate::context::RenderContext;
use crate::events::{EventKind, EventSink, RenderEvent, TracingSink};
use crate::memory::{MemoryMonitor, MemorySnapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info_span, Span};

/// Failure message used when a scope is released without an outcome
pub const ABANDONED_MESSAGE: &str = "operation ended without an outcome";

/// Instrumentation entry point shared by the coordinator and its callers
#[derive(Clone)]
pub struct ObservabilityService {
    monitor: Arc<MemoryMonitor>,
    sink: Arc<dyn EventSink>,
}

impl ObservabilityService {
    pub fn new(monitor: Arc<MemoryMonitor>, sink: Arc<dyn EventSink>) -> Self {
        Self { monitor, sink }
    }

    /// Process monitor with default thresholds, events rendered through `tracing`
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(MemoryMonitor::new()), Arc::new(TracingSink))
    }

    pub fn monitor(&self) -> &MemoryMonitor {
        &self.monitor
    }

    /// Start an instrumented operation
    pub fn begin_operation(&self, name: &str, ctx: &RenderContext) -> OperationScope {
        let span = info_span!(
            "render_operation",
            operation = %name,
            operation_id = %ctx.operation_id(),
            page = ctx.page_number()
        );
        let before = self.monitor.capture(format!("{name}:before"));
        self.emit(RenderEvent::new(name, ctx, EventKind::Started));

        OperationScope {
            service: self.clone(),
            name: name.to_string(),
            ctx: ctx.clone(),
            span,
            started: Instant::now(),
            before,
            outcome: Outcome::Pending,
            attempted: Vec::new(),
        }
    }

    /// Record that a lower-priority strategy rescued the operation
    pub fn fallback_used(
        &self,
        operation: &str,
        ctx: &RenderContext,
        failed_strategy: &str,
        succeeded_strategy: &str,
        attempt: usize,
    ) {
        self.emit(RenderEvent::new(
            operation,
            ctx,
            EventKind::FallbackUsed {
                failed_strategy: failed_strategy.to_string(),
                succeeded_strategy: succeeded_strategy.to_string(),
                attempt,
            },
        ));
    }

    fn emit(&self, event: RenderEvent) {
        self.sink.emit(&event);
    }
}

impl Default for ObservabilityService {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Pending,
    Success { output_bytes: u64 },
    Failure { error: String },
}

/// One instrumented operation; emits its terminal event when dropped
pub struct OperationScope {
    service: ObservabilityService,
    name: String,
    ctx: RenderContext,
    span: Span,
    started: Instant,
    before: MemorySnapshot,
    outcome: Outcome,
    attempted: Vec<String>,
}

impl OperationScope {
    /// Mark the operation successful with the size of its output
    pub fn set_success(&mut self, output_bytes: u64) {
        self.outcome = Outcome::Success { output_bytes };
    }

    /// Mark the operation failed
    pub fn set_failure(&mut self, error: impl ToString) {
        self.outcome = Outcome::Failure {
            error: error.to_string(),
        };
    }

    /// Names of the attempts made, reported with a failure
    pub fn record_attempts(&mut self, attempted: Vec<String>) {
        self.attempted = attempted;
    }

    /// Span that sub-steps of this operation should be instrumented with
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let monitor = self.service.monitor();
        let after = monitor.capture(format!("{}:after", self.name));
        let mut memory = monitor.delta(&self.before, &after);
        memory.label = self.name.clone();

        let outcome = std::mem::replace(&mut self.outcome, Outcome::Pending);
        match outcome {
            Outcome::Success { output_bytes } => {
                let abnormal = memory.is_abnormal;
                self.service.emit(RenderEvent::new(
                    self.name.as_str(),
                    &self.ctx,
                    EventKind::Succeeded {
                        duration_ms,
                        output_bytes,
                        memory: memory.clone(),
                    },
                ));
                if abnormal {
                    self.service.emit(RenderEvent::new(
                        self.name.as_str(),
                        &self.ctx,
                        EventKind::MemoryWarning { memory },
                    ));
                }
            }
            Outcome::Failure { error } => self.emit_failure(duration_ms, error, memory.summary()),
            Outcome::Pending => {
                self.emit_failure(duration_ms, ABANDONED_MESSAGE.to_string(), memory.summary())
            }
        }
    }
}

impl OperationScope {
    fn emit_failure(&mut self, duration_ms: f64, error: String, memory_summary: String) {
        let attempted = std::mem::take(&mut self.attempted);
        self.service.emit(RenderEvent::new(
            self.name.as_str(),
            &self.ctx,
            EventKind::Failed {
                duration_ms,
                error,
                attempted,
                memory_summary,
            },
        ));
    }
}
