//! Fallback coordinator
//!
//! Requests the encoded page from the rasterizer once, then walks the
//! registered strategies in priority order until one produces an image.
//! Attempts are strictly sequential and share one stream, rewound before
//! every attempt. A strategy that errors or panics counts as a failed
//! attempt and never aborts the chain.

use crate::context::RenderContext;
use crate::display::DisplayImage;
use crate::error::{RasterError, RenderError};
use crate::observability::{ObservabilityService, OperationScope};
use crate::rasterizer::{DocumentHandle, PageRasterizer};
use crate::registry::StrategyRegistry;
use crate::stream::EncodedStream;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// Operation name used for the coordinator's telemetry
pub const RENDER_OPERATION: &str = "render_page";

/// Why a strategy attempt did not produce an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Strategy returned `None`
    NoImage,
    /// Strategy returned an error
    Error(String),
    /// Strategy panicked
    Panicked(String),
    /// Stream could not be rewound before the attempt
    Rewind(String),
}

/// One failed attempt in the fallback chain
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub strategy: String,
    pub priority: i32,
    pub duration: Duration,
    /// 1-based position in the chain
    pub ordinal: usize,
    pub reason: FailureReason,
}

/// Image produced by the chain along with how it was obtained
#[derive(Debug, Clone)]
pub struct RenderSuccess {
    pub image: DisplayImage,
    pub strategy: String,
    pub failures: Vec<FailureRecord>,
    pub elapsed: Duration,
}

impl RenderSuccess {
    /// Whether a strategy other than the first one produced the image
    pub fn used_fallback(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Orchestrates the fallback chain for one page render
pub struct RenderingCoordinator {
    rasterizer: Arc<dyn PageRasterizer>,
    registry: Arc<StrategyRegistry>,
    observability: ObservabilityService,
}

impl RenderingCoordinator {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        registry: Arc<StrategyRegistry>,
        observability: ObservabilityService,
    ) -> Self {
        Self {
            rasterizer,
            registry,
            observability,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn observability(&self) -> &ObservabilityService {
        &self.observability
    }

    /// Render a page, returning `None` when no image could be produced.
    ///
    /// Never fails: upstream errors and exhausted chains are logged and
    /// reported as `None`.
    pub async fn render(
        &self,
        document: &DocumentHandle,
        page_number: u32,
        zoom: f32,
        dpi: u32,
        ctx: &RenderContext,
    ) -> Option<DisplayImage> {
        self.render_detailed(document, page_number, zoom, dpi, ctx)
            .await
            .ok()
            .map(|success| success.image)
    }

    /// Render a page, returning the terminal outcome in detail
    pub async fn render_detailed(
        &self,
        document: &DocumentHandle,
        page_number: u32,
        zoom: f32,
        dpi: u32,
        ctx: &RenderContext,
    ) -> Result<RenderSuccess, RenderError> {
        let mut scope = self.observability.begin_operation(RENDER_OPERATION, ctx);
        let span = scope.span().clone();
        self.run_chain(&mut scope, document, page_number, zoom, dpi, ctx)
            .instrument(span)
            .await
    }

    async fn run_chain(
        &self,
        scope: &mut OperationScope,
        document: &DocumentHandle,
        page_number: u32,
        zoom: f32,
        dpi: u32,
        ctx: &RenderContext,
    ) -> Result<RenderSuccess, RenderError> {
        let started = Instant::now();

        let mut stream = match self.rasterize(document, page_number, zoom, dpi).await {
            Ok(stream) => stream,
            Err(err) => {
                scope.set_failure(format!("Upstream render failed: {err}"));
                return Err(RenderError::Upstream(err));
            }
        };
        debug!("Encoded page stream ready: {} bytes", stream.len());

        let strategies = self.registry.strategies();
        if strategies.is_empty() {
            let err = RenderError::NoStrategies;
            scope.set_failure(&err);
            return Err(err);
        }

        let mut failures: Vec<FailureRecord> = Vec::with_capacity(strategies.len());

        for (idx, strategy) in strategies.iter().enumerate() {
            let ordinal = idx + 1;
            let attempt_started = Instant::now();

            let outcome = match stream.rewind() {
                Ok(()) => {
                    let attempt_span = info_span!(
                        "strategy_attempt",
                        strategy = %strategy.name(),
                        priority = strategy.priority(),
                        ordinal
                    );
                    let attempt = AssertUnwindSafe(strategy.try_render(&mut stream, ctx))
                        .catch_unwind()
                        .instrument(attempt_span)
                        .await;
                    match attempt {
                        Ok(Ok(Some(image))) => Ok(image),
                        Ok(Ok(None)) => Err(FailureReason::NoImage),
                        Ok(Err(e)) => Err(FailureReason::Error(e.to_string())),
                        Err(payload) => Err(FailureReason::Panicked(panic_message(payload.as_ref()))),
                    }
                }
                Err(e) => Err(FailureReason::Rewind(e.to_string())),
            };

            match outcome {
                Ok(image) => {
                    drop(stream);
                    if let Some(previous) = failures.last() {
                        self.observability.fallback_used(
                            RENDER_OPERATION,
                            ctx,
                            &previous.strategy,
                            strategy.name(),
                            ordinal,
                        );
                    }
                    scope.set_success(image.byte_size());
                    info!(
                        "Page {} rendered by '{}' ({}x{}) in {:.1}ms",
                        page_number,
                        strategy.name(),
                        image.width(),
                        image.height(),
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                    return Ok(RenderSuccess {
                        image,
                        strategy: strategy.name().to_string(),
                        failures,
                        elapsed: started.elapsed(),
                    });
                }
                Err(reason) => {
                    let duration = attempt_started.elapsed();
                    match &reason {
                        FailureReason::NoImage => debug!(
                            "Strategy '{}' produced no image ({:?})",
                            strategy.name(),
                            duration
                        ),
                        other => warn!(
                            "Strategy '{}' failed unexpectedly: {:?}",
                            strategy.name(),
                            other
                        ),
                    }
                    failures.push(FailureRecord {
                        strategy: strategy.name().to_string(),
                        priority: strategy.priority(),
                        duration,
                        ordinal,
                        reason,
                    });
                }
            }
        }

        let attempted: Vec<String> = failures.iter().map(|f| f.strategy.clone()).collect();
        let err = RenderError::Exhausted {
            attempted: attempted.clone(),
        };
        scope.record_attempts(attempted);
        scope.set_failure(&err);
        Err(err)
    }

    async fn rasterize(
        &self,
        document: &DocumentHandle,
        page_number: u32,
        zoom: f32,
        dpi: u32,
    ) -> Result<EncodedStream, RasterError> {
        let span = info_span!("rasterize_page", page = page_number, zoom = f64::from(zoom), dpi);
        self.rasterizer
            .render_page(document, page_number, zoom, dpi)
            .instrument(span)
            .await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
