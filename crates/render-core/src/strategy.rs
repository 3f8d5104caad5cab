//! Rendering strategy trait

use crate::context::RenderContext;
use crate::display::DisplayImage;
use crate::error::StrategyError;
use crate::stream::EncodedStream;
use async_trait::async_trait;
use serde::Serialize;

/// Converts an encoded pixel stream into a display image.
///
/// Implementations report ordinary failures by returning `Ok(None)`. An `Err`
/// (or a panic) is unexpected; the coordinator still contains it and moves on
/// to the next strategy.
#[async_trait]
pub trait RenderStrategy: Send + Sync {
    /// Unique strategy identifier
    fn name(&self) -> &str;

    /// Lower values are tried first
    fn priority(&self) -> i32;

    /// Attempt to build a display image from `stream`.
    ///
    /// The stream cursor is at position 0 on entry.
    async fn try_render(
        &self,
        stream: &mut EncodedStream,
        ctx: &RenderContext,
    ) -> Result<Option<DisplayImage>, StrategyError>;
}

/// Name and priority of a registered strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyInfo {
    pub name: String,
    pub priority: i32,
}

impl StrategyInfo {
    pub fn of(strategy: &dyn RenderStrategy) -> Self {
        Self {
            name: strategy.name().to_string(),
            priority: strategy.priority(),
        }
    }
}
