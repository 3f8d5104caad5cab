//! Page Render Core - reliable page-to-image rendering
//!
//! This crate provides the fallback coordinator that turns an encoded page
//! stream into a displayable image through an ordered chain of strategies,
//! along with the strategy registry and per-operation instrumentation
//! (durations, memory deltas, fallback events).

pub mod config;
pub mod context;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod events;
pub mod memory;
pub mod observability;
pub mod rasterizer;
pub mod registry;
pub mod strategy;
pub mod stream;

pub use config::{default_config_path, load_config, RenderConfig};
pub use context::RenderContext;
pub use coordinator::{
    FailureReason, FailureRecord, RenderSuccess, RenderingCoordinator, RENDER_OPERATION,
};
pub use display::{file_uri, DisplayHost, DisplayImage, HeadlessHost, WritableBitmap};
pub use error::{DisplayError, RasterError, RenderError, StrategyError};
pub use events::{EventKind, EventSink, FanoutSink, RecordingSink, RenderEvent, TracingSink};
pub use memory::{
    format_bytes, MemoryDelta, MemoryMonitor, MemorySnapshot, MemoryThresholds, ProcessProbe,
    ResourceProbe, ResourceUsage,
};
pub use observability::{ObservabilityService, OperationScope};
pub use rasterizer::{DocumentHandle, InMemoryRasterizer, PageRasterizer};
pub use registry::StrategyRegistry;
pub use strategy::{RenderStrategy, StrategyInfo};
pub use stream::EncodedStream;
