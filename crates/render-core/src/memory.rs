//! Process resource snapshots and deltas for instrumented operations.
//!
//! A [`MemoryMonitor`] captures a [`MemorySnapshot`] before and after an
//! operation; [`MemoryDelta::between`] turns the pair into a delta and flags
//! abnormal growth.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Default working-set growth considered abnormal (100 MiB)
pub const DEFAULT_WORKING_SET_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

/// Default handle-count growth considered abnormal
pub const DEFAULT_HANDLE_THRESHOLD: u64 = 1000;

static HEAP_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

/// Global allocator wrapper that counts live heap bytes.
///
/// Install it with `#[global_allocator]` in a binary to populate
/// [`MemorySnapshot::heap_bytes`]; without it heap bytes read as zero.
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            HEAP_ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        HEAP_ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
        System.dealloc(ptr, layout);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            let old_size = layout.size();
            if new_size > old_size {
                HEAP_ALLOCATED.fetch_add(new_size - old_size, Ordering::Relaxed);
            } else {
                HEAP_ALLOCATED.fetch_sub(old_size - new_size, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}

/// Live heap bytes counted by [`TrackingAllocator`]
pub fn tracked_heap_bytes() -> u64 {
    HEAP_ALLOCATED.load(Ordering::Relaxed) as u64
}

/// Raw resource readings from the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub working_set_bytes: u64,
    pub private_bytes: u64,
    /// Live heap bytes; zero unless [`TrackingAllocator`] is the global allocator
    pub heap_bytes: u64,
    pub handle_count: u64,
}

/// Source of resource readings
pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> ResourceUsage;
}

/// Reads the current process's resources from the OS
pub struct ProcessProbe {
    system: Mutex<sysinfo::System>,
    pid: Option<sysinfo::Pid>,
}

impl ProcessProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for ProcessProbe {
    fn sample(&self) -> ResourceUsage {
        let (working_set_bytes, private_bytes) = match self.pid {
            Some(pid) => {
                let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
                system.refresh_process(pid);
                system
                    .process(pid)
                    .map(|p| (p.memory(), p.virtual_memory()))
                    .unwrap_or_default()
            }
            None => (0, 0),
        };
        ResourceUsage {
            working_set_bytes,
            private_bytes,
            heap_bytes: tracked_heap_bytes(),
            handle_count: open_handle_count(),
        }
    }
}

/// Number of open file descriptors of this process
#[cfg(target_os = "linux")]
fn open_handle_count() -> u64 {
    std::fs::read_dir("/proc/self/fd")
        .map(|entries| entries.count() as u64)
        .unwrap_or(0)
}

/// Number of open file descriptors of this process
#[cfg(not(target_os = "linux"))]
fn open_handle_count() -> u64 {
    0
}

/// Growth limits beyond which a delta is flagged abnormal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryThresholds {
    pub working_set_bytes: u64,
    pub handle_count: u64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            working_set_bytes: DEFAULT_WORKING_SET_THRESHOLD_BYTES,
            handle_count: DEFAULT_HANDLE_THRESHOLD,
        }
    }
}

/// Point-in-time process resource measurement
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub label: String,
    pub working_set_bytes: u64,
    pub private_bytes: u64,
    /// See [`ResourceUsage::heap_bytes`]
    pub heap_bytes: u64,
    pub handle_count: u64,
    pub timestamp: DateTime<Utc>,
}

impl MemorySnapshot {
    pub fn from_usage(label: impl Into<String>, usage: ResourceUsage) -> Self {
        Self {
            label: label.into(),
            working_set_bytes: usage.working_set_bytes,
            private_bytes: usage.private_bytes,
            heap_bytes: usage.heap_bytes,
            handle_count: usage.handle_count,
            timestamp: Utc::now(),
        }
    }
}

/// Difference between two snapshots of the same operation
#[derive(Debug, Clone, Serialize)]
pub struct MemoryDelta {
    pub label: String,
    pub working_set_delta: i64,
    pub private_delta: i64,
    pub heap_delta: i64,
    pub handle_delta: i64,
    pub elapsed_ms: i64,
    pub is_abnormal: bool,
}

impl MemoryDelta {
    /// Compute `after - before` and flag growth above `thresholds`
    pub fn between(
        before: &MemorySnapshot,
        after: &MemorySnapshot,
        thresholds: &MemoryThresholds,
    ) -> Self {
        let working_set_delta = signed_diff(after.working_set_bytes, before.working_set_bytes);
        let handle_delta = signed_diff(after.handle_count, before.handle_count);
        let is_abnormal = working_set_delta > clamp_i64(thresholds.working_set_bytes)
            || handle_delta > clamp_i64(thresholds.handle_count);

        Self {
            label: before.label.clone(),
            working_set_delta,
            private_delta: signed_diff(after.private_bytes, before.private_bytes),
            heap_delta: signed_diff(after.heap_bytes, before.heap_bytes),
            handle_delta,
            elapsed_ms: (after.timestamp - before.timestamp).num_milliseconds(),
            is_abnormal,
        }
    }

    /// Short human-readable form used in failure telemetry
    pub fn summary(&self) -> String {
        format!(
            "ws {}, private {}, handles {:+}",
            format_bytes_signed(self.working_set_delta),
            format_bytes_signed(self.private_delta),
            self.handle_delta
        )
    }

    /// Full human-readable form
    pub fn display(&self) -> String {
        format!(
            "[{}] ws: {}, private: {}, heap: {}, handles: {:+}, elapsed: {}ms",
            self.label,
            format_bytes_signed(self.working_set_delta),
            format_bytes_signed(self.private_delta),
            format_bytes_signed(self.heap_delta),
            self.handle_delta,
            self.elapsed_ms
        )
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn signed_diff(after: u64, before: u64) -> i64 {
    if after >= before {
        clamp_i64(after - before)
    } else {
        -clamp_i64(before - after)
    }
}

/// Captures snapshots through a [`ResourceProbe`] and derives deltas
pub struct MemoryMonitor {
    probe: Box<dyn ResourceProbe>,
    thresholds: MemoryThresholds,
}

impl MemoryMonitor {
    /// Monitor the current process with default thresholds
    pub fn new() -> Self {
        Self::with_probe(Box::new(ProcessProbe::new()), MemoryThresholds::default())
    }

    /// Monitor the current process with custom thresholds
    pub fn with_thresholds(thresholds: MemoryThresholds) -> Self {
        Self::with_probe(Box::new(ProcessProbe::new()), thresholds)
    }

    pub fn with_probe(probe: Box<dyn ResourceProbe>, thresholds: MemoryThresholds) -> Self {
        Self { probe, thresholds }
    }

    pub fn thresholds(&self) -> &MemoryThresholds {
        &self.thresholds
    }

    /// Capture a labelled snapshot now
    pub fn capture(&self, label: impl Into<String>) -> MemorySnapshot {
        MemorySnapshot::from_usage(label, self.probe.sample())
    }

    /// Delta between a matched before/after pair
    pub fn delta(&self, before: &MemorySnapshot, after: &MemorySnapshot) -> MemoryDelta {
        MemoryDelta::between(before, after, &self.thresholds)
    }
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format signed bytes as human-readable string
pub fn format_bytes_signed(bytes: i64) -> String {
    let sign = if bytes >= 0 { "+" } else { "-" };
    format!("{}{}", sign, format_bytes(bytes.unsigned_abs()))
}
