//! State polling through the UI execution context

use crate::dispatcher::{run_on, UiDispatcher};
use crate::error::BindingError;
use page_render_core::DisplayImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Shortest period `wait_for_image_source` will poll at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A control whose image source can be inspected on its owning thread
pub trait ImageControl: Send + Sync {
    /// Whether the control currently shows an image
    fn has_source(&self) -> Result<bool, BindingError>;
}

/// Reference image control with thread affinity and a disposed state
pub struct ImageView {
    owner: Option<ThreadId>,
    source: Mutex<Option<DisplayImage>>,
    disposed: AtomicBool,
}

impl ImageView {
    /// Control bound to the thread `owner`
    pub fn new(owner: ThreadId) -> Self {
        Self {
            owner: Some(owner),
            source: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Control usable from any thread
    pub fn detached() -> Self {
        Self {
            owner: None,
            source: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn set_source(&self, image: Option<DisplayImage>) -> Result<(), BindingError> {
        self.check_access()?;
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = image;
        Ok(())
    }

    pub fn source(&self) -> Result<Option<DisplayImage>, BindingError> {
        self.check_access()?;
        Ok(self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    /// Release the control; later reads fail with [`BindingError::Disposed`]
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn check_access(&self) -> Result<(), BindingError> {
        if self.is_disposed() {
            return Err(BindingError::Disposed);
        }
        match self.owner {
            Some(owner) if owner != thread::current().id() => Err(BindingError::WrongThread),
            _ => Ok(()),
        }
    }
}

impl ImageControl for ImageView {
    fn has_source(&self) -> Result<bool, BindingError> {
        self.check_access()?;
        Ok(self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some())
    }
}

/// Poll `control` on the UI context every `interval` until it has a source.
///
/// Returns `false` once `timeout` has elapsed, or as soon as a dispatch or
/// a read fails. Never returns an error.
pub async fn wait_for_image_source(
    dispatcher: &dyn UiDispatcher,
    control: Arc<dyn ImageControl>,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let remaining = timeout.saturating_sub(started.elapsed());
        let target = Arc::clone(&control);
        let read = tokio::time::timeout(remaining, run_on(dispatcher, move || target.has_source()));

        match read.await {
            Ok(Ok(Ok(true))) => {
                debug!("Image source visible after {:?}", started.elapsed());
                return true;
            }
            Ok(Ok(Ok(false))) => {}
            Ok(Ok(Err(e))) => {
                debug!("Reading image source failed: {}", e);
                return false;
            }
            Ok(Err(e)) => {
                warn!("UI dispatch failed while polling: {}", e);
                return false;
            }
            Err(_) => {
                warn!("UI context unresponsive, no image source within {:?}", timeout);
                return false;
            }
        }

        if started.elapsed() >= timeout {
            warn!("No image source within {:?}", timeout);
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::UiThread;
    use crate::error::DispatchError;
    use page_render_core::{DisplayHost, HeadlessHost};

    const POLL: Duration = Duration::from_millis(100);

    fn bitmap() -> DisplayImage {
        DisplayImage::Bitmap(HeadlessHost.allocate_bitmap(1, 1).unwrap())
    }

    #[tokio::test]
    async fn test_source_already_set_resolves_on_first_poll() {
        let ui = UiThread::spawn("ui-test").unwrap();
        let view = Arc::new(ImageView::new(ui.thread_id()));
        let setter = view.clone();
        run_on(&ui, move || setter.set_source(Some(bitmap())))
            .await
            .unwrap()
            .unwrap();

        let started = Instant::now();
        assert!(wait_for_image_source(&ui, view, Duration::from_millis(500), POLL).await);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_empty_control_times_out() {
        let ui = UiThread::spawn("ui-test").unwrap();
        let view = Arc::new(ImageView::new(ui.thread_id()));

        let started = Instant::now();
        assert!(!wait_for_image_source(&ui, view, Duration::from_millis(500), POLL).await);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_disposed_control_reads_as_false() {
        let ui = UiThread::spawn("ui-test").unwrap();
        let view = Arc::new(ImageView::new(ui.thread_id()));
        view.dispose();

        let started = Instant::now();
        assert!(!wait_for_image_source(&ui, view, Duration::from_secs(5), POLL).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_interval_polls_at_minimum_period() {
        let ui = UiThread::spawn("ui-test").unwrap();
        let view = Arc::new(ImageView::new(ui.thread_id()));

        let started = Instant::now();
        assert!(!wait_for_image_source(&ui, view, Duration::from_millis(200), Duration::ZERO).await);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_off_thread_access_is_rejected() {
        let ui = UiThread::spawn("ui-test").unwrap();
        let view = ImageView::new(ui.thread_id());
        assert_eq!(view.has_source(), Err(BindingError::WrongThread));
    }

    /// Dispatcher whose UI context is gone
    struct ClosedDispatcher;

    impl UiDispatcher for ClosedDispatcher {
        fn dispatch(&self, _job: crate::dispatcher::UiJob) -> Result<(), DispatchError> {
            Err(DispatchError::Closed)
        }
    }

    #[tokio::test]
    async fn test_dispatch_failure_reads_as_false() {
        let view: Arc<dyn ImageControl> = Arc::new(ImageView::detached());
        assert!(!wait_for_image_source(&ClosedDispatcher, view, Duration::from_secs(5), POLL).await);
    }

    /// Dispatcher that accepts jobs and never runs them
    struct HungDispatcher {
        parked: Mutex<Vec<crate::dispatcher::UiJob>>,
    }

    impl UiDispatcher for HungDispatcher {
        fn dispatch(&self, job: crate::dispatcher::UiJob) -> Result<(), DispatchError> {
            self.parked.lock().unwrap().push(job);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hung_ui_context_is_bounded_by_timeout() {
        let dispatcher = HungDispatcher {
            parked: Mutex::new(Vec::new()),
        };
        let view: Arc<dyn ImageControl> = Arc::new(ImageView::detached());

        let started = Instant::now();
        assert!(!wait_for_image_source(&dispatcher, view, Duration::from_millis(300), POLL).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
