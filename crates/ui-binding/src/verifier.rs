//! Confirms that a rendered image actually reached the UI

use crate::dispatcher::UiDispatcher;
use crate::notify::{wait_for_property_change, NotifyPropertyChanged};
use crate::poll::{wait_for_image_source, ImageControl, MIN_POLL_INTERVAL};
use page_render_core::config::DEFAULT_POLL_INTERVAL_MS;
use page_render_core::RenderConfig;
use std::sync::Arc;
use std::time::Duration;

/// Timeout-bounded, non-failing checks that a binding update became visible.
///
/// A `false` result is advisory: callers typically force a refresh.
#[derive(Clone)]
pub struct BindingVerifier {
    dispatcher: Arc<dyn UiDispatcher>,
    poll_interval: Duration,
}

impl BindingVerifier {
    pub fn new(dispatcher: Arc<dyn UiDispatcher>) -> Self {
        Self::with_poll_interval(dispatcher, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it
    pub fn with_poll_interval(dispatcher: Arc<dyn UiDispatcher>, poll_interval: Duration) -> Self {
        Self {
            dispatcher,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn from_config(dispatcher: Arc<dyn UiDispatcher>, config: &RenderConfig) -> Self {
        Self::with_poll_interval(dispatcher, config.poll_interval())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Resolve `true` when `source` announces a change of `property` within `timeout`
    pub async fn property_changed(
        &self,
        source: &dyn NotifyPropertyChanged,
        property: &str,
        timeout: Duration,
    ) -> bool {
        wait_for_property_change(source, property, timeout).await
    }

    /// Resolve `true` when `control` shows an image within `timeout`
    pub async fn image_visible(&self, control: Arc<dyn ImageControl>, timeout: Duration) -> bool {
        wait_for_image_source(self.dispatcher.as_ref(), control, timeout, self.poll_interval).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::UiThread;
    use crate::poll::ImageView;
    use std::time::Instant;

    #[tokio::test]
    async fn test_zero_poll_interval_resolves_false_instead_of_panicking() {
        let ui = Arc::new(UiThread::spawn("ui-test").unwrap());
        let view = Arc::new(ImageView::new(ui.thread_id()));
        let verifier = BindingVerifier::with_poll_interval(ui.clone(), Duration::ZERO);
        assert_eq!(verifier.poll_interval(), MIN_POLL_INTERVAL);

        let started = Instant::now();
        assert!(!verifier.image_visible(view, Duration::from_millis(200)).await);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
