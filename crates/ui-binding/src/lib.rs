//! Page Render Binding - verifying that rendered pages became visible
//!
//! After a successful render the image is handed to a data-bound view.
//! This crate confirms the update landed, either by racing a property
//! change notification against a timeout or by polling the control's
//! state on its UI thread.

pub mod dispatcher;
pub mod error;
pub mod notify;
pub mod poll;
pub mod verifier;

pub use dispatcher::{run_on, UiDispatcher, UiJob, UiThread};
pub use error::{BindingError, DispatchError};
pub use notify::{
    wait_for_property_change, NotifyPropertyChanged, PropertyHandler, PropertyNotifier,
    SubscriptionId,
};
pub use poll::{wait_for_image_source, ImageControl, ImageView, MIN_POLL_INTERVAL};
pub use verifier::BindingVerifier;
