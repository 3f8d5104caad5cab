//! Error types for UI binding verification

use thiserror::Error;

/// Failure to run a callback on the UI execution context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("UI dispatcher has shut down")]
    Closed,

    #[error("Dispatched callback panicked")]
    Panicked,

    #[error("Dispatched callback was dropped before completing")]
    Dropped,
}

/// Failure to read state from a UI control
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Control has been disposed")]
    Disposed,

    #[error("Control accessed from a thread other than its owner")]
    WrongThread,

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}
