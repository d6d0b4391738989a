//! Error display channel
//!
//! Stage failures are not propagated; each one becomes a single
//! human-readable message pushed to an [`ErrorSink`].

use std::cell::RefCell;

/// Receives one message per absorbed stage failure
pub trait ErrorSink {
    fn report_error(&self, message: &str);
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report_error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Sink that keeps messages for display after the run
#[derive(Debug, Default)]
pub struct CollectedErrors {
    messages: RefCell<Vec<String>>,
}

impl CollectedErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages.into_inner()
    }
}

impl ErrorSink for CollectedErrors {
    fn report_error(&self, message: &str) {
        tracing::warn!("{}", message);
        self.messages.borrow_mut().push(message.to_string());
    }
}
