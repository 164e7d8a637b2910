//! Per-item result collection for batch primitives.

use shared_types::{ContactsError, GroupResult, WriteResult};

/// A per-item status carried back to the caller.
pub trait Outcome {
    fn succeeded(&self) -> bool;

    fn error(&self) -> Option<&ContactsError>;

    /// Id of the contact or group the outcome is about. May be empty when a
    /// create failed before the store assigned one.
    fn subject(&self) -> &str;

    fn with_error(self, err: ContactsError) -> Self;
}

impl Outcome for WriteResult {
    fn succeeded(&self) -> bool {
        self.succeeded
    }

    fn error(&self) -> Option<&ContactsError> {
        self.err.as_ref()
    }

    fn subject(&self) -> &str {
        &self.contact_ref.id
    }

    fn with_error(self, err: ContactsError) -> Self {
        Self {
            err: Some(err),
            ..self
        }
    }
}

impl Outcome for GroupResult {
    fn succeeded(&self) -> bool {
        self.succeeded
    }

    fn error(&self) -> Option<&ContactsError> {
        self.err.as_ref()
    }

    fn subject(&self) -> &str {
        &self.group.id
    }

    fn with_error(self, err: ContactsError) -> Self {
        Self {
            err: Some(err),
            ..self
        }
    }
}

/// Collects one outcome per input item, in input order.
///
/// A failed item is logged and kept; it never stops the batch.
#[derive(Debug)]
pub struct BatchReport<T> {
    operation: &'static str,
    results: Vec<T>,
    failed: usize,
}

impl<T: Outcome> BatchReport<T> {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            results: Vec::new(),
            failed: 0,
        }
    }

    pub fn record(&mut self, mut result: T) {
        if !result.succeeded() {
            if result.error().is_none() {
                result = result.with_error(ContactsError::unknown(format!(
                    "{} failed without an error",
                    self.operation
                )));
            }
            self.failed += 1;
            if let Some(err) = result.error() {
                tracing::warn!(
                    operation = self.operation,
                    subject = result.subject(),
                    error = %err,
                    "Batch item failed"
                );
            }
        }
        self.results.push(result);
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn finish(self) -> Vec<T> {
        tracing::info!(
            operation = self.operation,
            total = self.results.len(),
            failed = self.failed,
            "Batch complete"
        );
        self.results
    }
}
