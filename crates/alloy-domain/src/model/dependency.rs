//! Dependency descriptors — the smallest atom of the data model.

use serde::{Deserialize, Serialize};

/// Retry policy for a deferred import.
///
/// Parsed from the literal options bag of the deferral wrapper
/// (`Lazy(importer, { retries, backoffMs, factor })`). The attempt index
/// starts at 0; after a failed attempt `i` the runtime sleeps
/// `initial_backoff_ms * factor^i` milliseconds before trying again, up to
/// `attempts_after_first` retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub attempts_after_first: u32,
    /// Delay before the first retry, in milliseconds (0 means immediate)
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay per attempt
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_after_first: 0,
            initial_backoff_ms: 0,
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with a retry budget and default backoff
    pub fn with_retries(attempts_after_first: u32) -> Self {
        Self {
            attempts_after_first,
            ..Default::default()
        }
    }

    /// Set the initial backoff delay
    pub fn with_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    /// Set the backoff multiplier
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Delay to sleep after failed attempt `attempt_index`, in milliseconds.
    pub fn delay_ms(&self, attempt_index: u32) -> f64 {
        self.initial_backoff_ms as f64 * self.factor.powi(attempt_index as i32)
    }
}

/// One dependency argument of a service declaration.
///
/// `expression` is the verbatim source slice so generated code can reproduce
/// the user's intent (retry option bags included) byte for byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    /// Verbatim source text of the dependency argument
    pub expression: String,
    /// Identifier names syntactically referenced inside `expression`,
    /// in first-occurrence order, keywords excluded
    pub referenced_identifiers: Vec<String>,
    /// True iff `expression` is a call to the deferral wrapper
    pub is_deferred: bool,
    /// Retry hints parsed from the deferral wrapper's literal options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl DependencyDescriptor {
    /// Descriptor for a plain (eager) expression
    pub fn eager(expression: impl Into<String>, referenced_identifiers: Vec<String>) -> Self {
        Self {
            expression: expression.into(),
            referenced_identifiers,
            is_deferred: false,
            retry: None,
        }
    }

    /// Descriptor for a deferral-wrapper call
    pub fn deferred(
        expression: impl Into<String>,
        referenced_identifiers: Vec<String>,
        retry: Option<RetryPolicy>,
    ) -> Self {
        Self {
            expression: expression.into(),
            referenced_identifiers,
            is_deferred: true,
            retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delays_grow_geometrically() {
        let policy = RetryPolicy::with_retries(3).with_backoff_ms(10).with_factor(2.0);
        assert_eq!(policy.delay_ms(0), 10.0);
        assert_eq!(policy.delay_ms(1), 20.0);
        assert_eq!(policy.delay_ms(2), 40.0);
    }

    #[test]
    fn default_policy_never_sleeps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts_after_first, 0);
        assert_eq!(policy.delay_ms(0), 0.0);
    }
}
