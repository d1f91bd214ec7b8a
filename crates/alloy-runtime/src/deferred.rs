//! Deferred imports: first-class dependency nodes with retry/backoff.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_domain::{Error, Result, RetryPolicy};
use futures::future::BoxFuture;
use tracing::debug;

use crate::class::ServiceCtor;

/// What a deferred importer resolved to.
///
/// Mirrors the two accepted module shapes — the constructor itself, or a
/// namespace object whose `default` field is the constructor — plus a
/// catch-all for anything else (which fails resolution as `not-a-class`).
pub enum ModuleExport {
    /// The constructor directly
    Ctor(ServiceCtor),
    /// A namespace object; only its `default` field is considered
    Namespace {
        /// The namespace's default export, if it is a constructor
        default: Option<ServiceCtor>,
    },
    /// A non-constructor value, described by its runtime-type tag
    Value(String),
}

impl ModuleExport {
    fn into_ctor(self) -> std::result::Result<ServiceCtor, String> {
        match self {
            ModuleExport::Ctor(ctor) => Ok(ctor),
            ModuleExport::Namespace { default: Some(ctor) } => Ok(ctor),
            ModuleExport::Namespace { default: None } => Err("module namespace".to_string()),
            ModuleExport::Value(tag) => Err(tag),
        }
    }
}

/// Failure raised by a deferred importer attempt.
pub type ImportFailure = Box<dyn std::error::Error + Send + Sync>;

type ImporterFn =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<ModuleExport, ImportFailure>> + Send + Sync>;

/// A deferred import: an importer plus the retry policy governing it.
///
/// The runtime treats this as one of the three dependency classes
/// (deferred, token, constructor). Execution retries with exponential
/// backoff: after failed attempt `i` it sleeps
/// `initial_backoff_ms * factor^i` milliseconds, up to
/// `attempts_after_first` retries, then fails with
/// `deferred-import-failed` wrapping the last cause.
#[derive(Clone)]
pub struct DeferredImport {
    importer: ImporterFn,
    retry: RetryPolicy,
}

/// Build a deferred import from an async importer closure — the runtime
/// counterpart of the `Lazy(() => import(...))` source wrapper.
pub fn lazy<F, Fut>(importer: F) -> DeferredImport
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<ModuleExport, ImportFailure>> + Send + 'static,
{
    DeferredImport {
        importer: Arc::new(move || Box::pin(importer())),
        retry: RetryPolicy::default(),
    }
}

impl DeferredImport {
    /// Attach a retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The governing retry policy
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Stable identity of the importer closure; clones of one deferred
    /// descriptor share it. Containers key their singleton-fetch memo on
    /// this.
    pub fn importer_identity(&self) -> usize {
        Arc::as_ptr(&self.importer) as *const () as usize
    }

    /// Same import target, different importer — used by the test overlay to
    /// substitute importers while keeping the retry policy.
    pub fn with_importer<F, Fut>(&self, importer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<ModuleExport, ImportFailure>> + Send + 'static,
    {
        Self {
            importer: Arc::new(move || Box::pin(importer())),
            retry: self.retry.clone(),
        }
    }

    /// Execute the importer under the retry policy and demand a
    /// constructor.
    ///
    /// `path` is the named resolution path for error context.
    pub async fn fetch(&self, path: &str) -> Result<ServiceCtor> {
        let mut attempt_index: u32 = 0;
        loop {
            match (self.importer)().await {
                Ok(export) => {
                    return export
                        .into_ctor()
                        .map_err(|resolved| Error::not_a_class(resolved, path));
                }
                Err(cause) => {
                    if attempt_index >= self.retry.attempts_after_first {
                        return Err(Error::deferred_import_failed(
                            attempt_index + 1,
                            path,
                            cause,
                        ));
                    }
                    let delay_ms = self.retry.delay_ms(attempt_index);
                    debug!(
                        target: "alloy::runtime",
                        attempt = attempt_index,
                        delay_ms,
                        "deferred import failed, backing off"
                    );
                    if delay_ms > 0.0 {
                        tokio::time::sleep(Duration::from_secs_f64(delay_ms / 1000.0)).await;
                    }
                    attempt_index += 1;
                }
            }
        }
    }
}

impl fmt::Debug for DeferredImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredImport")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
