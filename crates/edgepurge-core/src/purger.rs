//! Batch entry point: expand, dispatch and settle a batch of invalidations.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{Config, PurgerSettings};
use crate::derivative::{DerivativeRegistry, Expander};
use crate::dispatch::Dispatcher;
use crate::error::{PurgeError, PurgeResult};
use crate::invalidation::{Invalidation, InvalidationState};
use crate::report::{FailureDiagnostic, FailureReporter, TracingReporter};
use crate::request::{PurgeRequest, PurgeRequestBuilder};
use crate::tracker::OutcomeTracker;
use crate::transport::{HttpTransport, PurgeTransport};

/// Result of one derived-resource purge, owned by the invalidation at
/// position `owner` of the submitted batch.
#[derive(Debug, Clone)]
pub struct PurgeOutcome {
    pub owner: usize,
    pub request: PurgeRequest,
    pub error: Option<PurgeError>,
}

impl PurgeOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Counts for one finished batch.
///
/// `succeeded` and `failed` cover only the invalidations processed by this
/// call; ones that were already settled are counted in `skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub invalidations: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub requests: usize,
    pub failed_requests: usize,
}

/// Purges every existing derivative of each invalidated resource.
pub struct ImagePurger {
    expander: Expander,
    builder: PurgeRequestBuilder,
    dispatcher: Dispatcher,
    transport: Arc<dyn PurgeTransport>,
    reporter: Arc<dyn FailureReporter>,
}

impl ImagePurger {
    pub fn new(
        settings: &PurgerSettings,
        origin: Option<String>,
        registry: DerivativeRegistry,
        transport: Arc<dyn PurgeTransport>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            expander: Expander::new(registry),
            builder: PurgeRequestBuilder::new(settings, origin),
            dispatcher: Dispatcher::new(settings.effective_concurrency()),
            transport,
            reporter,
        }
    }

    /// Wire an HTTP transport, local storage checks and the tracing reporter.
    pub fn from_config(config: &Config) -> PurgeResult<Self> {
        config.validate()?;
        let registry = DerivativeRegistry::from_config(&config.derivatives, &config.storage)?;
        let transport = HttpTransport::new(&config.purger)?;

        Ok(Self::new(
            &config.purger,
            config.effective_origin(),
            registry,
            Arc::new(transport),
            Arc::new(TracingReporter),
        ))
    }

    pub fn expander(&self) -> &Expander {
        &self.expander
    }

    pub fn concurrency(&self) -> usize {
        self.dispatcher.concurrency()
    }

    /// Requests that would be sent for `invalidation`, without sending them.
    pub fn plan(&self, invalidation: &Invalidation) -> Vec<PurgeRequest> {
        self.expander
            .expand(invalidation.expression())
            .iter()
            .map(|locator| self.builder.build(&locator.url, invalidation))
            .collect()
    }

    /// Purge all derivatives of every invalidation in the batch.
    ///
    /// Resolves once every purge request has completed. Individual failures
    /// never surface as errors: they leave the owning invalidation FAILED and
    /// are handed to the failure reporter. Invalidations that are already
    /// SUCCEEDED or FAILED are skipped and keep their state.
    pub async fn invalidate(&self, invalidations: &mut [Invalidation]) -> BatchSummary {
        if invalidations.is_empty() {
            return BatchSummary::default();
        }

        let tracker = OutcomeTracker::new(invalidations.len());
        let skipped = tracker.begin(invalidations);

        // Requests are built from a snapshot; the batch itself is only
        // written back once the tracker has settled every entry.
        let snapshot: Vec<Invalidation> = invalidations.to_vec();
        let transport = &*self.transport;
        let tracker_ref = &tracker;

        let tasks = snapshot.iter().enumerate().flat_map(|(owner, invalidation)| {
            let locators = if tracker_ref.is_skipped(owner) {
                warn!(
                    id = %invalidation.id(),
                    state = %invalidation.state(),
                    expression = invalidation.expression(),
                    "invalidation already settled; not purging again"
                );
                Vec::new()
            } else {
                let locators = self.expander.expand(invalidation.expression());
                debug!(
                    id = %invalidation.id(),
                    expression = invalidation.expression(),
                    derived = locators.len(),
                    "expanded invalidation"
                );
                if let Some(state) = tracker_ref.expect(owner, locators.len()) {
                    debug!(id = %invalidation.id(), %state, "invalidation settled during expansion");
                }
                locators
            };

            locators.into_iter().map(move |locator| {
                let request = self.builder.build(&locator.url, invalidation);
                move || async move {
                    let error = transport.send(&request).await.err();
                    PurgeOutcome {
                        owner,
                        request,
                        error,
                    }
                }
            })
        });

        let mut failed_requests = 0usize;
        let requests = self
            .dispatcher
            .run(tasks, |outcome| {
                if let Some(error) = &outcome.error {
                    failed_requests += 1;
                    self.report(&outcome.request, error);
                }
                tracker.record(outcome.owner, outcome.is_success());
            })
            .await;

        tracker.finish(invalidations);

        let mut summary = BatchSummary {
            invalidations: invalidations.len(),
            skipped,
            requests,
            failed_requests,
            ..BatchSummary::default()
        };
        for owner in 0..invalidations.len() {
            if tracker.is_skipped(owner) {
                continue;
            }
            match tracker.state(owner) {
                Some(InvalidationState::Succeeded) => summary.succeeded += 1,
                _ => summary.failed += 1,
            }
        }
        info!(
            invalidations = summary.invalidations,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            requests = summary.requests,
            failed_requests = summary.failed_requests,
            "purge batch finished"
        );
        summary
    }

    fn report(&self, request: &PurgeRequest, error: &PurgeError) {
        let diagnostic = FailureDiagnostic::new(request, error);
        let reporter = &*self.reporter;
        if catch_unwind(AssertUnwindSafe(|| reporter.report(&diagnostic))).is_err() {
            error!(
                uri = %diagnostic.target,
                method = %diagnostic.method,
                error = %diagnostic.message,
                "failure reporter panicked; diagnostic dropped"
            );
        }
    }
}

impl std::fmt::Debug for ImagePurger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePurger")
            .field("expander", &self.expander)
            .field("builder", &self.builder)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
