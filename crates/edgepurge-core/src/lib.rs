//! Fan-out purging of derived resources against an edge cache.
//!
//! Given a batch of invalidations, each naming one canonical resource
//! (`public://photos/cat.png`), this crate:
//!
//! - expands every invalidation into the derived artifacts that currently
//!   exist for it (image styles, resized variants, ...)
//! - sends one purge request per derived artifact to the edge cache, with a
//!   fixed ceiling on requests in flight
//! - settles each invalidation as SUCCEEDED or FAILED once all of its purges
//!   have completed
//!
//! # Quick Start
//!
//! ```no_run
//! use edgepurge_core::{Config, ImagePurger, Invalidation};
//!
//! # async fn example() -> edgepurge_core::PurgeResult<()> {
//! let config = Config::from_file("edgepurge.yaml".as_ref())?;
//! let purger = ImagePurger::from_config(&config)?;
//!
//! let mut batch = vec![Invalidation::new(1, "public://photos/cat.png")?];
//! let summary = purger.invalidate(&mut batch).await;
//! println!("{} failed", summary.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `EDGEPURGE_ENDPOINT` | Purge endpoint (default: `http://127.0.0.1:6081`) |
//! | `EDGEPURGE_ORIGIN` | Scheme and host derived URLs are generated under |
//! | `EDGEPURGE_METHOD` | Request method (default: `BAN`) |
//! | `EDGEPURGE_CONCURRENCY` | Requests in flight (default: 10) |
//! | `EDGEPURGE_TIMEOUT` | Request timeout in seconds (default: 1.0) |

pub mod config;
pub mod derivative;
pub mod dispatch;
pub mod error;
pub mod invalidation;
pub mod purger;
pub mod queuer;
pub mod report;
pub mod request;
pub mod tracker;
pub mod transport;

// Re-export main types
pub use config::{
    Config, DerivativeConfig, HeaderSetting, PurgerSettings, QueuerConfig, StorageConfig,
};
pub use derivative::{
    DerivativeRegistry, DerivedLocator, DerivedResourceDefinition, Expander, ImageStyle,
    LocalStorage,
};
pub use dispatch::{Dispatcher, DEFAULT_CONCURRENCY};
pub use error::{PurgeError, PurgeResult};
pub use invalidation::{Invalidation, InvalidationId, InvalidationState};
pub use purger::{BatchSummary, ImagePurger, PurgeOutcome};
pub use queuer::{EntityRecord, ImageQueuer, MemoryQueue, PurgeQueue};
pub use report::{FailureDiagnostic, FailureReporter, NullReporter, TracingReporter};
pub use request::{PurgeRequest, PurgeRequestBuilder, RequestOptions};
pub use tracker::{Counters, OutcomeTracker};
pub use transport::{HttpTransport, PurgeResponse, PurgeTransport, USER_AGENT_VALUE};
