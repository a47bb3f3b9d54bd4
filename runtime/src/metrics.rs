//! Prometheus metrics for the request pipeline.
//!
//! The pipeline always records through the [`metrics`] facade. Nothing is
//! collected until a recorder is installed, for example with
//! [`MetricsExporter::install`].
//!
//! | Metric                                 | Kind      |
//! |----------------------------------------|-----------|
//! | `interpose.requests.total`             | counter   |
//! | `interpose.requests.mocked`            | counter   |
//! | `interpose.requests.bypassed`          | counter   |
//! | `interpose.requests.unhandled`         | counter   |
//! | `interpose.resolver.exceptions`        | counter   |
//! | `interpose.events.published`           | counter   |
//! | `interpose.listeners.panicked`         | counter   |
//! | `interpose.resolver.duration_seconds`  | histogram |
//!
//! # Example
//!
//! ```rust,no_run
//! use interpose_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders the scrape payload.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder that is already installed (common in tests) is logged and
    /// tolerated.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            },
        }
    }

    /// Current metrics in Prometheus text format, once installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

/// Describe every pipeline metric to the installed recorder.
pub fn register_metrics() {
    describe_counter!(
        "interpose.requests.total",
        "Requests that entered the pipeline while interception was on"
    );
    describe_counter!(
        "interpose.requests.mocked",
        "Requests answered with a mocked response"
    );
    describe_counter!(
        "interpose.requests.bypassed",
        "Requests forwarded to the real network"
    );
    describe_counter!(
        "interpose.requests.unhandled",
        "Requests no handler matched"
    );
    describe_counter!(
        "interpose.resolver.exceptions",
        "Resolver errors and panics"
    );
    describe_counter!(
        "interpose.events.published",
        "Life-cycle events published, labelled by event name"
    );
    describe_counter!(
        "interpose.listeners.panicked",
        "Event listeners that panicked during dispatch"
    );
    describe_histogram!(
        "interpose.resolver.duration_seconds",
        metrics::Unit::Seconds,
        "Time spent in resolvers"
    );
}
