//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use launchpad_artifact::ArtifactError;
use launchpad_config::StatePathsError;
use launchpad_publish::{ApiError, PublishFailure};
use launchpad_registry::RegistryError;
use launchpad_runtime::LifecycleError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("no registry at '{}'; run `launchpad init` to create one", path.display())]
    RegistryMissing { path: PathBuf },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    StatePaths(#[from] StatePathsError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("{app}: {source}")]
    Artifact {
        app: String,
        #[source]
        source: ArtifactError,
    },
    #[error("{app}: checkout not found at '{}'", path.display())]
    MissingCheckout { app: String, path: PathBuf },
    #[error("{app}: verification failed ({missing} missing, {mismatched} mismatched, {extra} extra)")]
    VerificationFailed {
        app: String,
        missing: usize,
        mismatched: usize,
        extra: usize,
    },
    #[error("{app}: is not running")]
    NotRunning { app: String },
    #[error("{app}: failed to open '{url}': {source}")]
    Open {
        app: String,
        url: String,
        #[source]
        source: io::Error,
    },
    #[error("publishing is disabled; set publish_enabled (LAUNCHPAD_PUBLISH_ENABLED=true) to enable it")]
    PublishDisabled,
    #[error("{app}: {source}")]
    PublishSetup {
        app: String,
        #[source]
        source: ApiError,
    },
    #[error("{app}: {source} (completed: {completed}; not run: {pending})")]
    Publish {
        app: String,
        completed: String,
        pending: String,
        #[source]
        source: Box<PublishFailure>,
    },
    #[error("failed to serialise output: {0}")]
    Serialise(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    /// One or more applications in a batch failed; each was already reported.
    #[error("{failed} of {total} applications failed")]
    BatchFailed { failed: usize, total: usize },
}

impl AppError {
    pub(crate) fn publish(app: &str, failure: PublishFailure) -> Self {
        Self::Publish {
            app: app.to_owned(),
            completed: failure.completed_summary(),
            pending: failure.pending_summary(),
            source: Box::new(failure),
        }
    }
}
