//! Sequential publish pipeline.

use std::path::PathBuf;

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use thiserror::Error;
use tracing::{info, warn};

use crate::PUBLISH_TARGET;
use crate::api::{PublishApi, RepoLink};
use crate::error::ApiError;

/// One remote call of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PublishStep {
    /// Log in or adopt a configured token.
    Authenticate,
    /// Look up the target board.
    ResolveBoard,
    /// Open a thread for the artifact.
    CreateThread,
    /// Post the Markdown summary.
    PostSummary,
    /// Upload the archive.
    UploadArchive,
    /// Attach the uploaded artifact to the thread.
    AttachArtifact,
    /// Register the source repository link.
    RegisterRepository,
}

/// What to publish and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Packed archive to upload.
    pub archive: PathBuf,
    /// Thread title.
    pub title: String,
    /// Board slug; the first board is used when no board matches.
    pub board: String,
    /// Markdown summary; no post is made when blank.
    pub summary: String,
    /// Optional repository link.
    pub repo: Option<RepoLink>,
}

/// Identifiers produced by the steps that have run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishProgress {
    /// Steps that completed, in order.
    pub completed: Vec<PublishStep>,
    /// Resolved board.
    pub board_id: Option<u64>,
    /// Created thread.
    pub thread_id: Option<u64>,
    /// Summary post.
    pub post_id: Option<u64>,
    /// Uploaded artifact.
    pub artifact_id: Option<u64>,
}

/// Result of a complete publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    /// Board the thread was created on.
    pub board_id: u64,
    /// Created thread.
    pub thread_id: u64,
    /// Uploaded artifact.
    pub artifact_id: u64,
    /// Summary post, when one was made.
    pub post_id: Option<u64>,
    /// Whether a repository link was registered.
    pub repo_registered: bool,
}

/// A step failed; everything before it took effect and nothing after it ran.
#[derive(Debug, Error)]
#[error("publish failed at step '{step}': {source}")]
pub struct PublishFailure {
    /// Step that failed.
    pub step: PublishStep,
    /// Side effects already produced.
    pub progress: PublishProgress,
    /// Steps that were never attempted.
    pub pending: Vec<PublishStep>,
    /// Underlying error.
    #[source]
    pub source: ApiError,
}

impl PublishFailure {
    /// Comma-separated names of the completed steps, or `none`.
    #[must_use]
    pub fn completed_summary(&self) -> String {
        join_steps(&self.progress.completed)
    }

    /// Comma-separated names of the steps never attempted, or `none`.
    #[must_use]
    pub fn pending_summary(&self) -> String {
        join_steps(&self.pending)
    }
}

fn join_steps(steps: &[PublishStep]) -> String {
    if steps.is_empty() {
        return String::from("none");
    }
    steps
        .iter()
        .map(|step| <&'static str>::from(*step))
        .collect::<Vec<_>>()
        .join(", ")
}

fn missing_id(what: &str) -> ApiError {
    ApiError::UnexpectedResponse {
        endpoint: String::from("pipeline"),
        message: format!("no {what} identifier recorded"),
    }
}

/// Steps that `request` will run, in order.
#[must_use]
pub fn plan(request: &PublishRequest) -> Vec<PublishStep> {
    let mut steps = vec![
        PublishStep::Authenticate,
        PublishStep::ResolveBoard,
        PublishStep::CreateThread,
    ];
    if !request.summary.trim().is_empty() {
        steps.push(PublishStep::PostSummary);
    }
    steps.push(PublishStep::UploadArchive);
    steps.push(PublishStep::AttachArtifact);
    if request.repo.is_some() {
        steps.push(PublishStep::RegisterRepository);
    }
    steps
}

/// Runs the publish pipeline against `api`.
///
/// # Errors
///
/// Returns [`PublishFailure`] naming the failed step, the identifiers
/// already created and the steps left unrun.
pub fn publish<A>(api: &mut A, request: &PublishRequest) -> Result<PublishOutcome, PublishFailure>
where
    A: PublishApi + ?Sized,
{
    let steps = plan(request);
    let mut progress = PublishProgress::default();

    for (index, step) in steps.iter().copied().enumerate() {
        if let Err(source) = run_step(api, request, step, &mut progress) {
            let pending = steps.get(index + 1..).unwrap_or_default().to_vec();
            warn!(
                target: PUBLISH_TARGET,
                step = %step,
                thread_id = ?progress.thread_id,
                artifact_id = ?progress.artifact_id,
                error = %source,
                "publish step failed"
            );
            return Err(PublishFailure {
                step,
                progress,
                pending,
                source,
            });
        }
        progress.completed.push(step);
        info!(target: PUBLISH_TARGET, step = %step, "publish step completed");
    }

    match (progress.board_id, progress.thread_id, progress.artifact_id) {
        (Some(board_id), Some(thread_id), Some(artifact_id)) => Ok(PublishOutcome {
            board_id,
            thread_id,
            artifact_id,
            post_id: progress.post_id,
            repo_registered: progress.completed.contains(&PublishStep::RegisterRepository),
        }),
        _ => Err(PublishFailure {
            step: PublishStep::AttachArtifact,
            progress,
            pending: Vec::new(),
            source: missing_id("thread or artifact"),
        }),
    }
}

fn run_step<A>(
    api: &mut A,
    request: &PublishRequest,
    step: PublishStep,
    progress: &mut PublishProgress,
) -> Result<(), ApiError>
where
    A: PublishApi + ?Sized,
{
    match step {
        PublishStep::Authenticate => api.authenticate(),
        PublishStep::ResolveBoard => {
            progress.board_id = Some(api.resolve_board(&request.board)?);
            Ok(())
        }
        PublishStep::CreateThread => {
            let board_id = progress.board_id.ok_or_else(|| missing_id("board"))?;
            progress.thread_id = Some(api.create_thread(board_id, &request.title)?);
            Ok(())
        }
        PublishStep::PostSummary => {
            let thread_id = progress.thread_id.ok_or_else(|| missing_id("thread"))?;
            progress.post_id = Some(api.create_post(thread_id, &request.summary)?);
            Ok(())
        }
        PublishStep::UploadArchive => {
            progress.artifact_id = Some(api.upload_artifact(&request.archive)?);
            Ok(())
        }
        PublishStep::AttachArtifact => {
            let (Some(artifact_id), Some(thread_id)) = (progress.artifact_id, progress.thread_id)
            else {
                return Err(missing_id("artifact or thread"));
            };
            api.attach_artifact(artifact_id, thread_id)
        }
        PublishStep::RegisterRepository => match &request.repo {
            Some(link) => api.add_repo_link(link),
            None => Ok(()),
        },
    }
}
