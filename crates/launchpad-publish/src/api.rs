use std::path::Path;

use serde::Serialize;

use crate::error::ApiError;

/// Repository link registered alongside a published artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoLink {
    /// Repository URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Short description.
    pub description: String,
    /// Tags attached to the link.
    pub tags: Vec<String>,
}

/// Remote capabilities the publish pipeline relies on.
///
/// Each method is one network call. Identifiers are those assigned by the
/// remote service.
pub trait PublishApi {
    /// Obtains credentials for the calls that follow.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the service rejects the credentials.
    fn authenticate(&mut self) -> Result<(), ApiError>;

    /// Resolves a board slug to its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the board list cannot be fetched or is empty.
    fn resolve_board(&self, slug: &str) -> Result<u64, ApiError>;

    /// Creates a thread on a board and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any transport or service failure.
    fn create_thread(&self, board_id: u64, title: &str) -> Result<u64, ApiError>;

    /// Posts Markdown content to a thread and returns the post identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any transport or service failure.
    fn create_post(&self, thread_id: u64, content_md: &str) -> Result<u64, ApiError>;

    /// Uploads an archive and returns the artifact identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the archive cannot be read or uploaded.
    fn upload_artifact(&self, archive: &Path) -> Result<u64, ApiError>;

    /// Attaches an uploaded artifact to a thread.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any transport or service failure.
    fn attach_artifact(&self, artifact_id: u64, thread_id: u64) -> Result<(), ApiError>;

    /// Registers a repository link.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any transport or service failure.
    fn add_repo_link(&self, link: &RepoLink) -> Result<(), ApiError>;
}
