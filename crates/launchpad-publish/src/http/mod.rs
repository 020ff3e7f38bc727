//! Blocking HTTP implementation of [`PublishApi`] for the CoEvo service.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::PUBLISH_TARGET;
use crate::api::{PublishApi, RepoLink};
use crate::error::ApiError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_ERROR_BODY: usize = 512;

/// How the client authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A bearer token issued earlier.
    Token(String),
    /// A handle and password exchanged for a token at login.
    Login {
        /// Account handle.
        handle: String,
        /// Account password.
        password: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Login { handle, .. } => f
                .debug_struct("Login")
                .field("handle", handle)
                .finish_non_exhaustive(),
        }
    }
}

impl Credentials {
    /// Picks credentials from optional configuration values. A non-blank
    /// token wins over a handle/password pair.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingCredentials`] when neither form is complete.
    pub fn from_parts(
        token: Option<&str>,
        handle: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, ApiError> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }
        if let Some(token_value) = present(token) {
            return Ok(Self::Token(token_value.to_owned()));
        }
        match (present(handle), password.filter(|v| !v.is_empty())) {
            (Some(handle_value), Some(password_value)) => Ok(Self::Login {
                handle: handle_value.to_owned(),
                password: password_value.to_owned(),
            }),
            _ => Err(ApiError::MissingCredentials),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Board {
    id: u64,
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: u64,
}

/// CoEvo client over blocking `reqwest`.
#[derive(Debug)]
pub struct HttpPublishApi {
    client: Client,
    base_url: String,
    credentials: Credentials,
    token: Option<String>,
}

impl HttpPublishApi {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] when the URL is not `http` or
    /// `https`, or [`ApiError::Transport`] when the client cannot be built.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url.trim()).map_err(|error| ApiError::InvalidBaseUrl {
            url: base_url.to_owned(),
            message: error.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_owned(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: String::from("client"),
                source,
            })?;
        Ok(Self::with_client(&parsed, credentials, client))
    }

    pub(crate) fn with_client(base_url: &Url, credentials: Credentials, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
            credentials,
            token: None,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    fn authorised(&self, builder: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::NotAuthenticated)?;
        Ok(builder.bearer_auth(token))
    }

    fn send<T: DeserializeOwned>(endpoint: &str, builder: RequestBuilder) -> Result<T, ApiError> {
        debug!(target: PUBLISH_TARGET, endpoint, "sending request");
        let response = builder.send().map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_owned(),
            source,
        })?;
        let checked = check_status(endpoint, response)?;
        checked.json::<T>().map_err(|error| ApiError::UnexpectedResponse {
            endpoint: endpoint.to_owned(),
            message: error.to_string(),
        })
    }

    fn login(&self, handle: &str, password: &str) -> Result<String, ApiError> {
        let endpoint = "/api/auth/login";
        let builder = self
            .client
            .post(self.url(endpoint))
            .json(&json!({ "handle": handle, "password": password }));
        let body: LoginResponse = Self::send(endpoint, builder)?;
        body.access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::UnexpectedResponse {
                endpoint: endpoint.to_owned(),
                message: String::from("login succeeded but no access_token was returned"),
            })
    }
}

fn check_status(endpoint: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut = cut.saturating_sub(1);
        }
        body.truncate(cut);
    }
    Err(ApiError::Status {
        endpoint: endpoint.to_owned(),
        status: status.as_u16(),
        body,
    })
}

impl PublishApi for HttpPublishApi {
    fn authenticate(&mut self) -> Result<(), ApiError> {
        let token = match &self.credentials {
            Credentials::Token(token) => token.clone(),
            Credentials::Login { handle, password } => self.login(handle, password)?,
        };
        self.token = Some(token);
        Ok(())
    }

    fn resolve_board(&self, slug: &str) -> Result<u64, ApiError> {
        let endpoint = "/api/boards";
        let builder = self.authorised(self.client.get(self.url(endpoint)))?;
        let boards: Vec<Board> = Self::send(endpoint, builder)?;
        if let Some(board) = boards.iter().find(|b| b.slug.as_deref() == Some(slug)) {
            return Ok(board.id);
        }
        let first = boards.first().ok_or(ApiError::NoBoards)?;
        debug!(target: PUBLISH_TARGET, slug, board_id = first.id, "board slug not found; using first board");
        Ok(first.id)
    }

    fn create_thread(&self, board_id: u64, title: &str) -> Result<u64, ApiError> {
        let endpoint = format!("/api/boards/{board_id}/threads");
        let builder = self.authorised(
            self.client
                .post(self.url(&endpoint))
                .json(&json!({ "title": title })),
        )?;
        let created: Created = Self::send(&endpoint, builder)?;
        Ok(created.id)
    }

    fn create_post(&self, thread_id: u64, content_md: &str) -> Result<u64, ApiError> {
        let endpoint = format!("/api/threads/{thread_id}/posts");
        let builder = self.authorised(
            self.client
                .post(self.url(&endpoint))
                .json(&json!({ "content_md": content_md })),
        )?;
        let created: Created = Self::send(&endpoint, builder)?;
        Ok(created.id)
    }

    fn upload_artifact(&self, archive: &Path) -> Result<u64, ApiError> {
        let endpoint = "/api/artifacts/upload";
        let part = multipart::Part::file(archive)
            .map_err(|source| ApiError::Archive {
                path: archive.to_path_buf(),
                source,
            })?
            .mime_str("application/gzip")
            .map_err(|source| ApiError::Transport {
                endpoint: endpoint.to_owned(),
                source,
            })?;
        let form = multipart::Form::new().part("file", part);
        let builder = self.authorised(
            self.client
                .post(self.url(endpoint))
                .timeout(UPLOAD_TIMEOUT)
                .multipart(form),
        )?;
        let created: Created = Self::send(endpoint, builder)?;
        Ok(created.id)
    }

    fn attach_artifact(&self, artifact_id: u64, thread_id: u64) -> Result<(), ApiError> {
        let endpoint = format!("/api/artifacts/{artifact_id}/attach/thread/{thread_id}");
        let builder = self.authorised(self.client.post(self.url(&endpoint)))?;
        let _: serde_json::Value = Self::send(&endpoint, builder)?;
        Ok(())
    }

    fn add_repo_link(&self, link: &RepoLink) -> Result<(), ApiError> {
        let endpoint = "/api/repos";
        let builder = self.authorised(self.client.post(self.url(endpoint)).json(link))?;
        let _: serde_json::Value = Self::send(endpoint, builder)?;
        Ok(())
    }
}
