//! Publishing packed artifacts to a CoEvo board.
//!
//! The pipeline is a fixed sequence of calls on a [`PublishApi`]. It stops at
//! the first failing step and reports, through [`PublishFailure`], which step
//! failed, which side effects already exist and which steps never ran. Nothing
//! is rolled back.

mod api;
mod error;
mod http;
mod pipeline;

pub use self::api::{PublishApi, RepoLink};
pub use self::error::ApiError;
pub use self::http::{Credentials, HttpPublishApi};
pub use self::pipeline::{
    PublishFailure, PublishOutcome, PublishProgress, PublishRequest, PublishStep, plan, publish,
};

const PUBLISH_TARGET: &str = "launchpad_publish";
