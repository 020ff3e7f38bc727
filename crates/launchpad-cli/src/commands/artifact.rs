//! Artifact commands: pack, verify and publish.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use launchpad_artifact::{
    ArtifactError, Manifest, PackReport, VerifyPolicy, load_manifest, pack_to_path,
};
use launchpad_publish::{
    Credentials, HttpPublishApi, PublishApi, PublishRequest, RepoLink, publish as run_pipeline,
};
use launchpad_registry::AppEntry;
use serde_json::json;

use super::Workspace;
use crate::cli::PublishArgs;
use crate::errors::AppError;
use crate::output::outcome_marker;

fn artifact_error(app: &str) -> impl Fn(ArtifactError) -> AppError + '_ {
    move |source| AppError::Artifact {
        app: app.to_owned(),
        source,
    }
}

fn existing_checkout(workspace: &Workspace, entry: &AppEntry) -> Result<PathBuf, AppError> {
    let checkout = entry.checkout_dir(workspace.apps_root());
    if checkout.is_dir() {
        Ok(checkout)
    } else {
        Err(AppError::MissingCheckout {
            app: entry.name().to_owned(),
            path: checkout,
        })
    }
}

/// Packs `entry` to `output`, or to the artifacts directory by default.
fn pack_entry(
    workspace: &Workspace,
    entry: &AppEntry,
    output: Option<PathBuf>,
) -> Result<PackReport, AppError> {
    let app = entry.name();
    let checkout = existing_checkout(workspace, entry)?;
    let archive = output.unwrap_or_else(|| workspace.artifacts_dir().join(format!("{app}.tar.gz")));
    if let Some(parent) = archive.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let report = pack_to_path(&checkout, &archive, app, &workspace.exclusions())
        .map_err(artifact_error(app))?;
    workspace.audit(
        "pack",
        json!({
            "app": app,
            "archive": report.archive_path,
            "files": report.file_count,
            "bytes": report.total_size,
        }),
    );
    Ok(report)
}

pub(super) fn pack<W: Write>(
    workspace: &Workspace,
    app: &str,
    output: Option<PathBuf>,
    out: &mut W,
) -> Result<(), AppError> {
    let registry = workspace.registry()?;
    let entry = registry.require(app)?;
    let report = pack_entry(workspace, entry, output)?;
    writeln!(
        out,
        "packed {app}: {} files, {} bytes",
        report.file_count, report.total_size
    )?;
    writeln!(out, "  archive:  {}", report.archive_path.display())?;
    writeln!(out, "  manifest: {}", report.manifest_path.display())?;
    Ok(())
}

/// Resolves a verify target: an existing path wins, otherwise the name is
/// looked up in the registry and its checkout is used.
fn resolve_target(workspace: &Workspace, target: &str) -> Result<PathBuf, AppError> {
    let path = Path::new(target);
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    let registry = workspace.registry()?;
    let entry = registry.require(target)?;
    existing_checkout(workspace, entry)
}

pub(super) fn verify<W: Write>(
    workspace: &Workspace,
    target: &str,
    manifest_path: Option<&Path>,
    fail_on_extra: bool,
    out: &mut W,
) -> Result<(), AppError> {
    let on_error = artifact_error(target);
    let resolved = resolve_target(workspace, target)?;
    let manifest = match manifest_path {
        Some(path) => Manifest::read(path),
        None => load_manifest(&resolved),
    }
    .map_err(&on_error)?;
    let policy = VerifyPolicy {
        fail_on_extra: fail_on_extra || workspace.config().verify_fail_on_extra,
    };
    let result = launchpad_artifact::verify(&resolved, &manifest, &workspace.exclusions(), policy)
        .map_err(&on_error)?;

    writeln!(
        out,
        "{} {target}: {} files checked against manifest '{}'",
        outcome_marker(result.ok),
        manifest.files.len(),
        manifest.name
    )?;
    for (label, paths) in [
        ("missing", &result.missing),
        ("mismatched", &result.mismatched),
        ("extra", &result.extra),
    ] {
        for path in paths {
            writeln!(out, "  {label}: {path}")?;
        }
    }
    workspace.audit(
        "verify",
        json!({ "target": resolved, "result": result }),
    );

    if result.ok {
        Ok(())
    } else {
        Err(AppError::VerificationFailed {
            app: target.to_owned(),
            missing: result.missing.len(),
            mismatched: result.mismatched.len(),
            extra: result.extra.len(),
        })
    }
}

fn publish_request(
    workspace: &Workspace,
    entry: &AppEntry,
    args: &PublishArgs,
    archive: PathBuf,
) -> PublishRequest {
    let repo = args
        .repo_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| RepoLink {
            url: url.to_owned(),
            title: entry.name().to_owned(),
            description: entry.description().to_owned(),
            tags: args
                .tags
                .iter()
                .map(|tag| tag.trim().to_owned())
                .filter(|tag| !tag.is_empty())
                .collect(),
        });
    PublishRequest {
        archive,
        title: args
            .title
            .clone()
            .unwrap_or_else(|| entry.name().to_owned()),
        board: args
            .board
            .clone()
            .unwrap_or_else(|| workspace.config().publish_board.clone()),
        summary: args.summary.clone(),
        repo,
    }
}

pub(super) fn publish<W: Write>(
    workspace: &Workspace,
    args: &PublishArgs,
    out: &mut W,
) -> Result<(), AppError> {
    let config = workspace.config();
    if !config.publish_enabled {
        return Err(AppError::PublishDisabled);
    }
    let setup_error = |source| AppError::PublishSetup {
        app: args.app.clone(),
        source,
    };
    let credentials = Credentials::from_parts(
        config.publish_token.as_deref(),
        config.publish_handle.as_deref(),
        config.publish_password.as_deref(),
    )
    .map_err(setup_error)?;
    let mut api = HttpPublishApi::new(&config.publish_base_url, credentials).map_err(setup_error)?;
    publish_with(workspace, &mut api, args, out)
}

fn publish_with<A, W>(
    workspace: &Workspace,
    api: &mut A,
    args: &PublishArgs,
    out: &mut W,
) -> Result<(), AppError>
where
    A: PublishApi + ?Sized,
    W: Write,
{
    let app = args.app.as_str();
    let registry = workspace.registry()?;
    let entry = registry.require(app)?;
    let archive = match &args.archive {
        Some(path) => path.clone(),
        None => pack_entry(workspace, entry, None)?.archive_path,
    };
    let request = publish_request(workspace, entry, args, archive);

    let outcome = match run_pipeline(api, &request) {
        Ok(outcome) => outcome,
        Err(failure) => {
            workspace.audit(
                "publish_failed",
                json!({
                    "app": app,
                    "step": failure.step.to_string(),
                    "completed": failure.completed_summary(),
                }),
            );
            return Err(AppError::publish(app, failure));
        }
    };
    workspace.audit(
        "publish",
        json!({
            "app": app,
            "board_id": outcome.board_id,
            "thread_id": outcome.thread_id,
            "artifact_id": outcome.artifact_id,
        }),
    );
    writeln!(
        out,
        "published {app}: thread {} on board '{}', artifact {}",
        outcome.thread_id, request.board, outcome.artifact_id
    )?;
    if outcome.repo_registered {
        writeln!(out, "  repository link registered")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use launchpad_publish::ApiError;
    use mockall::mock;

    use super::*;
    use crate::tests::{TestWorkspace, WORKSPACE_REGISTRY};

    mock! {
        Api {}
        impl PublishApi for Api {
            fn authenticate(&mut self) -> Result<(), ApiError>;
            fn resolve_board(&self, slug: &str) -> Result<u64, ApiError>;
            fn create_thread(&self, board_id: u64, title: &str) -> Result<u64, ApiError>;
            fn create_post(&self, thread_id: u64, content_md: &str) -> Result<u64, ApiError>;
            fn upload_artifact(&self, archive: &Path) -> Result<u64, ApiError>;
            fn attach_artifact(&self, artifact_id: u64, thread_id: u64) -> Result<(), ApiError>;
            fn add_repo_link(&self, link: &RepoLink) -> Result<(), ApiError>;
        }
    }

    fn publish_args(app: &str) -> PublishArgs {
        PublishArgs {
            app: app.to_owned(),
            archive: None,
            title: None,
            summary: String::from("Built with Launchpad."),
            board: None,
            repo_url: None,
            tags: vec![String::from("369"), String::from("launchpad")],
        }
    }

    fn api_check_out(fixture: &TestWorkspace) {
        let checkout = fixture.apps_root().join("api");
        fs::create_dir_all(checkout.join("app")).expect("checkout");
        fs::write(checkout.join("app/main.py"), "app = None\n").expect("main");
        fs::write(checkout.join("requirements.txt"), "fastapi\n").expect("requirements");
    }

    #[test]
    fn pack_then_verify_by_application_name() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        api_check_out(&fixture);
        let workspace = fixture.workspace();

        let mut out = Vec::new();
        pack(&workspace, "api", None, &mut out).expect("pack");
        assert!(workspace.artifacts_dir().join("api.tar.gz").is_file());

        let mut verified = Vec::new();
        verify(&workspace, "api", None, false, &mut verified).expect("verify");
        let printed = String::from_utf8(verified).expect("utf8");
        assert!(printed.starts_with("ok   api: 2 files"), "{printed}");
    }

    #[test]
    fn verify_reports_tampered_files() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        api_check_out(&fixture);
        let workspace = fixture.workspace();
        pack(&workspace, "api", None, &mut Vec::new()).expect("pack");
        fs::write(
            fixture.apps_root().join("api/requirements.txt"),
            "fastapi\nuvicorn\n",
        )
        .expect("tamper");

        let mut out = Vec::new();
        let err = verify(&workspace, "api", None, false, &mut out).expect_err("mismatch");

        assert!(matches!(
            err,
            AppError::VerificationFailed {
                mismatched: 1,
                missing: 0,
                ..
            }
        ));
        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("  mismatched: requirements.txt"), "{printed}");
    }

    #[test]
    fn extras_fail_only_when_requested() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        api_check_out(&fixture);
        let workspace = fixture.workspace();
        pack(&workspace, "api", None, &mut Vec::new()).expect("pack");
        fs::write(fixture.apps_root().join("api/notes.txt"), "later").expect("extra");

        verify(&workspace, "api", None, false, &mut Vec::new()).expect("extras tolerated");
        let err = verify(&workspace, "api", None, true, &mut Vec::new()).expect_err("strict");
        assert!(matches!(err, AppError::VerificationFailed { extra: 1, .. }));
    }

    #[test]
    fn pack_requires_a_checkout() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let err = pack(&fixture.workspace(), "api", None, &mut Vec::new()).expect_err("missing");
        assert!(matches!(err, AppError::MissingCheckout { .. }));
    }

    #[test]
    fn publish_is_gated_by_configuration() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let err = publish(&fixture.workspace(), &publish_args("api"), &mut Vec::new())
            .expect_err("disabled");
        assert!(matches!(err, AppError::PublishDisabled));
    }

    #[test]
    fn publish_packs_and_uploads_the_fresh_archive() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        api_check_out(&fixture);
        let workspace = fixture.workspace();
        let expected_archive = workspace.artifacts_dir().join("api.tar.gz");

        let mut api = MockApi::new();
        api.expect_authenticate().returning(|| Ok(()));
        api.expect_resolve_board()
            .withf(|slug| slug == "dev")
            .returning(|_| Ok(1));
        api.expect_create_thread()
            .withf(|board, title| *board == 1 && title == "api")
            .returning(|_, _| Ok(10));
        api.expect_create_post().returning(|_, _| Ok(100));
        api.expect_upload_artifact()
            .withf(move |archive| archive == expected_archive)
            .returning(|_| Ok(7));
        api.expect_attach_artifact()
            .withf(|artifact, thread| *artifact == 7 && *thread == 10)
            .returning(|_, _| Ok(()));

        let mut out = Vec::new();
        publish_with(&workspace, &mut api, &publish_args("api"), &mut out).expect("publish");

        let printed = String::from_utf8(out).expect("utf8");
        assert!(printed.contains("thread 10 on board 'dev', artifact 7"), "{printed}");
    }

    #[test]
    fn publish_failure_names_completed_and_pending_steps() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let workspace = fixture.workspace();
        let mut args = publish_args("api");
        args.archive = Some(fixture.apps_root().join("prebuilt.tar.gz"));

        let mut api = MockApi::new();
        api.expect_authenticate()
            .returning(|| Err(ApiError::MissingCredentials));

        let err = publish_with(&workspace, &mut api, &args, &mut Vec::new())
            .expect_err("auth fails");

        match err {
            AppError::Publish {
                completed, pending, ..
            } => {
                assert_eq!(completed, "none");
                assert!(pending.contains("upload_archive"), "{pending}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn repository_link_uses_trimmed_tags() {
        let fixture = TestWorkspace::with_registry(WORKSPACE_REGISTRY);
        let workspace = fixture.workspace();
        let registry = workspace.registry().expect("registry");
        let entry = registry.require("api").expect("api");
        let mut args = publish_args("api");
        args.repo_url = Some(String::from("https://example.com/api.git"));
        args.tags = vec![String::from(" 369"), String::new()];

        let request = publish_request(&workspace, entry, &args, PathBuf::from("api.tar.gz"));

        let repo = request.repo.expect("repo link");
        assert_eq!(repo.tags, vec![String::from("369")]);
        assert_eq!(repo.title, "api");
    }
}
