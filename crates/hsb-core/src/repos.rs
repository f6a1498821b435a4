//! Keep the external HearthSim repositories cloned and current.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::HsbConfig;
use crate::error::HsbError;
use crate::exec::{CommandRunner, CommandSpec};

/// What happened to one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoAction {
    Cloned,
    Pulled,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoUpdate {
    pub name: String,
    pub path: PathBuf,
    pub action: RepoAction,
    /// HEAD after the update, when the checkout could be opened.
    pub head: Option<String>,
}

/// Result of [`update_repositories`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepositoryReport {
    pub repositories: Vec<RepoUpdate>,
}

impl RepositoryReport {
    pub fn count(&self, action: RepoAction) -> usize {
        self.repositories
            .iter()
            .filter(|r| r.action == action)
            .count()
    }
}

/// Clone missing repositories, pull existing ones, then sync the submodules of
/// the base directory. The first failing command aborts the whole run.
pub fn update_repositories(
    config: &HsbConfig,
    runner: &impl CommandRunner,
) -> Result<RepositoryReport, HsbError> {
    let mut report = RepositoryReport::default();

    for name in &config.repositories.names {
        let path = config.repository_path(name);

        let (action, spec) = if path.exists() {
            (RepoAction::Pulled, pull_command(&path))
        } else {
            let url = config.repository_url(name);
            (RepoAction::Cloned, clone_command(&url, &path))
        };
        runner.run_checked(&spec)?;

        let head = head_sha(&path);
        match &head {
            Some(sha) => tracing::info!("{name}: {} at {}", action_label(action), short(sha)),
            None => tracing::info!("{name}: {}", action_label(action)),
        }
        report.repositories.push(RepoUpdate {
            name: name.clone(),
            path,
            action,
            head,
        });
    }

    for step in ["init", "update"] {
        runner.run_checked(
            &CommandSpec::git(["-C"])
                .path_arg(&config.base_dir)
                .arg("submodule")
                .arg(step),
        )?;
    }

    Ok(report)
}

fn clone_command(url: &str, path: &Path) -> CommandSpec {
    CommandSpec::git(["clone", url]).path_arg(path)
}

fn pull_command(path: &Path) -> CommandSpec {
    CommandSpec::git(["-C"]).path_arg(path).arg("pull")
}

fn action_label(action: RepoAction) -> &'static str {
    match action {
        RepoAction::Cloned => "cloned",
        RepoAction::Pulled => "pulled",
    }
}

fn short(sha: &str) -> &str {
    sha.get(..10).unwrap_or(sha)
}

/// Current HEAD commit of the checkout at `path`, if it is a readable git repository.
pub fn head_sha(path: &Path) -> Option<String> {
    let repo = git2::Repository::open(path).ok()?;
    let head = repo.head().ok()?.peel_to_commit().ok()?;
    Some(head.id().to_string())
}
