//! Repository updater tests against a recording command runner.

use hsb_core::repos::{RepoAction, update_repositories};
use hsb_core::{CommandOutput, CommandRunner, CommandSpec, HsbConfig, HsbError};
use std::cell::RefCell;
use std::fs;

/// Records every command; fails the first one whose rendering contains `fail_on`.
#[derive(Default)]
struct RecordingRunner {
    calls: RefCell<Vec<String>>,
    fail_on: Option<&'static str>,
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HsbError> {
        let line = spec.to_string();
        self.calls.borrow_mut().push(line.clone());
        if self.fail_on.is_some_and(|needle| line.contains(needle)) {
            return Ok(CommandOutput {
                status: Some(128),
                stdout: String::new(),
                stderr: "fatal: could not read from remote repository".into(),
            });
        }
        Ok(CommandOutput::ok())
    }
}

fn config_in(tmp: &tempfile::TempDir) -> HsbConfig {
    HsbConfig::with_base_dir(tmp.path())
}

#[test]
fn test_clones_missing_repositories() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(&tmp);
    let runner = RecordingRunner::default();

    let report = update_repositories(&config, &runner).unwrap();

    let base = tmp.path().display().to_string();
    assert_eq!(
        *runner.calls.borrow(),
        vec![
            format!(
                "git clone git@github.com:HearthSim/HearthstoneJSON.git {base}/HearthstoneJSON"
            ),
            format!("git clone git@github.com:HearthSim/Sunwell.git {base}/Sunwell"),
            format!("git clone git@github.com:HearthSim/hs-fonts.git {base}/hs-fonts"),
            format!("git -C {base} submodule init"),
            format!("git -C {base} submodule update"),
        ]
    );
    assert_eq!(report.count(RepoAction::Cloned), 3);
    assert_eq!(report.count(RepoAction::Pulled), 0);
    assert!(report.repositories.iter().all(|r| r.head.is_none()));
}

#[test]
fn test_pulls_existing_repositories() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("Sunwell")).unwrap();
    let config = config_in(&tmp);
    let runner = RecordingRunner::default();

    let report = update_repositories(&config, &runner).unwrap();

    let calls = runner.calls.borrow();
    let sunwell: Vec<&String> = calls.iter().filter(|c| c.contains("Sunwell")).collect();
    assert_eq!(sunwell.len(), 1);
    assert_eq!(
        *sunwell[0],
        format!("git -C {} pull", tmp.path().join("Sunwell").display())
    );
    assert!(!calls.iter().any(|c| c.contains("clone") && c.contains("Sunwell")));

    let actions: Vec<(&str, RepoAction)> = report
        .repositories
        .iter()
        .map(|r| (r.name.as_str(), r.action))
        .collect();
    assert_eq!(
        actions,
        vec![
            ("HearthstoneJSON", RepoAction::Cloned),
            ("Sunwell", RepoAction::Pulled),
            ("hs-fonts", RepoAction::Cloned),
        ]
    );
}

#[test]
fn test_failure_aborts_remaining_work() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config_in(&tmp);
    let runner = RecordingRunner {
        fail_on: Some("Sunwell"),
        ..RecordingRunner::default()
    };

    let err = update_repositories(&config, &runner).unwrap_err();

    match &err {
        HsbError::CommandFailed {
            command, status, ..
        } => {
            assert!(command.starts_with("git clone git@github.com:HearthSim/Sunwell.git"));
            assert_eq!(*status, Some(128));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 128);
    // hs-fonts and the submodule steps never ran
    assert_eq!(runner.calls.borrow().len(), 2);
}

#[test]
fn test_custom_repository_list_and_template() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config_in(&tmp);
    config.repositories.names = vec!["python-hearthstone".into()];
    config.repositories.remote_template = "https://github.com/HearthSim/{name}".into();
    let runner = RecordingRunner::default();

    update_repositories(&config, &runner).unwrap();

    let calls = runner.calls.borrow();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].starts_with("git clone https://github.com/HearthSim/python-hearthstone "));
}
