//! Error type shared by the repository updater and the patch directory preparer.

use std::path::PathBuf;

/// Process status used when the downloader output is missing.
pub const EXIT_MISSING_DOWNLOAD: u8 = 2;

/// Errors from `hsb` operations.
#[derive(Debug, thiserror::Error)]
pub enum HsbError {
    /// Neither persistent data nor downloader output exists for a build.
    #[error("No {} directory. Run downloader in {}", ngdp_out.display(), ngdp_dir.display())]
    MissingDownloaderOutput { ngdp_out: PathBuf, ngdp_dir: PathBuf },

    /// An external command ran but exited unsuccessfully.
    #[error("command `{command}` failed ({}){}", describe_status(*status), format_stderr(stderr))]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// An external command could not be started at all.
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid build identifier {build:?}: {reason}")]
    InvalidBuild { build: String, reason: &'static str },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HsbError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// True when the failure is a missing external precondition rather than a
    /// failed operation.
    pub fn is_missing_precondition(&self) -> bool {
        matches!(self, Self::MissingDownloaderOutput { .. })
    }

    /// Process exit status for this error.
    ///
    /// A failed command passes its own status through when it fits in a `u8`
    /// and is non-zero; everything else maps to 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingDownloaderOutput { .. } => EXIT_MISSING_DOWNLOAD,
            Self::CommandFailed {
                status: Some(code), ..
            } => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
            _ => 1,
        }
    }
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_download_message_names_both_dirs() {
        let err = HsbError::MissingDownloaderOutput {
            ngdp_out: PathBuf::from("/mnt/home/ngdp/out"),
            ngdp_dir: PathBuf::from("/mnt/home/ngdp"),
        };
        assert_eq!(
            err.to_string(),
            "No /mnt/home/ngdp/out directory. Run downloader in /mnt/home/ngdp"
        );
        assert_eq!(err.exit_code(), 2);
        assert!(err.is_missing_precondition());
    }

    #[test]
    fn test_command_failed_passes_status_through() {
        let err = HsbError::CommandFailed {
            command: "git pull".into(),
            status: Some(128),
            stderr: "fatal: not a git repository\n".into(),
        };
        assert_eq!(err.exit_code(), 128);
        assert!(!err.is_missing_precondition());
        assert_eq!(
            err.to_string(),
            "command `git pull` failed (exit status 128): fatal: not a git repository"
        );
    }

    #[test]
    fn test_command_failed_without_usable_status_maps_to_one() {
        let signalled = HsbError::CommandFailed {
            command: "git clone".into(),
            status: None,
            stderr: String::new(),
        };
        assert_eq!(signalled.exit_code(), 1);
        assert!(signalled.to_string().ends_with("(terminated by signal)"));

        let out_of_range = HsbError::CommandFailed {
            command: "mv a b".into(),
            status: Some(-1),
            stderr: String::new(),
        };
        assert_eq!(out_of_range.exit_code(), 1);
    }

    #[test]
    fn test_other_errors_exit_one() {
        let err = HsbError::InvalidBuild {
            build: "..".into(),
            reason: "must not be `.` or `..`",
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(HsbError::Config("bad".into()).exit_code(), 1);
    }
}
