//! Path conventions and repository list for `hsb`.
//!
//! Load order: `<base_dir>/hsb.toml` → environment variables → defaults.
//! The CLI applies its own flags on top of the loaded value.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::HsbError;

/// Name of the optional config file in the base directory.
pub const CONFIG_FILE: &str = "hsb.toml";

const DEFAULT_DATA_ROOT: &str = "/mnt/home";
const DEFAULT_REMOTE_TEMPLATE: &str = "git@github.com:HearthSim/{name}.git";
const DEFAULT_REPOSITORIES: [&str; 3] = ["HearthstoneJSON", "Sunwell", "hs-fonts"];

/// Resolved configuration, built once at startup and passed to every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HsbConfig {
    /// Directory holding the tooling checkout; repositories are cloned into it.
    pub base_dir: PathBuf,
    /// External mount point holding downloader state and persistent build data.
    pub data_root: PathBuf,
    /// Local build tree. Defaults to `<base_dir>/build`.
    pub build_dir: Option<PathBuf>,
    pub ngdp: NgdpConfig,
    pub repositories: RepositoriesConfig,
}

/// Downloader directory overrides. Unset entries derive from `data_root`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NgdpConfig {
    /// Downloader working directory. Defaults to `<data_root>/ngdp`.
    pub dir: Option<PathBuf>,
    /// Persistent per-build storage. Defaults to `<data_root>/data/ngdp/hsb`.
    pub data_dir: Option<PathBuf>,
}

/// External repositories kept in sync next to the tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoriesConfig {
    /// Repository names, processed in order.
    pub names: Vec<String>,
    /// Remote URL with a `{name}` placeholder.
    pub remote_template: String,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            names: DEFAULT_REPOSITORIES.iter().map(|s| s.to_string()).collect(),
            remote_template: DEFAULT_REMOTE_TEMPLATE.to_string(),
        }
    }
}

impl Default for HsbConfig {
    fn default() -> Self {
        Self::with_base_dir(PathBuf::from("."))
    }
}

impl HsbConfig {
    /// Defaults rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            build_dir: None,
            ngdp: NgdpConfig::default(),
            repositories: RepositoriesConfig::default(),
        }
    }

    /// Load `hsb.toml` from `base_dir` (if present) and apply environment overrides.
    pub fn load(base_dir: &Path) -> Result<Self> {
        Self::load_with_env(base_dir, |var| std::env::var(var).ok())
    }

    /// Like [`HsbConfig::load`], reading overrides through `lookup` instead of
    /// the process environment.
    pub fn load_with_env(base_dir: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = base_dir.join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            Self::default()
        };

        // The file never decides where the tooling lives.
        config.base_dir = base_dir.to_path_buf();
        config.apply_env(lookup);
        config.resolve_relative_paths();
        config.validate()?;

        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let path = |var: &str| lookup(var).filter(|v| !v.is_empty()).map(PathBuf::from);

        if let Some(root) = path("HSB_DATA_ROOT") {
            self.data_root = root;
        }
        if let Some(dir) = path("HSB_BUILD_DIR") {
            self.build_dir = Some(dir);
        }
        if let Some(dir) = path("HSB_NGDP_DIR") {
            self.ngdp.dir = Some(dir);
        }
        if let Some(dir) = path("HSB_NGDP_DATA_DIR") {
            self.ngdp.data_dir = Some(dir);
        }
        if let Some(template) = lookup("HSB_REMOTE_TEMPLATE").filter(|v| !v.is_empty()) {
            self.repositories.remote_template = template;
        }
    }

    fn resolve_relative_paths(&mut self) {
        let base = self.base_dir.clone();
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.data_root);
        if let Some(dir) = self.build_dir.as_mut() {
            anchor(dir);
        }
        if let Some(dir) = self.ngdp.dir.as_mut() {
            anchor(dir);
        }
        if let Some(dir) = self.ngdp.data_dir.as_mut() {
            anchor(dir);
        }
    }

    /// Check repository names and the remote template.
    pub fn validate(&self) -> Result<(), HsbError> {
        if !self.repositories.remote_template.contains("{name}") {
            return Err(HsbError::Config(format!(
                "repositories.remote_template ({}) must contain `{{name}}`",
                self.repositories.remote_template
            )));
        }
        for (i, name) in self.repositories.names.iter().enumerate() {
            if !is_single_segment(name) {
                return Err(HsbError::Config(format!(
                    "repository name {name:?} must be a single path segment"
                )));
            }
            if self.repositories.names[..i].contains(name) {
                return Err(HsbError::Config(format!(
                    "repository {name:?} is listed more than once"
                )));
            }
        }
        Ok(())
    }

    pub fn build_dir(&self) -> PathBuf {
        self.build_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("build"))
    }

    /// Downloader working directory (`NGDP_DIR`).
    pub fn ngdp_dir(&self) -> PathBuf {
        self.ngdp
            .dir
            .clone()
            .unwrap_or_else(|| self.data_root.join("ngdp"))
    }

    /// Downloader output directory (`NGDP_OUT`).
    pub fn ngdp_out(&self) -> PathBuf {
        self.ngdp_dir().join("out")
    }

    /// Root of persistent build storage (`NGDP_DATA_DIR`).
    pub fn ngdp_data_dir(&self) -> PathBuf {
        self.ngdp
            .data_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join("data").join("ngdp").join("hsb"))
    }

    /// Persistent data directory for one build.
    pub fn persistent_dir(&self, build: &str) -> PathBuf {
        self.ngdp_data_dir().join(build)
    }

    /// Extraction directory (a symlink) for one build.
    pub fn extracted_dir(&self, build: &str) -> PathBuf {
        self.build_dir().join("extracted").join(build)
    }

    pub fn repository_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    pub fn repository_url(&self, name: &str) -> String {
        self.repositories.remote_template.replace("{name}", name)
    }
}

/// Reject anything that would not stay a single path component.
pub fn validate_build_id(build: &str) -> Result<(), HsbError> {
    let reason = if build.is_empty() {
        Some("must not be empty")
    } else if build == "." || build == ".." {
        Some("must not be `.` or `..`")
    } else if build.contains('\0') {
        Some("must not contain NUL")
    } else if !is_single_segment(build) {
        Some("must not contain a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(HsbError::InvalidBuild {
            build: build.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn is_single_segment(s: &str) -> bool {
    let mut components = Path::new(s).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == s
    )
}
