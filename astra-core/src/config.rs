//! Configuration for AStRA.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides. Files are read
//! from `~/.config/astra/config.toml` and `.astra/config.toml` in the workspace.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AstraConfig {
    pub git: GitConfig,
    pub buildinfo: BuildinfoConfig,
    pub output: OutputConfig,
}

/// Git history extraction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Clone destination. Wiped before every clone.
    pub work_dir: Option<PathBuf>,
    /// Leave the clone on disk after extraction.
    pub keep_clone: bool,
}

impl GitConfig {
    pub fn clone_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("astra-git-history"))
    }
}

/// Debian buildinfo extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildinfoConfig {
    /// Archive base used to synthesize pool URIs.
    pub mirror: String,
    /// Builder label attached to the build principal.
    pub builder: String,
    /// Command recorded on the build step.
    pub build_command: String,
}

impl Default for BuildinfoConfig {
    fn default() -> Self {
        Self {
            mirror: "https://deb.debian.org/debian".into(),
            builder: "Debian Build Infrastructure".into(),
            build_command: "dpkg-buildpackage".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "astra", "astra")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration with all layers applied.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&AstraConfig>,
) -> Result<AstraConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AstraConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".astra").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // ASTRA_GIT__WORK_DIR, ASTRA_BUILDINFO__MIRROR, ...
    figment = figment.merge(Env::prefixed("ASTRA_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
