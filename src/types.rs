use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_PROXY: &str = "DEFAULT";
pub const GROUP: &str = "net/mamoe";

/// Which releases the updater is allowed to move to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    /// Never update once any version is installed
    Keep,
    /// Only releases without a pre-release tag
    #[default]
    Stable,
    /// Every release, early access and release candidates included
    Ea,
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePolicy::Keep => write!(f, "KEEP"),
            UpdatePolicy::Stable => write!(f, "STABLE"),
            UpdatePolicy::Ea => write!(f, "EA"),
        }
    }
}

impl std::str::FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
            .map_err(|_| format!("Unknown update policy '{}'. Use keep, stable or ea", s))
    }
}

/// Sibling variants of the managed artifact. Only the repository paths differ.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    #[default]
    Pure,
    Terminal,
    Graphical,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Pure => write!(f, "Pure"),
            ArtifactKind::Terminal => write!(f, "Terminal"),
            ArtifactKind::Graphical => write!(f, "Graphical"),
        }
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
            .map_err(|_| format!("Unknown artifact kind '{}'. Use pure, terminal or graphical", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtupSettings {
    #[serde(default = "default_content_dir")]
    pub content_dir: String,
    #[serde(default)]
    pub kind: ArtifactKind,
    #[serde(default)]
    pub policy: UpdatePolicy,
    #[serde(default = "default_proxy")]
    pub proxy: String,
    #[serde(default)]
    pub auto_detect_proxy: bool,
    #[serde(default = "default_proxy_probe_url")]
    pub proxy_probe_url: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,
    #[serde(default = "default_listing_bases")]
    pub listing_bases: Vec<String>,
}

fn default_content_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("artup")
        .join("content")
        .to_string_lossy()
        .to_string()
}
fn default_proxy() -> String {
    DEFAULT_PROXY.to_string()
}
fn default_proxy_probe_url() -> String {
    "https://www.baidu.com".to_string()
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_retries() -> u32 {
    3
}
pub fn default_mirrors() -> Vec<String> {
    vec![
        "https://maven.aliyun.com/nexus/content/repositories/jcenter/{group}/{project}/{version}/{project}-{version}.{extension}".to_string(),
        "https://jcenter.bintray.com/{group}/{project}/{version}/{project}-{version}.{extension}".to_string(),
    ]
}
pub fn default_listing_bases() -> Vec<String> {
    vec![
        "https://jcenter.bintray.com".to_string(),
        "https://maven.aliyun.com/nexus/content/repositories/jcenter".to_string(),
    ]
}

impl Default for ArtupSettings {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            kind: ArtifactKind::default(),
            policy: UpdatePolicy::default(),
            proxy: default_proxy(),
            auto_detect_proxy: false,
            proxy_probe_url: default_proxy_probe_url(),
            probe_timeout_secs: default_probe_timeout_secs(),
            retries: default_retries(),
            mirrors: default_mirrors(),
            listing_bases: default_listing_bases(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ArtupConfig {
    #[serde(default)]
    pub settings: ArtupSettings,
}

/// The logical path of one file in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinate {
    pub group: String,
    pub project: String,
    pub version: String,
    pub extension: String,
}

impl Coordinate {
    pub fn new(group: &str, project: &str, version: &str, extension: &str) -> Self {
        Self {
            group: group.to_string(),
            project: project.to_string(),
            version: version.to_string(),
            extension: extension.to_string(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.{}", self.project, self.version, self.extension)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.file_name())
    }
}
