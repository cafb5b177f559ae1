use crate::types::{ArtifactKind, Coordinate, GROUP};
use crate::version::version_weight;
use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Version reported when nothing is installed.
pub const NO_VERSION: &str = "0.0.0";
pub const ARTIFACT_EXTENSION: &str = "jar";

impl ArtifactKind {
    pub fn project_name(&self) -> String {
        match self {
            ArtifactKind::Pure => "mirai-console".to_string(),
            kind => format!("mirai-console-{}", kind.to_string().to_lowercase()),
        }
    }

    /// Path of the repository directory listing for this kind.
    pub fn listing_path(&self) -> String {
        format!("/{}/{}/", GROUP, self.project_name())
    }

    pub fn coordinate(&self, version: &str, extension: &str) -> Coordinate {
        Coordinate::new(GROUP, &self.project_name(), version, extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub version: String,
}

pub fn artifact_file_name(kind: ArtifactKind, version: &str) -> String {
    format!("{}-{}.{}", kind.project_name(), version, ARTIFACT_EXTENSION)
}

/// Parse `<project>-<version>.jar`. The version must start with a digit so that
/// `mirai-console-graphical-1.0.jar` is not read as a `mirai-console` jar.
fn parse_file_name(file_name: &str, project: &str) -> Option<String> {
    let stem = file_name.strip_suffix(&format!(".{}", ARTIFACT_EXTENSION))?;
    let version = stem.strip_prefix(project)?.strip_prefix('-')?;
    if version.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        Some(version.to_string())
    } else {
        None
    }
}

/// Every installed jar of `kind` in `dir`, newest first.
pub fn find_local_artifacts(dir: &Path, kind: ArtifactKind) -> io::Result<Vec<LocalArtifact>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Content directory {} does not exist yet", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let project = kind.project_name();
    let mut artifacts = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if let Some(version) = parse_file_name(&file_name, &project) {
            tracing::debug!("Found local artifact {}", path.display());
            artifacts.push(LocalArtifact { path, version });
        }
    }

    // Same order as `sort_by_version`, so equal weights resolve the same way.
    artifacts.sort_by_cached_key(|a| {
        (
            Reverse(version_weight(&a.version)),
            Reverse(a.version.clone()),
        )
    });
    Ok(artifacts)
}

pub fn current_version(dir: &Path, kind: ArtifactKind) -> io::Result<String> {
    Ok(find_local_artifacts(dir, kind)?
        .into_iter()
        .next()
        .map(|a| a.version)
        .unwrap_or_else(|| NO_VERSION.to_string()))
}

/// Delete every installed jar of `kind`. Files that vanish in between are ignored.
pub fn remove_stale(dir: &Path, kind: ArtifactKind) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for artifact in find_local_artifacts(dir, kind)? {
        match fs::remove_file(&artifact.path) {
            Ok(()) => {
                tracing::info!("Removed {}", artifact.path.display());
                removed.push(artifact.path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_names() {
        assert_eq!(ArtifactKind::Pure.project_name(), "mirai-console");
        assert_eq!(ArtifactKind::Terminal.project_name(), "mirai-console-terminal");
        assert_eq!(
            ArtifactKind::Graphical.listing_path(),
            "/net/mamoe/mirai-console-graphical/"
        );
        assert_eq!(
            artifact_file_name(ArtifactKind::Pure, "2.3.1"),
            "mirai-console-2.3.1.jar"
        );
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(
            parse_file_name("mirai-console-0.5.2.jar", "mirai-console"),
            Some("0.5.2".to_string())
        );
        assert_eq!(
            parse_file_name("mirai-console-1.0-RC.jar", "mirai-console"),
            Some("1.0-RC".to_string())
        );
        assert_eq!(
            parse_file_name("mirai-console-graphical-0.5.2.jar", "mirai-console"),
            None
        );
        assert_eq!(parse_file_name("mirai-console-0.5.2.pom", "mirai-console"), None);
        assert_eq!(parse_file_name("mirai-core-1.0.0.jar", "mirai-console"), None);
    }

    #[test]
    fn test_current_version_sentinel_when_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            current_version(dir.path(), ArtifactKind::Pure).unwrap(),
            NO_VERSION
        );
        let missing = dir.path().join("missing");
        assert_eq!(current_version(&missing, ArtifactKind::Pure).unwrap(), NO_VERSION);
    }

    #[test]
    fn test_equal_weight_jars_resolve_like_sort_by_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mirai-console-2.3.jar"), b"short").unwrap();
        fs::write(dir.path().join("mirai-console-2.3.0.jar"), b"long").unwrap();

        let found: Vec<String> = find_local_artifacts(dir.path(), ArtifactKind::Pure)
            .unwrap()
            .into_iter()
            .map(|a| a.version)
            .collect();
        assert_eq!(found, crate::version::sort_by_version(&["2.3", "2.3.0"]));
        assert_eq!(
            current_version(dir.path(), ArtifactKind::Pure).unwrap(),
            "2.3.0"
        );
    }

    #[test]
    fn test_kinds_do_not_shadow_each_other() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mirai-console-0.5.2.jar"), b"pure").unwrap();
        fs::write(dir.path().join("mirai-console-graphical-0.4.0.jar"), b"gui").unwrap();
        fs::write(dir.path().join("mirai-console-0.5.2.pom"), b"pom").unwrap();

        assert_eq!(current_version(dir.path(), ArtifactKind::Pure).unwrap(), "0.5.2");
        assert_eq!(
            current_version(dir.path(), ArtifactKind::Graphical).unwrap(),
            "0.4.0"
        );
        assert_eq!(
            current_version(dir.path(), ArtifactKind::Terminal).unwrap(),
            NO_VERSION
        );
    }

    #[test]
    fn test_remove_stale_only_touches_own_kind() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mirai-console-0.5.1.jar"), b"old").unwrap();
        fs::write(dir.path().join("mirai-console-0.5.2.jar"), b"older").unwrap();
        fs::write(dir.path().join("mirai-console-graphical-0.4.0.jar"), b"gui").unwrap();

        assert_eq!(current_version(dir.path(), ArtifactKind::Pure).unwrap(), "0.5.2");

        let removed = remove_stale(dir.path(), ArtifactKind::Pure).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!dir.path().join("mirai-console-0.5.1.jar").exists());
        assert!(dir.path().join("mirai-console-graphical-0.4.0.jar").exists());
    }
}
