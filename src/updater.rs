//! Update orchestration
//!
//! One run walks `Checking -> Deciding -> {UpToDate | Updating} -> Done`:
//! - read the installed version from the content directory
//! - ask the repository for the newest version allowed by the policy
//! - replace the installed jar when the two differ
//!
//! The new jar is fully downloaded before the old one is touched, so a failed run
//! leaves the previous installation in place.

use crate::artifact::{
    artifact_file_name, current_version, remove_stale, ARTIFACT_EXTENSION, NO_VERSION,
};
use crate::error::UpdateError;
use crate::mirror::MirrorFetcher;
use crate::net::NetContext;
use crate::retry::retry;
use crate::types::{ArtifactKind, ArtupSettings, UpdatePolicy};
use crate::version::{extract_versions, select_version};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Checking,
    Deciding,
    UpToDate,
    Updating,
    Done,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateState::Checking => "CHECKING",
            UpdateState::Deciding => "DECIDING",
            UpdateState::UpToDate => "UP_TO_DATE",
            UpdateState::Updating => "UPDATING",
            UpdateState::Done => "DONE",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// `keep` policy with something installed; the repository was not asked.
    Kept { version: String },
    UpToDate { version: String },
    /// Dry run found a newer version.
    Available { from: String, to: String },
    Updated { from: String, to: String, path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub kind: ArtifactKind,
    pub policy: UpdatePolicy,
    pub current: String,
    pub newest: Option<String>,
    pub outcome: UpdateOutcome,
    pub transitions: Vec<UpdateState>,
}

impl UpdateReport {
    pub fn final_state(&self) -> UpdateState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(UpdateState::Checking)
    }

    #[cfg(test)]
    pub fn passed_through(&self, state: UpdateState) -> bool {
        self.transitions.contains(&state)
    }
}

struct Run {
    transitions: Vec<UpdateState>,
}

impl Run {
    fn new() -> Self {
        let mut run = Self {
            transitions: Vec::new(),
        };
        run.enter(UpdateState::Checking);
        run
    }

    fn enter(&mut self, state: UpdateState) {
        tracing::debug!("Update state -> {}", state);
        self.transitions.push(state);
    }
}

/// Settle a `keep` run from the content directory alone.
///
/// Returns `None` when the repository has to be asked, so callers can decide this
/// before any proxy probe or request is made.
pub fn keep_installed(
    content_dir: &Path,
    kind: ArtifactKind,
    policy: UpdatePolicy,
) -> Result<Option<UpdateReport>, UpdateError> {
    if policy != UpdatePolicy::Keep {
        return Ok(None);
    }
    let current = current_version(content_dir, kind)?;
    if current == NO_VERSION {
        return Ok(None);
    }

    tracing::info!("Stay on current version {}.", current);
    let mut run = Run::new();
    run.enter(UpdateState::UpToDate);
    run.enter(UpdateState::Done);
    Ok(Some(UpdateReport {
        kind,
        policy,
        current: current.clone(),
        newest: None,
        outcome: UpdateOutcome::Kept { version: current },
        transitions: run.transitions,
    }))
}

pub struct Updater {
    fetcher: MirrorFetcher,
    content_dir: PathBuf,
    kind: ArtifactKind,
    policy: UpdatePolicy,
    retries: u32,
}

impl Updater {
    pub fn new(
        ctx: &NetContext,
        settings: &ArtupSettings,
        kind: ArtifactKind,
        policy: UpdatePolicy,
    ) -> Self {
        Self {
            fetcher: MirrorFetcher::new(
                ctx,
                settings.mirrors.clone(),
                settings.listing_bases.clone(),
            ),
            content_dir: PathBuf::from(&settings.content_dir),
            kind,
            policy,
            retries: settings.retries,
        }
    }

    pub fn fetcher(&self) -> &MirrorFetcher {
        &self.fetcher
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Every version in the repository listing, in listing order.
    pub async fn remote_versions(&self) -> Result<Vec<String>, UpdateError> {
        let fetcher = &self.fetcher;
        let listing_path = self.kind.listing_path();
        let listing_path = listing_path.as_str();

        retry(
            self.retries,
            "Failed to fetch the version listing",
            move |_| async move {
                let listing = fetcher.fetch_listing(listing_path).await?;
                extract_versions(&listing).map_err(|e| UpdateError::FetchFailed {
                    context: format!("Could not parse listing {}", listing_path),
                    failures: vec![e.to_string()],
                })
            },
        )
        .await
    }

    pub async fn newest_version(&self) -> Result<String, UpdateError> {
        let versions = self.remote_versions().await?;
        select_version(&versions, self.policy)
    }

    /// Report what would happen without downloading anything.
    pub async fn check(&self) -> Result<UpdateReport, UpdateError> {
        self.execute(false).await
    }

    pub async fn run(&self) -> Result<UpdateReport, UpdateError> {
        self.execute(true).await
    }

    async fn execute(&self, apply: bool) -> Result<UpdateReport, UpdateError> {
        if let Some(report) = keep_installed(&self.content_dir, self.kind, self.policy)? {
            return Ok(report);
        }

        let mut run = Run::new();
        tracing::info!("Fetching newest version of {}", self.kind.project_name());
        let current = current_version(&self.content_dir, self.kind)?;

        let newest = self.newest_version().await?;
        run.enter(UpdateState::Deciding);
        tracing::info!(
            "Local {} version: {} | Newest {} version: {}",
            self.kind,
            current,
            self.policy,
            newest
        );

        if current == newest {
            run.enter(UpdateState::UpToDate);
            run.enter(UpdateState::Done);
            return Ok(self.report(
                current.clone(),
                Some(newest),
                UpdateOutcome::UpToDate { version: current },
                run,
            ));
        }

        if !apply {
            return Ok(self.report(
                current.clone(),
                Some(newest.clone()),
                UpdateOutcome::Available {
                    from: current,
                    to: newest,
                },
                run,
            ));
        }

        run.enter(UpdateState::Updating);
        tracing::info!(
            "Updating {} from {} to {}",
            self.kind.project_name(),
            current,
            newest
        );
        let path = self.install(&newest).await?;
        run.enter(UpdateState::Done);

        Ok(self.report(
            current.clone(),
            Some(newest.clone()),
            UpdateOutcome::Updated {
                from: current,
                to: newest,
                path,
            },
            run,
        ))
    }

    /// Download `version` next to the installed jar, then swap it in.
    async fn install(&self, version: &str) -> Result<PathBuf, UpdateError> {
        fs::create_dir_all(&self.content_dir)?;

        let coordinate = self.kind.coordinate(version, ARTIFACT_EXTENSION);
        let hint = format!("Failed to download {}", coordinate);
        let fetcher = &self.fetcher;
        let target = &coordinate;
        let dir = self.content_dir.as_path();

        let staged = retry(self.retries, &hint, move |_| async move {
            fetcher.download(target, dir).await
        })
        .await?;

        remove_stale(&self.content_dir, self.kind)?;

        let final_path = self
            .content_dir
            .join(artifact_file_name(self.kind, version));
        staged
            .persist(&final_path)
            .map_err(|e| UpdateError::Io(e.error))?;

        tracing::info!("Installed {}", final_path.display());
        Ok(final_path)
    }

    fn report(
        &self,
        current: String,
        newest: Option<String>,
        outcome: UpdateOutcome,
        run: Run,
    ) -> UpdateReport {
        UpdateReport {
            kind: self.kind,
            policy: self.policy,
            current,
            newest,
            outcome,
            transitions: run.transitions,
        }
    }
}
