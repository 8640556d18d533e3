//! Iterative thumbnail refinement with a branchable version history.
//!
//! The history is append-only: refining always adds a new entry at the tail,
//! derived from whichever entry the active pointer names. Selecting an older
//! version moves the pointer without discarding anything, so the next
//! refinement branches from it. Generating a fresh initial image clears the
//! history and starts a new epoch.

use crate::error::RefinementError;
use crate::provider::RemoteGenerationPort;
use crate::types::ImageArtifact;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementEntry {
    pub prompt: String,
    /// Entry this one was derived from; `None` for an initial generation.
    pub base_index: Option<usize>,
    pub image: ImageArtifact,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinementHistory {
    entries: Vec<RefinementEntry>,
    active: Option<usize>,
    epoch: u64,
}

impl RefinementHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RefinementEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RefinementEntry> {
        self.entries.get(index)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&RefinementEntry> {
        self.active.and_then(|index| self.entries.get(index))
    }

    /// Incremented each time the history is restarted from an initial generation.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Discard every entry and start over from `image`.
    pub fn restart(&mut self, prompt: impl Into<String>, image: ImageArtifact) -> &RefinementEntry {
        self.entries.clear();
        self.entries.push(entry(prompt.into(), None, image));
        self.active = Some(0);
        self.epoch += 1;
        &self.entries[0]
    }

    /// Append a refinement of `base_index` and make it active.
    pub fn append(
        &mut self,
        prompt: impl Into<String>,
        base_index: usize,
        image: ImageArtifact,
    ) -> Result<&RefinementEntry, RefinementError> {
        self.check_index(base_index)?;
        self.entries
            .push(entry(prompt.into(), Some(base_index), image));
        let tail = self.entries.len() - 1;
        self.active = Some(tail);
        Ok(&self.entries[tail])
    }

    /// Point the active pointer at an existing entry.
    pub fn select(&mut self, index: usize) -> Result<&RefinementEntry, RefinementError> {
        self.check_index(index)?;
        self.active = Some(index);
        Ok(&self.entries[index])
    }

    fn check_index(&self, index: usize) -> Result<(), RefinementError> {
        if index >= self.entries.len() {
            return Err(RefinementError::VersionOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }
}

fn entry(prompt: String, base_index: Option<usize>, image: ImageArtifact) -> RefinementEntry {
    RefinementEntry {
        prompt,
        base_index,
        image,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Drives the refinement loop against a generation port.
///
/// The history only changes after the remote call succeeds, so a failed
/// generation leaves the previous versions and active pointer untouched.
pub struct ThumbnailRefiner<P: RemoteGenerationPort + ?Sized> {
    port: Arc<P>,
    history: RefinementHistory,
}

impl<P: RemoteGenerationPort + ?Sized> ThumbnailRefiner<P> {
    pub fn new(port: Arc<P>) -> Self {
        Self {
            port,
            history: RefinementHistory::new(),
        }
    }

    pub fn history(&self) -> &RefinementHistory {
        &self.history
    }

    /// Generate a fresh image from `prompt` and restart the history with it.
    pub async fn generate_initial(&mut self, prompt: &str) -> Result<&RefinementEntry, RefinementError> {
        let image = self.port.refine_image(prompt, None).await?;
        info!(epoch = self.history.epoch() + 1, "Initial thumbnail generated");
        Ok(self.history.restart(prompt, image))
    }

    /// Derive a new version from the active one.
    pub async fn refine(&mut self, prompt: &str) -> Result<&RefinementEntry, RefinementError> {
        let base_index = self
            .history
            .active_index()
            .ok_or(RefinementError::NoActiveVersion)?;
        let base = self.history.entries[base_index].image.clone();
        let image = self.port.refine_image(prompt, Some(&base)).await?;
        debug!(base_index, version = self.history.len(), "Thumbnail refined");
        self.history.append(prompt, base_index, image)
    }

    pub fn select_version(&mut self, index: usize) -> Result<&RefinementEntry, RefinementError> {
        self.history.select(index)
    }
}
