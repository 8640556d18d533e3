//! Writes run artifacts to disk.
//!
//! Inline `data:` references are decoded and written as files named by
//! their mime type. Anything else (hosted URLs) is listed in `links.txt`.

use crate::error::ApiError;
use crate::pipeline::{ParagraphImageSet, RunOutcome, RunResult, Script};
use crate::types::{decode_data_uri, AudioArtifact, ImageArtifact, VideoArtifact};
use std::path::{Path, PathBuf};
use tracing::debug;

const LINKS_FILE: &str = "links.txt";

/// Write whatever the run produced, completed or not. Returns written paths in write order.
pub fn write_run_artifacts(dir: &Path, result: &RunResult) -> Result<Vec<PathBuf>, ApiError> {
    let (script, image_sets, audio, video) = match &result.outcome {
        RunOutcome::Completed(artifacts) => (
            Some(&artifacts.script),
            Some(artifacts.image_sets.as_slice()),
            Some(&artifacts.audio),
            Some(&artifacts.video),
        ),
        RunOutcome::Aborted { partial, .. } => (
            partial.script.as_ref(),
            partial.image_sets.as_deref(),
            partial.audio.as_ref(),
            None,
        ),
    };

    std::fs::create_dir_all(dir)?;
    let mut writer = ArtifactWriter::new(dir);
    if let Some(script) = script {
        writer.write_script(script)?;
    }
    if let Some(sets) = image_sets {
        writer.write_image_sets(sets)?;
    }
    if let Some(audio) = audio {
        writer.write_audio(audio)?;
    }
    if let Some(video) = video {
        writer.write_video(video)?;
    }
    writer.finish()
}

/// Save a single image as `<stem>.<ext>`, or `<stem>.url` when it is not inline.
pub fn write_image(dir: &Path, stem: &str, image: &ImageArtifact) -> Result<PathBuf, ApiError> {
    std::fs::create_dir_all(dir)?;
    write_reference(dir, stem, image.as_str())
}

struct ArtifactWriter<'a> {
    dir: &'a Path,
    written: Vec<PathBuf>,
    links: Vec<String>,
}

impl<'a> ArtifactWriter<'a> {
    fn new(dir: &'a Path) -> Self {
        Self {
            dir,
            written: Vec::new(),
            links: Vec::new(),
        }
    }

    fn write_script(&mut self, script: &Script) -> Result<(), ApiError> {
        let path = self.dir.join("script.txt");
        std::fs::write(&path, format!("{}\n", script.full_text()))?;
        self.written.push(path);
        Ok(())
    }

    fn write_image_sets(&mut self, sets: &[ParagraphImageSet]) -> Result<(), ApiError> {
        for set in sets {
            for (n, image) in set.images.iter().enumerate() {
                let stem = format!("image-p{:02}-{}", set.paragraph_index + 1, n + 1);
                self.write_or_link(&stem, image.as_str())?;
            }
        }
        Ok(())
    }

    fn write_audio(&mut self, audio: &AudioArtifact) -> Result<(), ApiError> {
        self.write_or_link("narration", audio.as_str())
    }

    fn write_video(&mut self, video: &VideoArtifact) -> Result<(), ApiError> {
        self.write_or_link("video", video.as_str())
    }

    fn write_or_link(&mut self, stem: &str, reference: &str) -> Result<(), ApiError> {
        if reference.starts_with("data:") {
            let path = write_data(self.dir, stem, reference)?;
            self.written.push(path);
        } else {
            self.links.push(format!("{}\t{}", stem, reference));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<PathBuf>, ApiError> {
        if !self.links.is_empty() {
            let path = self.dir.join(LINKS_FILE);
            std::fs::write(&path, format!("{}\n", self.links.join("\n")))?;
            self.written.push(path);
        }
        Ok(self.written)
    }
}

fn write_reference(dir: &Path, stem: &str, reference: &str) -> Result<PathBuf, ApiError> {
    if reference.starts_with("data:") {
        write_data(dir, stem, reference)
    } else {
        let path = dir.join(format!("{}.url", stem));
        std::fs::write(&path, format!("{}\n", reference))?;
        Ok(path)
    }
}

fn write_data(dir: &Path, stem: &str, reference: &str) -> Result<PathBuf, ApiError> {
    let decoded = decode_data_uri(reference)?;
    let path = dir.join(format!("{}.{}", stem, decoded.extension()));
    std::fs::write(&path, &decoded.bytes)?;
    debug!(path = %path.display(), bytes = decoded.bytes.len(), "Artifact written");
    Ok(path)
}
