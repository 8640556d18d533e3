//! Image stage: one remote call per paragraph, issued concurrently and
//! reassembled in paragraph order.

use crate::error::PipelineError;
use crate::pipeline::script::Script;
use crate::pipeline::StageResult;
use crate::provider::RemoteGenerationPort;
use crate::types::ImageArtifact;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Images generated for one paragraph. `paragraph_index` is the paragraph's position in the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphImageSet {
    pub paragraph_index: usize,
    pub paragraph: String,
    pub images: Vec<ImageArtifact>,
}

/// What the image stage does when a paragraph fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutPolicy {
    /// First failure fails the stage; in-flight calls are dropped.
    #[default]
    FailFast,
    /// Failed paragraphs get an empty set; the stage fails only if every paragraph fails.
    ContinueOnFailure,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutOptions {
    pub policy: FanOutPolicy,
    /// Upper bound on concurrent calls. `None` issues every paragraph at once.
    pub max_concurrent: Option<usize>,
}

/// Per-paragraph outcome reported while the stage is in flight.
#[derive(Debug)]
pub enum ParagraphOutcome<'a> {
    Completed { index: usize, image_count: usize },
    Failed { index: usize, cause: &'a str },
}

/// Generate images for every paragraph of `script`.
///
/// The returned sets are aligned with `script.paragraphs()` whatever order the
/// remote calls complete in.
pub async fn generate_image_sets<F>(
    port: &dyn RemoteGenerationPort,
    script: &Script,
    options: FanOutOptions,
    mut on_paragraph: F,
) -> StageResult<Vec<ParagraphImageSet>>
where
    F: FnMut(ParagraphOutcome<'_>),
{
    let paragraphs = script.paragraphs();
    let limit = options
        .max_concurrent
        .unwrap_or(paragraphs.len())
        .max(1);

    // Built eagerly: a lazily mapped iterator leaves the spawned run future non-`Send`.
    let calls: Vec<_> = paragraphs
        .iter()
        .enumerate()
        .map(|(index, paragraph)| {
            port.generate_images_for_paragraph(paragraph)
                .map(move |outcome| (index, outcome))
        })
        .collect();
    let mut pending = stream::iter(calls).buffer_unordered(limit);

    let mut slots: Vec<Option<Vec<ImageArtifact>>> = vec![None; paragraphs.len()];
    let mut first_failure: Option<PipelineError> = None;
    let mut failed = 0usize;

    while let Some((index, outcome)) = pending.next().await {
        match outcome {
            Ok(images) => {
                debug!(paragraph_index = index, image_count = images.len(), "Paragraph images generated");
                on_paragraph(ParagraphOutcome::Completed {
                    index,
                    image_count: images.len(),
                });
                slots[index] = Some(images);
            }
            Err(err) => {
                let cause = err.to_string();
                warn!(paragraph_index = index, error = %cause, "Paragraph image generation failed");
                on_paragraph(ParagraphOutcome::Failed {
                    index,
                    cause: &cause,
                });
                let error = PipelineError::ImageGenerationFailed {
                    paragraph_index: index,
                    cause,
                };
                if options.policy == FanOutPolicy::FailFast {
                    return Err(error);
                }
                failed += 1;
                first_failure.get_or_insert(error);
                slots[index] = Some(Vec::new());
            }
        }
    }

    if failed == paragraphs.len() {
        if let Some(error) = first_failure {
            return Err(error);
        }
    }

    Ok(slots
        .into_iter()
        .zip(paragraphs)
        .enumerate()
        .map(|(paragraph_index, (images, paragraph))| ParagraphImageSet {
            paragraph_index,
            paragraph: paragraph.clone(),
            images: images.unwrap_or_default(),
        })
        .collect())
}

/// All images in paragraph order, each paragraph's images kept in the order returned.
pub fn flatten_images(sets: &[ParagraphImageSet]) -> Vec<ImageArtifact> {
    sets.iter()
        .flat_map(|set| set.images.iter().cloned())
        .collect()
}
