//! Offline generator: deterministic placeholder artifacts, no network.
//!
//! Used for dry runs of the CLI and for demos. Images are SVG cards showing the
//! paragraph text, audio is a short silent WAV, and the video is a JSON manifest
//! produced by a job that completes after a fixed number of polls.

use super::{JobStatus, RemoteGenerationPort, VideoRequest, VideoSubmission};
use crate::error::ApiError;
use crate::pipeline::script::Script;
use crate::types::{AudioArtifact, ImageArtifact, JobHandle, VideoArtifact};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

const DEFAULT_POLLS_UNTIL_DONE: u32 = 2;
/// Pending jobs kept before the oldest is forgotten.
const MAX_PENDING_JOBS: usize = 32;
const PALETTE: [&str; 5] = ["#1f6feb", "#8957e5", "#d29922", "#2da44e", "#cf222e"];

struct PendingVideo {
    polls: u32,
    manifest: serde_json::Value,
}

#[derive(Default)]
struct JobTable {
    pending: HashMap<String, PendingVideo>,
    order: VecDeque<String>,
}

impl JobTable {
    fn insert(&mut self, id: String, job: PendingVideo) {
        while self.order.len() >= MAX_PENDING_JOBS {
            if let Some(oldest) = self.order.pop_front() {
                self.pending.remove(&oldest);
            }
        }
        self.order.push_back(id.clone());
        self.pending.insert(id, job);
    }

    fn remove(&mut self, id: &str) {
        self.pending.remove(id);
        self.order.retain(|queued| queued != id);
    }
}

pub struct OfflineGenerator {
    name: String,
    images_per_paragraph: usize,
    polls_until_done: u32,
    next_job: AtomicU64,
    jobs: Mutex<JobTable>,
}

impl OfflineGenerator {
    pub fn new(name: impl Into<String>, images_per_paragraph: usize) -> Self {
        Self {
            name: name.into(),
            images_per_paragraph: images_per_paragraph.max(1),
            polls_until_done: DEFAULT_POLLS_UNTIL_DONE,
            next_job: AtomicU64::new(1),
            jobs: Mutex::new(JobTable::default()),
        }
    }

    /// Number of `Pending` answers before a video job reports `Done`. Zero returns videos immediately.
    pub fn with_polls_until_done(mut self, polls: u32) -> Self {
        self.polls_until_done = polls;
        self
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn svg_card(caption: &str, variant: usize) -> ImageArtifact {
    let mut short: String = caption.chars().take(80).collect();
    if short.len() < caption.len() {
        short.push('…');
    }
    let caption = short;
    let svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"720\" height=\"1280\">\
<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>\
<text x=\"40\" y=\"640\" font-size=\"32\" fill=\"#ffffff\">{}</text></svg>",
        PALETTE[variant % PALETTE.len()],
        escape_xml(&caption)
    );
    ImageArtifact::from_bytes("image/svg+xml", svg.as_bytes())
}

/// One second of 8 kHz mono silence.
fn silent_wav() -> Vec<u8> {
    const SAMPLE_RATE: u32 = 8_000;
    let data_len = SAMPLE_RATE;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&8u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 128);
    wav
}

fn manifest_artifact(manifest: &serde_json::Value) -> VideoArtifact {
    VideoArtifact::from_bytes("application/json", manifest.to_string().as_bytes())
}

#[async_trait]
impl RemoteGenerationPort for OfflineGenerator {
    async fn generate_script(&self, topic: &str) -> Result<String, ApiError> {
        let topic = topic.trim();
        Ok(format!(
            "Ever wondered about {topic}?\n\
             Here is the one thing most people miss about {topic}.\n\
             It changes how you see {topic} every day.\n\
             Follow for more on {topic}."
        ))
    }

    async fn generate_images_for_paragraph(
        &self,
        paragraph: &str,
    ) -> Result<Vec<ImageArtifact>, ApiError> {
        Ok((0..self.images_per_paragraph)
            .map(|variant| svg_card(paragraph, variant))
            .collect())
    }

    async fn generate_audio(&self, _script: &Script) -> Result<AudioArtifact, ApiError> {
        Ok(AudioArtifact::from_bytes("audio/wav", &silent_wav()))
    }

    async fn generate_video(&self, request: VideoRequest<'_>) -> Result<VideoSubmission, ApiError> {
        let manifest = serde_json::json!({
            "generator": self.name,
            "paragraphs": request.script.paragraphs(),
            "image_count": request.images.len(),
            "audio": request.audio.to_string(),
        });
        if self.polls_until_done == 0 {
            return Ok(VideoSubmission::Ready(manifest_artifact(&manifest)));
        }
        let id = format!("offline-video-{}", self.next_job.fetch_add(1, Ordering::Relaxed));
        self.jobs
            .lock()
            .insert(id.clone(), PendingVideo { polls: 0, manifest });
        Ok(VideoSubmission::Job(JobHandle::new(id)))
    }

    async fn poll_video_job(&self, handle: &JobHandle) -> Result<JobStatus, ApiError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .pending
            .get_mut(handle.as_str())
            .ok_or_else(|| ApiError::Remote(format!("unknown video job {}", handle)))?;
        job.polls += 1;
        if job.polls < self.polls_until_done {
            return Ok(JobStatus::Pending);
        }
        let video = manifest_artifact(&job.manifest);
        jobs.remove(handle.as_str());
        Ok(JobStatus::Done(video))
    }

    async fn refine_image(
        &self,
        prompt: &str,
        base: Option<&ImageArtifact>,
    ) -> Result<ImageArtifact, ApiError> {
        let variant = base.map(|b| b.as_str().len()).unwrap_or(0);
        Ok(svg_card(prompt, variant))
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
