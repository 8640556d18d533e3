//! Core artifact types passed between pipeline stages.
//!
//! Artifacts are opaque references produced by the remote generation service:
//! usually `data:` URIs carrying base64 payloads, sometimes plain URLs. The
//! pipeline never inspects them beyond moving them between stages.

use crate::error::ApiError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! artifact_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(reference: impl Into<String>) -> Self {
                Self(reference.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }

            /// Build a `data:` URI reference from raw bytes.
            pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
                Self(encode_data_uri(mime, bytes))
            }

            /// Decode a `data:` URI reference. URL references are rejected.
            pub fn decode(&self) -> Result<DecodedArtifact, ApiError> {
                decode_data_uri(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&summarize_reference(&self.0))
            }
        }
    };
}

artifact_ref!(
    /// One generated image (thumbnail or paragraph illustration).
    ImageArtifact
);
artifact_ref!(
    /// Narration audio for the whole script.
    AudioArtifact
);
artifact_ref!(
    /// Final rendered video.
    VideoArtifact
);

/// Opaque token for an in-progress remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded `data:` URI payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedArtifact {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DecodedArtifact {
    /// File extension matching the mime type, `bin` when unknown.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            "audio/mpeg" => "mp3",
            "audio/wav" | "audio/x-wav" => "wav",
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "text/plain" => "txt",
            "application/json" => "json",
            _ => "bin",
        }
    }
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

pub fn decode_data_uri(reference: &str) -> Result<DecodedArtifact, ApiError> {
    let rest = reference
        .strip_prefix("data:")
        .ok_or_else(|| ApiError::InvalidArtifact("reference is not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ApiError::InvalidArtifact("data URI has no payload".to_string()))?;
    let (mime, is_base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let bytes = if is_base64 {
        STANDARD
            .decode(payload)
            .map_err(|e| ApiError::InvalidArtifact(format!("invalid base64 payload: {}", e)))?
    } else {
        payload.as_bytes().to_vec()
    };
    let mime = if mime.is_empty() { "text/plain" } else { mime };
    Ok(DecodedArtifact {
        mime: mime.to_string(),
        bytes,
    })
}

/// Short printable form of a reference; data URIs are reduced to mime and size.
fn summarize_reference(reference: &str) -> String {
    if let Some(rest) = reference.strip_prefix("data:") {
        let header = rest.split(',').next().unwrap_or_default();
        let mime = header.trim_end_matches(";base64");
        return format!("data:{} ({} bytes encoded)", mime, reference.len());
    }
    reference.to_string()
}
