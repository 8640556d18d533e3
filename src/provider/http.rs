//! Hosted generation client speaking the OpenAI-compatible REST surface.

use super::{JobStatus, ProviderConfig, RemoteGenerationPort, VideoRequest, VideoSubmission};
use crate::error::ApiError;
use crate::pipeline::script::Script;
use crate::types::{
    decode_data_uri, encode_data_uri, AudioArtifact, DecodedArtifact, ImageArtifact, JobHandle,
    VideoArtifact,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SCRIPT_SYSTEM_PROMPT: &str = "You write narration for short-form vertical videos. \
Answer with 4 to 8 short paragraphs, one paragraph per line, no headings, no numbering, \
no blank lines.";

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn map_http_error(error: reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        match status.as_u16() {
            401 => ApiError::ProviderAuthFailed(format!("Authentication failed: {}", error)),
            429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", error)),
            404 => ApiError::ProviderModelNotFound(format!("Model not found: {}", error)),
            _ => ApiError::ProviderRequestFailed(format!(
                "Request failed with status {}: {}",
                status, error
            )),
        }
    } else if error.is_timeout() {
        ApiError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        ApiError::ProviderError(format!("HTTP error: {}", error))
    }
}

fn map_status(status: u16, body: String) -> ApiError {
    match status {
        401 => ApiError::ProviderAuthFailed(format!("Authentication failed: {}", body)),
        429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", body)),
        404 => ApiError::ProviderModelNotFound(format!("Model not found: {}", body)),
        _ => ApiError::ProviderRequestFailed(format!("Request failed ({}): {}", status, body)),
    }
}

fn build_provider_http_client(request_timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

/// Body for `POST videos`. Illustrations keep paragraph order; references are data URIs or URLs.
#[derive(Debug, Serialize)]
struct VideoCreateRequest<'a> {
    model: &'a str,
    prompt: String,
    input_references: Vec<&'a str>,
    audio_reference: &'a str,
}

#[derive(Debug, Deserialize)]
struct VideoJob {
    id: String,
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<VideoJobError>,
}

#[derive(Debug, Deserialize)]
struct VideoJobError {
    message: String,
}

/// OpenAI-compatible generation client
pub struct HttpGenerationClient {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    text_model: String,
    image_model: String,
    speech_model: String,
    voice: String,
    video_model: String,
    images_per_paragraph: u32,
}

impl HttpGenerationClient {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, ApiError> {
        let client = build_provider_http_client(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self {
            client,
            name: config.provider_name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            speech_model: config.speech_model.clone(),
            voice: config.voice.clone(),
            video_model: config.video_model.clone(),
            images_per_paragraph: config.images_per_paragraph,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// gpt-image models always answer with base64 and reject `response_format`.
    fn image_response_format(&self) -> Option<&'static str> {
        if self.image_model.starts_with("gpt-image") {
            None
        } else {
            Some("b64_json")
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(map_http_error)?;
        check_status(response).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn post_multipart(&self, path: &str, form: Form) -> Result<Response, ApiError> {
        self.send(self.client.post(self.url(path)).multipart(form)).await
    }

    async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.send(self.client.get(self.url(path))).await
    }

    /// Raw bytes behind an image reference: decoded inline, downloaded when hosted.
    async fn image_bytes(&self, image: &ImageArtifact) -> Result<DecodedArtifact, ApiError> {
        if image.as_str().starts_with("data:") {
            return decode_data_uri(image.as_str());
        }
        let response = self
            .client
            .get(image.as_str())
            .send()
            .await
            .map_err(map_http_error)?;
        let response = check_status(response).await?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await.map_err(map_http_error)?;
        Ok(DecodedArtifact {
            mime,
            bytes: bytes.to_vec(),
        })
    }

    async fn edit_image(&self, prompt: &str, base: &ImageArtifact) -> Result<Response, ApiError> {
        let source = self.image_bytes(base).await?;
        let file_name = format!("base.{}", source.extension());
        let image = Part::bytes(source.bytes)
            .file_name(file_name)
            .mime_str(&source.mime)
            .map_err(|e| ApiError::InvalidArtifact(format!("unusable image type: {}", e)))?;
        let mut form = Form::new()
            .text("model", self.image_model.clone())
            .text("prompt", prompt.to_string())
            .text("n", "1")
            .part("image", image);
        if let Some(format) = self.image_response_format() {
            form = form.text("response_format", format);
        }
        self.post_multipart("images/edits", form).await
    }

    async fn fetch_video_content(&self, job: &VideoJob) -> Result<VideoArtifact, ApiError> {
        if let Some(url) = &job.url {
            return Ok(VideoArtifact::new(url.clone()));
        }
        let response = self.get(&format!("videos/{}/content", job.id)).await?;
        let bytes = response.bytes().await.map_err(map_http_error)?;
        Ok(VideoArtifact::from_bytes("video/mp4", &bytes))
    }

    async fn job_status(&self, job: VideoJob) -> Result<JobStatus, ApiError> {
        match job.status.as_str() {
            "completed" | "succeeded" => Ok(JobStatus::Done(self.fetch_video_content(&job).await?)),
            "failed" | "cancelled" => Ok(JobStatus::Failed(
                job.error
                    .map(|e| e.message)
                    .unwrap_or_else(|| format!("video job {}", job.status)),
            )),
            _ => Ok(JobStatus::Pending),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(map_status(status, error_text))
}

async fn parse_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))
}

fn image_artifacts(response: ImageResponse) -> Result<Vec<ImageArtifact>, ApiError> {
    let images: Vec<ImageArtifact> = response
        .data
        .into_iter()
        .filter_map(|item| match (item.b64_json, item.url) {
            (Some(b64), _) => Some(ImageArtifact::new(format!("data:image/png;base64,{}", b64))),
            (None, Some(url)) => Some(ImageArtifact::new(url)),
            (None, None) => None,
        })
        .collect();
    if images.is_empty() {
        return Err(ApiError::ProviderError("No images in response".to_string()));
    }
    Ok(images)
}

fn video_prompt(request: &VideoRequest<'_>) -> String {
    format!(
        "Short vertical video narrated by the following script ({} illustrations supplied):\n{}",
        request.images.len(),
        request.script.full_text()
    )
}

#[async_trait]
impl RemoteGenerationPort for HttpGenerationClient {
    async fn generate_script(&self, topic: &str) -> Result<String, ApiError> {
        let request = ChatCompletionRequest {
            model: &self.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SCRIPT_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: topic,
                },
            ],
        };
        let completion: ChatCompletionResponse =
            parse_json(self.post_json("chat/completions", &request).await?).await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ApiError::ProviderError("No choices in response".to_string()))
    }

    async fn generate_images_for_paragraph(
        &self,
        paragraph: &str,
    ) -> Result<Vec<ImageArtifact>, ApiError> {
        let request = ImageGenerationRequest {
            model: &self.image_model,
            prompt: paragraph,
            n: self.images_per_paragraph,
            response_format: self.image_response_format(),
        };
        let response = parse_json(self.post_json("images/generations", &request).await?).await?;
        image_artifacts(response)
    }

    async fn generate_audio(&self, script: &Script) -> Result<AudioArtifact, ApiError> {
        let input = script.full_text();
        let request = SpeechRequest {
            model: &self.speech_model,
            voice: &self.voice,
            input: &input,
            response_format: "mp3",
        };
        let response = self.post_json("audio/speech", &request).await?;
        let bytes = response.bytes().await.map_err(map_http_error)?;
        Ok(AudioArtifact::new(encode_data_uri("audio/mpeg", &bytes)))
    }

    async fn generate_video(&self, request: VideoRequest<'_>) -> Result<VideoSubmission, ApiError> {
        let body = VideoCreateRequest {
            model: &self.video_model,
            prompt: video_prompt(&request),
            input_references: request.images.iter().map(ImageArtifact::as_str).collect(),
            audio_reference: request.audio.as_str(),
        };
        let job: VideoJob = parse_json(self.post_json("videos", &body).await?).await?;
        debug!(job_id = %job.id, status = %job.status, "Video job submitted");
        let handle = JobHandle::new(job.id.clone());
        match self.job_status(job).await? {
            JobStatus::Done(video) => Ok(VideoSubmission::Ready(video)),
            JobStatus::Failed(message) => Err(ApiError::Remote(message)),
            JobStatus::Pending => Ok(VideoSubmission::Job(handle)),
        }
    }

    async fn poll_video_job(&self, handle: &JobHandle) -> Result<JobStatus, ApiError> {
        let job: VideoJob = parse_json(self.get(&format!("videos/{}", handle)).await?).await?;
        self.job_status(job).await
    }

    async fn refine_image(
        &self,
        prompt: &str,
        base: Option<&ImageArtifact>,
    ) -> Result<ImageArtifact, ApiError> {
        let response = match base {
            Some(base) => self.edit_image(prompt, base).await?,
            None => {
                let request = ImageGenerationRequest {
                    model: &self.image_model,
                    prompt,
                    n: 1,
                    response_format: self.image_response_format(),
                };
                self.post_json("images/generations", &request).await?
            }
        };
        let mut images = image_artifacts(parse_json(response).await?)?;
        Ok(images.swap_remove(0))
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
