//! Video generation tasks against the Seedance endpoint.
//!
//! Video jobs are asynchronous: [`create_task`] returns a [`JobHandle`] and
//! the task is then either left alone or driven to a terminal status by
//! [`crate::modules::poll::wait_for_completion`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capabilities::{self, Param};
use crate::client::ArkClient;
use crate::error::{GenerationError, RemoteError};
use crate::logging;
use crate::modules::poll::{PollConfig, TaskStatusSource, wait_for_completion};
use crate::utils::pretty_json;

pub const TASKS_ENDPOINT: &str = "/api/v3/contents/generations/tasks";
pub const MAX_REFERENCE_IMAGES: usize = 4;

// === Option Types ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoResolution {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoRatio {
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "21:9")]
    UltraWide,
    #[serde(rename = "adaptive")]
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTier {
    Default,
    Flex,
}

/// Caller-supplied video options. `None` (or an empty list) means unset.
#[derive(Debug, Clone, Default)]
pub struct VideoGenerateOptions {
    pub first_frame: Option<String>,
    pub last_frame: Option<String>,
    pub reference_images: Vec<String>,
    pub draft_task_id: Option<String>,
    pub resolution: Option<VideoResolution>,
    pub ratio: Option<VideoRatio>,
    pub duration: Option<i32>,
    pub frames: Option<u32>,
    pub seed: Option<i64>,
    pub camera_fixed: Option<bool>,
    pub watermark: Option<bool>,
    pub generate_audio: Option<bool>,
    pub draft: Option<bool>,
    pub service_tier: Option<ServiceTier>,
    pub execution_expires_after: Option<u64>,
    pub callback_url: Option<String>,
    pub return_last_frame: Option<bool>,
}

// === Wire Types ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    FirstFrame,
    LastFrame,
    ReferenceImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTaskRef {
    pub id: String,
}

/// One entry of the `content` sequence. Order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<ImageRole>,
    },
    DraftTask {
        draft_task: DraftTaskRef,
    },
}

impl ContentItem {
    fn image(url: &str, role: ImageRole) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: url.to_string(),
            },
            role: Some(role),
        }
    }
}

/// Wire body for `POST /api/v3/contents/generations/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTaskCreateRequest {
    pub model: String,
    pub content: Vec<ContentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_last_frame: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<ServiceTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_expires_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<VideoResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<VideoRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_fixed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Queued,
    Running,
    Cancelled,
    Succeeded,
    Failed,
    Expired,
    /// A status this client does not know yet; polled like a pending one.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Cancelled => "cancelled",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Expired
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{id, status}` returned when a task is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    #[serde(default)]
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_frame_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoUsage {
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Full task record returned by a status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTaskRecord {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub content: Option<VideoOutput>,
    #[serde(default)]
    pub error: Option<RemoteError>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub ratio: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub frames: Option<u64>,
    #[serde(default)]
    pub framespersecond: Option<u64>,
    #[serde(default)]
    pub service_tier: Option<String>,
    #[serde(default)]
    pub execution_expires_after: Option<u64>,
    #[serde(default)]
    pub generate_audio: Option<bool>,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub draft_task_id: Option<String>,
    #[serde(default)]
    pub usage: Option<VideoUsage>,
}

impl VideoTaskRecord {
    #[cfg(test)]
    pub fn with_status(id: &str, status: TaskStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn video_url(&self) -> Option<&str> {
        self.content.as_ref().and_then(|c| c.video_url.as_deref())
    }

    #[must_use]
    pub fn last_frame_url(&self) -> Option<&str> {
        self.content.as_ref().and_then(|c| c.last_frame_url.as_deref())
    }
}

/// Result of [`generate_video`]: either the handle of a task left running,
/// or the terminal record when the caller chose to wait.
#[derive(Debug, Clone)]
pub enum VideoOutcome {
    Submitted(JobHandle),
    Finished(VideoTaskRecord),
}

// === Request Assembly ===

/// Assemble the task body. Content order is text, first frame, last frame,
/// reference images, then the draft task.
pub fn build_video_request(
    prompt: &str,
    model: &str,
    options: &VideoGenerateOptions,
) -> Result<VideoTaskCreateRequest, GenerationError> {
    if options.reference_images.len() > MAX_REFERENCE_IMAGES {
        return Err(GenerationError::invalid_input(format!(
            "At most {MAX_REFERENCE_IMAGES} reference images are supported, got {}",
            options.reference_images.len()
        )));
    }

    let mut content = vec![ContentItem::Text {
        text: prompt.to_string(),
    }];
    if let Some(url) = &options.first_frame {
        content.push(ContentItem::image(url, ImageRole::FirstFrame));
    }
    if let Some(url) = &options.last_frame {
        content.push(ContentItem::image(url, ImageRole::LastFrame));
    }
    content.extend(
        options
            .reference_images
            .iter()
            .map(|url| ContentItem::image(url, ImageRole::ReferenceImage)),
    );
    if let Some(id) = &options.draft_task_id {
        content.push(ContentItem::DraftTask {
            draft_task: DraftTaskRef { id: id.clone() },
        });
    }

    Ok(VideoTaskCreateRequest {
        model: model.to_string(),
        content,
        callback_url: options.callback_url.clone(),
        return_last_frame: options.return_last_frame,
        service_tier: options.service_tier,
        execution_expires_after: options.execution_expires_after,
        generate_audio: options.generate_audio,
        draft: options.draft,
        resolution: options.resolution,
        ratio: options.ratio,
        duration: options.duration,
        frames: options.frames,
        seed: options.seed,
        camera_fixed: options.camera_fixed,
        watermark: options.watermark,
    })
}

#[must_use]
pub fn requested_params(request: &VideoTaskCreateRequest) -> Vec<Param> {
    let mut params = Vec::new();
    let has_role = |wanted: ImageRole| {
        request.content.iter().any(|item| {
            matches!(item, ContentItem::ImageUrl { role: Some(role), .. } if *role == wanted)
        })
    };
    if has_role(ImageRole::FirstFrame) {
        params.push(Param::FirstFrame);
    }
    if has_role(ImageRole::LastFrame) {
        params.push(Param::LastFrame);
    }
    if has_role(ImageRole::ReferenceImage) {
        params.push(Param::ReferenceImages);
    }
    if request
        .content
        .iter()
        .any(|item| matches!(item, ContentItem::DraftTask { .. }))
    {
        params.push(Param::DraftTask);
    }
    if request.generate_audio.is_some() {
        params.push(Param::GenerateAudio);
    }
    if request.draft.is_some() {
        params.push(Param::Draft);
    }
    if request.seed.is_some() {
        params.push(Param::Seed);
    }
    params
}

// === API Calls ===

/// Create a video task. Input errors are raised before any network call.
pub async fn create_task(
    client: &ArkClient,
    prompt: &str,
    model: &str,
    options: &VideoGenerateOptions,
) -> Result<JobHandle, GenerationError> {
    let request = build_video_request(prompt, model, options)?;
    if let Some(message) = capabilities::advisory(model, &requested_params(&request)) {
        logging::warn(message);
    }
    logging::info(format!("Video task request body:\n{}", pretty_json(&request)));

    Ok(client.post_json(TASKS_ENDPOINT, &request).await?)
}

/// Reject task ids that would leave the task resource once placed in the path.
fn validate_task_id(task_id: &str) -> Result<(), GenerationError> {
    if task_id.trim().is_empty() {
        return Err(GenerationError::invalid_input("taskId must not be empty"));
    }
    let forbidden = |c: char| {
        matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
    };
    if task_id.contains(forbidden) || task_id == "." || task_id == ".." {
        return Err(GenerationError::invalid_input(format!(
            "taskId must be a single path segment, got {task_id:?}"
        )));
    }
    Ok(())
}

/// Fetch the current record of a task. The id is checked before any request.
pub async fn query_task(
    client: &ArkClient,
    task_id: &str,
) -> Result<VideoTaskRecord, GenerationError> {
    validate_task_id(task_id)?;
    Ok(client
        .get_json(&format!("{TASKS_ENDPOINT}/{task_id}"))
        .await?)
}

#[async_trait]
impl TaskStatusSource for ArkClient {
    async fn query_task(&self, task_id: &str) -> Result<VideoTaskRecord, GenerationError> {
        query_task(self, task_id).await
    }
}

/// Create a task and, when `wait` is given, poll it to a terminal status.
pub async fn generate_video(
    client: &ArkClient,
    prompt: &str,
    model: &str,
    options: &VideoGenerateOptions,
    wait: Option<PollConfig>,
) -> Result<VideoOutcome, GenerationError> {
    let handle = create_task(client, prompt, model, options).await?;
    logging::info(format!("Created video task {} ({})", handle.id, handle.status));

    let Some(poll) = wait else {
        return Ok(VideoOutcome::Submitted(handle));
    };
    let record = wait_for_completion(client, &handle.id, &poll).await?;
    Ok(VideoOutcome::Finished(record))
}
