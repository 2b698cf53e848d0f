//! Media generation tools exposed over MCP.
//!
//! Tools:
//! - `generate_image` / `image_to_image`: Seedream image generation
//! - `download_image`: authenticated fetch of a generated asset to disk
//! - `generate_video` / `query_video_task`: Seedance video tasks

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::RemoteError;
use crate::modules::image::{
    self, ImageGenerateOptions, ImageGenerationResponse, ImageUsage, OptimizePromptMode,
    ResponseFormat, SequentialImageGeneration,
};
use crate::modules::video::{
    self, ServiceTier, VideoGenerateOptions, VideoOutcome, VideoRatio, VideoResolution,
    VideoTaskRecord, VideoUsage,
};
use crate::utils::{extension_from_content_type, timestamped_filename, write_bytes};

use super::spec::{
    ToolCapability, ToolContext, ToolError, ToolResult, ToolSpec, check_range, optional_str,
    parse_args, required_str,
};

/// Every media tool, in `tools/list` order.
#[must_use]
pub fn media_tools() -> Vec<Arc<dyn ToolSpec>> {
    vec![
        Arc::new(GenerateImageTool),
        Arc::new(ImageToImageTool),
        Arc::new(DownloadImageTool),
        Arc::new(GenerateVideoTool),
        Arc::new(QueryVideoTaskTool),
    ]
}

const MAX_IMAGES: u32 = 15;
const SEED_MAX_IMAGE: i64 = 2_147_483_647;
const SEED_MAX_VIDEO: i64 = 4_294_967_295;
const TASK_CREATED_MESSAGE: &str =
    "Video generation task created. Use query_video_task to check status.";

static SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // 2K / 4K presets, adaptive, or explicit WIDTHxHEIGHT
    Regex::new(r"^(?:[124]K|adaptive|\d{2,5}x\d{2,5})$").expect("size pattern is valid")
});

// === Image arguments ===

#[derive(Debug, Deserialize)]
struct ImageArgs {
    prompt: String,
    model: Option<String>,
    size: Option<String>,
    sequential_image_generation: Option<SequentialImageGeneration>,
    max_images: Option<u32>,
    seed: Option<i64>,
    guidance_scale: Option<f64>,
    response_format: Option<ResponseFormat>,
    watermark: Option<bool>,
    optimize_prompt_mode: Option<OptimizePromptMode>,
    stream: Option<bool>,
    count: Option<u32>,
}

impl ImageArgs {
    fn validate(&self) -> Result<(), ToolError> {
        if self.prompt.trim().is_empty() {
            return Err(ToolError::missing_field("prompt"));
        }
        check_range("max_images", self.max_images, 1, MAX_IMAGES)?;
        check_range("count", self.count, 1, MAX_IMAGES)?;
        check_range("seed", self.seed, -1, SEED_MAX_IMAGE)?;
        check_range("guidance_scale", self.guidance_scale, 1.0, 10.0)?;
        if let Some(size) = &self.size
            && !SIZE_PATTERN.is_match(size)
        {
            return Err(ToolError::invalid_input(format!(
                "size must be 2K, 4K, adaptive or WIDTHxHEIGHT, got {size}"
            )));
        }
        Ok(())
    }

    fn into_options(self) -> (String, Option<String>, ImageGenerateOptions) {
        let options = ImageGenerateOptions {
            size: self.size,
            seed: self.seed,
            sequential_image_generation: self.sequential_image_generation,
            max_images: self.max_images,
            count: self.count,
            stream: self.stream,
            guidance_scale: self.guidance_scale,
            response_format: self.response_format,
            watermark: self.watermark,
            optimize_prompt_mode: self.optimize_prompt_mode,
            image_url: None,
            image_urls: Vec::new(),
        };
        (self.prompt, self.model, options)
    }
}

#[derive(Debug, Deserialize)]
struct ImageToImageArgs {
    #[serde(flatten)]
    base: ImageArgs,
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(rename = "imageUrls", default)]
    image_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revised_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RemoteError>,
}

#[derive(Debug, Serialize)]
struct ImageToolOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    created: i64,
    images: Vec<ImageEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<ImageUsage>,
}

impl From<ImageGenerationResponse> for ImageToolOutput {
    fn from(response: ImageGenerationResponse) -> Self {
        Self {
            model: response.model,
            created: response.created,
            images: response
                .data
                .into_iter()
                .map(|img| ImageEntry {
                    url: img.url,
                    base64: img.b64_json,
                    size: img.size,
                    revised_prompt: img.revised_prompt,
                    error: img.error,
                })
                .collect(),
            usage: response.usage,
        }
    }
}

async fn run_image(
    context: &ToolContext,
    prompt: &str,
    model: Option<String>,
    options: &ImageGenerateOptions,
) -> Result<ToolResult, ToolError> {
    let model = model.unwrap_or_else(|| context.image_model.clone());
    let response = image::generate(&context.client, prompt, &model, options).await?;
    ToolResult::json(&ImageToolOutput::from(response))
        .map_err(|e| ToolError::execution_failed(e.to_string()))
}

fn image_properties() -> Value {
    json!({
        "prompt": {
            "type": "string",
            "description": "Text prompt for image generation (Chinese or English, recommended under 300 characters)"
        },
        "model": {
            "type": "string",
            "description": "Model ID (default: doubao-seedream-4-5-251128). Others: doubao-seedream-4-0-250428, doubao-seedream-3-0-t2i, doubao-seededit-3-0-i2i"
        },
        "size": {
            "type": "string",
            "description": "\"2K\", \"4K\", \"WIDTHxHEIGHT\" (e.g. \"2560x1440\") or \"adaptive\" (Seededit 3.0 i2i only)"
        },
        "sequential_image_generation": {
            "type": "string",
            "enum": ["auto", "disabled"],
            "description": "\"auto\" lets the model return a set of related images; \"disabled\" returns one image"
        },
        "max_images": {
            "type": "integer",
            "minimum": 1,
            "maximum": 15,
            "description": "Maximum number of images in a sequential set. Enables sequential generation when the mode is unset"
        },
        "seed": {
            "type": "integer",
            "minimum": -1,
            "maximum": SEED_MAX_IMAGE,
            "description": "Random seed (3.0 models only, -1 for random)"
        },
        "guidance_scale": {
            "type": "number",
            "minimum": 1,
            "maximum": 10,
            "description": "Prompt weight (3.0 models only)"
        },
        "response_format": {
            "type": "string",
            "enum": ["url", "b64_json"],
            "description": "\"url\" returns a link valid for 24h, \"b64_json\" returns base64 (default: url)"
        },
        "watermark": {
            "type": "boolean",
            "description": "Add an \"AI Generated\" watermark (default: true)"
        },
        "optimize_prompt_mode": {
            "type": "string",
            "enum": ["standard"],
            "description": "Prompt optimization mode (4.5/4.0 only)"
        },
        "stream": {
            "type": "boolean",
            "description": "Stream partial results (4.5/4.0 only, default: false)"
        },
        "count": {
            "type": "integer",
            "minimum": 1,
            "maximum": 15,
            "description": "(Deprecated) Alias for max_images"
        }
    })
}

// === generate_image ===

pub struct GenerateImageTool;

#[async_trait]
impl ToolSpec for GenerateImageTool {
    fn name(&self) -> &'static str {
        "generate_image"
    }

    fn description(&self) -> &'static str {
        "Generate images from text prompts using Doubao Seedream models. \
         Set sequential_image_generation=\"auto\" with max_images to generate a set of related images (up to 15). \
         Returns image URLs (valid for 24 hours) or base64 data."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": image_properties(),
            "required": ["prompt"]
        })
    }

    fn capabilities(&self) -> Vec<ToolCapability> {
        vec![ToolCapability::Network, ToolCapability::Billable]
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let args: ImageArgs = parse_args(input)?;
        args.validate()?;
        let (prompt, model, options) = args.into_options();
        run_image(context, &prompt, model, &options).await
    }
}

// === image_to_image ===

pub struct ImageToImageTool;

#[async_trait]
impl ToolSpec for ImageToImageTool {
    fn name(&self) -> &'static str {
        "image_to_image"
    }

    fn description(&self) -> &'static str {
        "Generate images from reference images using Doubao Seedream models. \
         Use imageUrl for single-image editing or imageUrls (2-14) for multi-image fusion; \
         imageUrls wins when both are given. Images may be URLs or data:image/<fmt>;base64 URIs."
    }

    fn input_schema(&self) -> Value {
        let mut properties = image_properties();
        if let Some(map) = properties.as_object_mut() {
            map.insert(
                "imageUrl".to_string(),
                json!({
                    "type": "string",
                    "description": "Single reference image URL or base64 data URI"
                }),
            );
            map.insert(
                "imageUrls".to_string(),
                json!({
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 2,
                    "maxItems": 14,
                    "description": "Multiple reference images for fusion (2-14, 4.5/4.0 only)"
                }),
            );
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": ["prompt"]
        })
    }

    fn capabilities(&self) -> Vec<ToolCapability> {
        vec![ToolCapability::Network, ToolCapability::Billable]
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let args: ImageToImageArgs = parse_args(input)?;
        args.base.validate()?;
        if !args.image_urls.is_empty() && !(2..=14).contains(&args.image_urls.len()) {
            return Err(ToolError::invalid_input(format!(
                "imageUrls must contain 2 to 14 images, got {}",
                args.image_urls.len()
            )));
        }
        if args.image_urls.is_empty() && args.image_url.is_none() {
            return Ok(ToolResult::error(
                "Either imageUrl or imageUrls must be provided",
            ));
        }

        let (prompt, model, mut options) = args.base.into_options();
        options.image_url = args.image_url;
        options.image_urls = args.image_urls;
        run_image(context, &prompt, model, &options).await
    }
}

// === download_image ===

pub struct DownloadImageTool;

#[async_trait]
impl ToolSpec for DownloadImageTool {
    fn name(&self) -> &'static str {
        "download_image"
    }

    fn description(&self) -> &'static str {
        "Download an image by URL and save it to a local file. The request carries the \
         Authorization header (Bearer ARK_API_KEY). Relative paths are saved under the output directory."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Image URL to download (typically a url returned by generate_image), or a data:image/<fmt>;base64 URI"
                },
                "filePath": {
                    "type": "string",
                    "description": "Local path to save to (e.g. ./downloads/cat.png). Defaults to a timestamped file in the output directory"
                }
            },
            "required": ["url"]
        })
    }

    fn capabilities(&self) -> Vec<ToolCapability> {
        vec![ToolCapability::Network, ToolCapability::WritesFiles]
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let url = required_str(&input, "url")?;
        let payload = image::download_image(&context.client, url).await?;

        let raw_path = match optional_str(&input, "filePath").filter(|p| !p.trim().is_empty()) {
            Some(path) => path.to_string(),
            None => {
                let extension = payload
                    .content_type
                    .as_deref()
                    .and_then(extension_from_content_type)
                    .unwrap_or("png");
                timestamped_filename("image", extension)
            }
        };
        let path = context.resolve_path(&raw_path)?;
        write_bytes(&path, &payload.bytes)
            .map_err(|e| ToolError::execution_failed(format!("{e:#}")))?;

        Ok(ToolResult::success(json!({
            "url": url,
            "filePath": path.display().to_string(),
            "contentType": payload.content_type,
            "bytes": payload.bytes.len(),
        })))
    }
}

// === generate_video ===

#[derive(Debug, Deserialize)]
struct VideoArgs {
    prompt: String,
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(rename = "firstFrameImage")]
    first_frame_image: Option<String>,
    #[serde(rename = "endImageUrl")]
    end_image_url: Option<String>,
    #[serde(rename = "lastFrameImage")]
    last_frame_image: Option<String>,
    #[serde(rename = "referenceImages", default)]
    reference_images: Vec<String>,
    #[serde(rename = "draftTaskId")]
    draft_task_id: Option<String>,
    model: Option<String>,
    resolution: Option<VideoResolution>,
    ratio: Option<VideoRatio>,
    duration: Option<i32>,
    frames: Option<u32>,
    seed: Option<i64>,
    generate_audio: Option<bool>,
    draft: Option<bool>,
    watermark: Option<bool>,
    camera_fixed: Option<bool>,
    return_last_frame: Option<bool>,
    service_tier: Option<ServiceTier>,
    execution_expires_after: Option<u64>,
    callback_url: Option<String>,
    #[serde(rename = "waitForCompletion", default)]
    wait_for_completion: bool,
    #[serde(rename = "maxAttempts")]
    max_attempts: Option<u32>,
    #[serde(rename = "pollInterval")]
    poll_interval: Option<u64>,
}

impl VideoArgs {
    fn validate(&self) -> Result<(), ToolError> {
        if self.prompt.trim().is_empty() {
            return Err(ToolError::missing_field("prompt"));
        }
        if let Some(duration) = self.duration
            && duration != -1
        {
            check_range("duration", Some(duration), 2, 12)?;
        }
        check_range("frames", self.frames, 29, 289)?;
        check_range("seed", self.seed, -1, SEED_MAX_VIDEO)?;
        check_range(
            "execution_expires_after",
            self.execution_expires_after,
            3600,
            259_200,
        )?;
        if let Some(url) = &self.callback_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ToolError::invalid_input(format!(
                "callback_url must be an http(s) URL, got {url}"
            )));
        }
        Ok(())
    }

    fn options(&self) -> VideoGenerateOptions {
        VideoGenerateOptions {
            first_frame: self
                .first_frame_image
                .clone()
                .or_else(|| self.image_url.clone()),
            last_frame: self
                .last_frame_image
                .clone()
                .or_else(|| self.end_image_url.clone()),
            reference_images: self.reference_images.clone(),
            draft_task_id: self.draft_task_id.clone(),
            resolution: self.resolution,
            ratio: self.ratio,
            duration: self.duration,
            frames: self.frames,
            seed: self.seed,
            camera_fixed: self.camera_fixed,
            watermark: self.watermark,
            generate_audio: self.generate_audio,
            draft: self.draft,
            service_tier: self.service_tier,
            execution_expires_after: self.execution_expires_after,
            callback_url: self.callback_url.clone(),
            return_last_frame: self.return_last_frame,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FinishedVideoOutput {
    task_id: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_frame_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<VideoUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RemoteError>,
}

impl From<VideoTaskRecord> for FinishedVideoOutput {
    fn from(record: VideoTaskRecord) -> Self {
        Self {
            video_url: record.video_url().map(str::to_string),
            last_frame_url: record.last_frame_url().map(str::to_string),
            task_id: record.id,
            status: record.status.to_string(),
            resolution: record.resolution,
            ratio: record.ratio,
            duration: record.duration,
            frames: record.frames,
            seed: record.seed,
            usage: record.usage,
            error: record.error,
        }
    }
}

pub struct GenerateVideoTool;

#[async_trait]
impl ToolSpec for GenerateVideoTool {
    fn name(&self) -> &'static str {
        "generate_video"
    }

    fn description(&self) -> &'static str {
        "Generate videos from text or images using Doubao Seedance models. Supports text-to-video, \
         first-frame and first+last-frame image-to-video, 1-4 reference images (Seedance 1.0 lite i2v) \
         and turning a Seedance 1.5 pro draft into a final video via draftTaskId. Returns a task id; \
         set waitForCompletion to poll until the task finishes."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Text prompt for video generation (recommended under 500 characters)"
                },
                "imageUrl": {
                    "type": "string",
                    "description": "[First frame] image URL or base64 data URI"
                },
                "firstFrameImage": {
                    "type": "string",
                    "description": "Alias of imageUrl; wins when both are set"
                },
                "endImageUrl": {
                    "type": "string",
                    "description": "[Last frame] image URL or base64 data URI"
                },
                "lastFrameImage": {
                    "type": "string",
                    "description": "Alias of endImageUrl; wins when both are set"
                },
                "referenceImages": {
                    "type": "array",
                    "items": { "type": "string" },
                    "maxItems": 4,
                    "description": "[Reference images] 1-4 image URLs (Seedance 1.0 lite i2v)"
                },
                "draftTaskId": {
                    "type": "string",
                    "description": "Task id of a Seedance 1.5 pro draft to render as a final video"
                },
                "model": {
                    "type": "string",
                    "description": "Model ID (default: doubao-seedance-1-5-pro-251215)"
                },
                "resolution": { "type": "string", "enum": ["480p", "720p", "1080p"] },
                "ratio": {
                    "type": "string",
                    "enum": ["16:9", "4:3", "1:1", "3:4", "9:16", "21:9", "adaptive"]
                },
                "duration": {
                    "type": "integer",
                    "minimum": -1,
                    "maximum": 12,
                    "description": "Seconds (2-12); -1 lets Seedance 1.5 pro choose"
                },
                "frames": {
                    "type": "integer",
                    "minimum": 29,
                    "maximum": 289,
                    "description": "Frame count (25+4n). Takes priority over duration"
                },
                "seed": { "type": "integer", "minimum": -1, "maximum": SEED_MAX_VIDEO },
                "generate_audio": {
                    "type": "boolean",
                    "description": "Generate synchronized audio (Seedance 1.5 pro)"
                },
                "draft": {
                    "type": "boolean",
                    "description": "Draft mode for a quick preview (Seedance 1.5 pro)"
                },
                "watermark": { "type": "boolean" },
                "camera_fixed": { "type": "boolean" },
                "return_last_frame": { "type": "boolean" },
                "service_tier": {
                    "type": "string",
                    "enum": ["default", "flex"],
                    "description": "\"flex\" runs offline at a lower price"
                },
                "execution_expires_after": {
                    "type": "integer",
                    "minimum": 3600,
                    "maximum": 259_200,
                    "description": "Task expiry in seconds"
                },
                "callback_url": {
                    "type": "string",
                    "description": "URL notified on task status changes"
                },
                "waitForCompletion": {
                    "type": "boolean",
                    "description": "Poll until the task finishes (default: false)"
                },
                "maxAttempts": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Max polling attempts (default: 60)"
                },
                "pollInterval": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Poll interval in milliseconds (default: 5000)"
                }
            },
            "required": ["prompt"]
        })
    }

    fn capabilities(&self) -> Vec<ToolCapability> {
        vec![ToolCapability::Network, ToolCapability::Billable]
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let args: VideoArgs = parse_args(input)?;
        args.validate()?;

        let model = args
            .model
            .clone()
            .unwrap_or_else(|| context.video_model.clone());
        let wait = args
            .wait_for_completion
            .then(|| context.poll_with(args.max_attempts, args.poll_interval));

        let outcome =
            video::generate_video(&context.client, &args.prompt, &model, &args.options(), wait)
                .await?;

        match outcome {
            VideoOutcome::Submitted(handle) => Ok(ToolResult::success(json!({
                "taskId": handle.id,
                "status": handle.status.to_string(),
                "message": TASK_CREATED_MESSAGE,
            }))),
            VideoOutcome::Finished(record) => ToolResult::json(&FinishedVideoOutput::from(record))
                .map_err(|e| ToolError::execution_failed(e.to_string())),
        }
    }
}

// === query_video_task ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecordOutput {
    task_id: String,
    model: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_frame_url: Option<String>,
    error: Option<RemoteError>,
    created_at: i64,
    updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames_per_second: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_expires_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generate_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    draft_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<VideoUsage>,
}

impl From<VideoTaskRecord> for TaskRecordOutput {
    fn from(record: VideoTaskRecord) -> Self {
        Self {
            video_url: record.video_url().map(str::to_string),
            last_frame_url: record.last_frame_url().map(str::to_string),
            task_id: record.id,
            model: record.model,
            status: record.status.to_string(),
            error: record.error,
            created_at: record.created_at,
            updated_at: record.updated_at,
            seed: record.seed,
            resolution: record.resolution,
            ratio: record.ratio,
            duration: record.duration,
            frames: record.frames,
            frames_per_second: record.framespersecond,
            service_tier: record.service_tier,
            execution_expires_after: record.execution_expires_after,
            generate_audio: record.generate_audio,
            draft: record.draft,
            draft_task_id: record.draft_task_id,
            usage: record.usage,
        }
    }
}

/// Flatten a task record into the camelCase shape returned to callers.
pub fn task_record_json(record: VideoTaskRecord) -> Result<Value, serde_json::Error> {
    serde_json::to_value(TaskRecordOutput::from(record))
}

pub struct QueryVideoTaskTool;

#[async_trait]
impl ToolSpec for QueryVideoTaskTool {
    fn name(&self) -> &'static str {
        "query_video_task"
    }

    fn description(&self) -> &'static str {
        "Query the status and result of a video generation task. Status is one of queued, running, \
         succeeded, failed, expired or cancelled; videoUrl is set once the task succeeded."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "taskId": {
                    "type": "string",
                    "description": "Task id returned by generate_video"
                }
            },
            "required": ["taskId"]
        })
    }

    fn capabilities(&self) -> Vec<ToolCapability> {
        vec![ToolCapability::Network, ToolCapability::ReadOnly]
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let task_id = required_str(&input, "taskId")?;
        let record = video::query_task(&context.client, task_id).await?;
        let value =
            task_record_json(record).map_err(|e| ToolError::execution_failed(e.to_string()))?;
        Ok(ToolResult::success(value))
    }
}

// === Unit Tests ===

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::ArkClient;
    use crate::config::Config;
    use crate::modules::poll::PollConfig;
    use crate::modules::video::TASKS_ENDPOINT;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context_for(server: &MockServer, output_dir: &std::path::Path) -> ToolContext {
        let config = Config {
            api_key: Some("test".to_string()),
            base_url: Some(server.uri()),
            ..Config::default()
        };
        let mut context = ToolContext::new(ArkClient::new(&config).expect("client"), output_dir);
        context.poll = PollConfig::new(3, Duration::ZERO);
        context
    }

    #[tokio::test]
    async fn generate_image_maps_response_fields() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("POST"))
            .and(path(image::IMAGE_ENDPOINT))
            .and(body_partial_json(json!({
                "model": "doubao-seedream-4-5-251128",
                "sequential_image_generation": "auto",
                "sequential_image_generation_options": { "max_images": 2 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "doubao-seedream-4-5-251128",
                "created": 42,
                "data": [
                    { "url": "https://cdn/1.png", "size": "2048x2048" },
                    { "b64_json": "aGVsbG8=", "revised_prompt": "a fox, detailed" }
                ],
                "usage": { "generated_images": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = GenerateImageTool
            .execute(
                json!({ "prompt": "a fox", "count": 2 }),
                &context_for(&server, tmp.path()),
            )
            .await
            .expect("execute");

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "model": "doubao-seedream-4-5-251128",
                "created": 42,
                "images": [
                    { "url": "https://cdn/1.png", "size": "2048x2048" },
                    { "base64": "aGVsbG8=", "revisedPrompt": "a fox, detailed" }
                ],
                "usage": { "generated_images": 2 }
            })
        );
    }

    #[test]
    fn size_pattern_accepts_presets_and_dimensions_only() {
        for ok in ["1K", "2K", "4K", "adaptive", "2048x2048", "2560x1440"] {
            assert!(SIZE_PATTERN.is_match(ok), "{ok}");
        }
        for bad in ["3K", "huge", "2048", "2048x", "2048 x 2048", ""] {
            assert!(!SIZE_PATTERN.is_match(bad), "{bad}");
        }
    }

    #[tokio::test]
    async fn generate_image_rejects_out_of_range_arguments() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        let context = context_for(&server, tmp.path());

        let err = GenerateImageTool
            .execute(json!({ "prompt": "x", "max_images": 16 }), &context)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("max_images"));

        let err = GenerateImageTool
            .execute(json!({ "prompt": "x", "size": "huge" }), &context)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("size"));

        let err = GenerateImageTool
            .execute(json!({ "prompt": "x", "response_format": "gif" }), &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn image_to_image_requires_a_reference() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        let result = ImageToImageTool
            .execute(json!({ "prompt": "edit" }), &context_for(&server, tmp.path()))
            .await
            .expect("execute");
        assert!(!result.success);
        assert_eq!(
            result.get("error"),
            Some(&json!("Either imageUrl or imageUrls must be provided"))
        );
    }

    #[tokio::test]
    async fn image_to_image_prefers_the_list() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("POST"))
            .and(path(image::IMAGE_ENDPOINT))
            .and(body_partial_json(json!({
                "image": ["https://a/1.png", "https://a/2.png"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1,
                "data": [{ "url": "https://cdn/fused.png" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = ImageToImageTool
            .execute(
                json!({
                    "prompt": "fuse",
                    "imageUrl": "https://a/0.png",
                    "imageUrls": ["https://a/1.png", "https://a/2.png"]
                }),
                &context_for(&server, tmp.path()),
            )
            .await
            .expect("execute");
        assert!(result.success);
    }

    #[tokio::test]
    async fn download_image_writes_under_output_dir() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .and(path("/assets/cat.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"\x89PNG\r\n\x1a\nDATA".to_vec()),
            )
            .mount(&server)
            .await;

        let url = format!("{}/assets/cat.png", server.uri());
        let result = DownloadImageTool
            .execute(
                json!({ "url": url, "filePath": "nested/cat.png" }),
                &context_for(&server, tmp.path()),
            )
            .await
            .expect("execute");

        let target = tmp.path().join("nested/cat.png");
        assert!(result.success);
        assert_eq!(result.get("bytes"), Some(&json!(12)));
        assert_eq!(result.get("contentType"), Some(&json!("image/png")));
        assert_eq!(
            result.get("filePath"),
            Some(&json!(target.display().to_string()))
        );
        assert_eq!(std::fs::read(&target).expect("read"), b"\x89PNG\r\n\x1a\nDATA");
    }

    #[tokio::test]
    async fn generate_video_without_wait_returns_task_id() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("POST"))
            .and(path(TASKS_ENDPOINT))
            .and(body_partial_json(json!({
                "content": [
                    { "type": "text", "text": "waves" },
                    { "type": "image_url", "image_url": { "url": "https://a/f.png" }, "role": "first_frame" }
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "cgt-1", "status": "queued" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = GenerateVideoTool
            .execute(
                json!({ "prompt": "waves", "imageUrl": "https://a/f.png" }),
                &context_for(&server, tmp.path()),
            )
            .await
            .expect("execute");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "taskId": "cgt-1",
                "status": "queued",
                "message": TASK_CREATED_MESSAGE
            })
        );
    }

    #[tokio::test]
    async fn generate_video_rejects_five_references_without_network() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = GenerateVideoTool
            .execute(
                json!({
                    "prompt": "refs",
                    "referenceImages": ["1", "2", "3", "4", "5"]
                }),
                &context_for(&server, tmp.path()),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reference images"));
    }

    #[tokio::test]
    async fn generate_video_poll_timeout_is_reported() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("POST"))
            .and(path(TASKS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cgt-slow" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{TASKS_ENDPOINT}/cgt-slow")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "cgt-slow", "status": "running" })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let err = GenerateVideoTool
            .execute(
                json!({ "prompt": "slow", "waitForCompletion": true, "maxAttempts": 0 }),
                &context_for(&server, tmp.path()),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not complete"));
    }

    #[tokio::test]
    async fn generate_video_waits_and_reports_success() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("POST"))
            .and(path(TASKS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cgt-ok" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{TASKS_ENDPOINT}/cgt-ok")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cgt-ok",
                "status": "succeeded",
                "content": { "video_url": "https://cdn/v.mp4" },
                "resolution": "720p",
                "duration": 5,
                "usage": { "completion_tokens": 108_900, "total_tokens": 108_900 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = GenerateVideoTool
            .execute(
                json!({ "prompt": "fast", "waitForCompletion": true }),
                &context_for(&server, tmp.path()),
            )
            .await
            .expect("execute");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "taskId": "cgt-ok",
                "status": "succeeded",
                "videoUrl": "https://cdn/v.mp4",
                "resolution": "720p",
                "duration": 5,
                "usage": { "completion_tokens": 108_900, "total_tokens": 108_900 }
            })
        );
    }

    #[tokio::test]
    async fn query_video_task_flattens_record() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .and(path(format!("{TASKS_ENDPOINT}/cgt-q")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cgt-q",
                "model": "doubao-seedance-1-5-pro-251215",
                "status": "failed",
                "error": { "code": "InputImageSensitiveContentDetected", "message": "blocked" },
                "created_at": 10,
                "updated_at": 20,
                "framespersecond": 24,
                "draft_task_id": "cgt-d"
            })))
            .mount(&server)
            .await;

        let result = QueryVideoTaskTool
            .execute(json!({ "taskId": "cgt-q" }), &context_for(&server, tmp.path()))
            .await
            .expect("execute");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "taskId": "cgt-q",
                "model": "doubao-seedance-1-5-pro-251215",
                "status": "failed",
                "error": { "code": "InputImageSensitiveContentDetected", "message": "blocked" },
                "createdAt": 10,
                "updatedAt": 20,
                "framesPerSecond": 24,
                "draftTaskId": "cgt-d"
            })
        );
    }

    #[tokio::test]
    async fn query_video_task_surfaces_classified_errors() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "ResourceNotFound", "message": "task not found" }
            })))
            .mount(&server)
            .await;

        let err = QueryVideoTaskTool
            .execute(json!({ "taskId": "missing" }), &context_for(&server, tmp.path()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "task not found");
    }

    #[tokio::test]
    async fn query_video_task_rejects_path_like_ids_without_network() {
        let server = MockServer::start().await;
        let tmp = tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
            .expect(0)
            .mount(&server)
            .await;

        let err = QueryVideoTaskTool
            .execute(
                json!({ "taskId": "../../images/generations" }),
                &context_for(&server, tmp.path()),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid input: taskId"));
    }
}
