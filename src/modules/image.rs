//! Image generation against the Seedream / Seededit endpoint.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::{self, Param};
use crate::client::{ArkClient, BinaryPayload};
use crate::error::{ApiError, ApiErrorCode, GenerationError, RemoteError, classify_embedded};
use crate::logging;

pub const IMAGE_ENDPOINT: &str = "/api/v3/images/generations";

// === Types ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequentialImageGeneration {
    Auto,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseFormat {
    #[default]
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "b64_json")]
    B64Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizePromptMode {
    Standard,
}

/// Caller-supplied image options. Every field is optional and `None` means unset.
#[derive(Debug, Clone, Default)]
pub struct ImageGenerateOptions {
    pub size: Option<String>,
    pub seed: Option<i64>,
    pub sequential_image_generation: Option<SequentialImageGeneration>,
    pub max_images: Option<u32>,
    /// Deprecated alias for `max_images`; `max_images` wins when both are set.
    pub count: Option<u32>,
    pub stream: Option<bool>,
    pub guidance_scale: Option<f64>,
    pub response_format: Option<ResponseFormat>,
    pub watermark: Option<bool>,
    pub optimize_prompt_mode: Option<OptimizePromptMode>,
    pub image_url: Option<String>,
    pub image_urls: Vec<String>,
}

/// A single reference image or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageInput {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialImageOptions {
    pub max_images: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizePromptOptions {
    pub mode: OptimizePromptMode,
}

/// Wire body for `POST /api/v3/images/generations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation: Option<SequentialImageGeneration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation_options: Option<SequentialImageOptions>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    pub response_format: ResponseFormat,
    pub watermark: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimize_prompt_options: Option<OptimizePromptOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_images: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub data: Vec<ImageData>,
    #[serde(default)]
    pub usage: Option<ImageUsage>,
    #[serde(default)]
    pub error: Option<RemoteError>,
}

// === Request Assembly ===

/// Assemble the wire request for `model` from sparse caller options.
///
/// Only set fields are emitted, plus `stream`, `response_format` and
/// `watermark`, which always carry a value. Fields a model does not document
/// are forwarded unchanged.
#[must_use]
pub fn build_image_request(
    prompt: &str,
    model: &str,
    options: &ImageGenerateOptions,
) -> ImageGenerationRequest {
    let image = if options.image_urls.is_empty() {
        options.image_url.clone().map(ImageInput::Single)
    } else {
        Some(ImageInput::Multiple(options.image_urls.clone()))
    };

    let max_images = options.max_images.or(options.count);
    let sequential_image_generation = match (options.sequential_image_generation, max_images) {
        (Some(mode), _) => Some(mode),
        (None, Some(_)) => Some(SequentialImageGeneration::Auto),
        (None, None) => None,
    };

    ImageGenerationRequest {
        model: model.to_string(),
        prompt: prompt.to_string(),
        image,
        size: options.size.clone(),
        seed: options.seed,
        sequential_image_generation,
        sequential_image_generation_options: max_images
            .map(|max_images| SequentialImageOptions { max_images }),
        stream: options.stream.unwrap_or(false),
        guidance_scale: options.guidance_scale,
        response_format: options.response_format.unwrap_or_default(),
        watermark: options.watermark.unwrap_or(true),
        optimize_prompt_options: options
            .optimize_prompt_mode
            .map(|mode| OptimizePromptOptions { mode }),
    }
}

/// Capability-relevant parameters present in an assembled request.
#[must_use]
pub fn requested_params(request: &ImageGenerationRequest) -> Vec<Param> {
    let mut params = Vec::new();
    match &request.image {
        Some(ImageInput::Single(_)) => params.push(Param::ImageInput),
        Some(ImageInput::Multiple(_)) => params.push(Param::MultiImageInput),
        None => {}
    }
    if request.seed.is_some() {
        params.push(Param::Seed);
    }
    if request.guidance_scale.is_some() {
        params.push(Param::GuidanceScale);
    }
    if request.sequential_image_generation == Some(SequentialImageGeneration::Auto) {
        params.push(Param::SequentialGeneration);
    }
    if request.stream {
        params.push(Param::Stream);
    }
    if request.optimize_prompt_options.is_some() {
        params.push(Param::OptimizePrompt);
    }
    params
}

// === API Calls ===

/// Submit an image generation request and return the parsed response.
pub async fn generate(
    client: &ArkClient,
    prompt: &str,
    model: &str,
    options: &ImageGenerateOptions,
) -> Result<ImageGenerationResponse, GenerationError> {
    let request = build_image_request(prompt, model, options);
    if let Some(message) = capabilities::advisory(model, &requested_params(&request)) {
        logging::warn(message);
    }

    let response = if request.stream {
        let body = client.post_text(IMAGE_ENDPOINT, &request).await?;
        parse_streamed_response(&body)?
    } else {
        client
            .post_json::<_, ImageGenerationResponse>(IMAGE_ENDPOINT, &request)
            .await?
    };

    if response.data.is_empty()
        && let Some(remote) = &response.error
    {
        return Err(classify_embedded(remote).into());
    }

    Ok(response)
}

/// Fetch an image (or any remote asset) as raw bytes with the bearer credential.
pub async fn download_image(
    client: &ArkClient,
    url: &str,
) -> Result<BinaryPayload, GenerationError> {
    if url.starts_with("data:") {
        return decode_data_uri(url);
    }
    Ok(client.get_bytes(url).await?)
}

/// Decode a `data:<mime>;base64,<payload>` URI without touching the network.
pub fn decode_data_uri(uri: &str) -> Result<BinaryPayload, GenerationError> {
    let rest = uri.strip_prefix("data:").unwrap_or(uri);
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(GenerationError::invalid_input("Malformed data URI: missing ','"));
    };
    let Some(mime) = header.strip_suffix(";base64") else {
        return Err(GenerationError::invalid_input(
            "Only base64-encoded data URIs are supported",
        ));
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| GenerationError::invalid_input(format!("Invalid base64 payload: {e}")))?;
    Ok(BinaryPayload {
        bytes: Bytes::from(bytes),
        content_type: (!mime.is_empty()).then(|| mime.to_string()),
    })
}

/// Fold a server-sent event stream into a single response.
///
/// Events carrying `url`/`b64_json` become images. Error events tied to an
/// `image_index` become failed image entries; a top-level error event lands
/// in `response.error`. `usage` from the final event is kept. A body with no
/// `data:` lines is decoded as a plain JSON response, since the service may
/// ignore `stream` for models that cannot stream.
pub fn parse_streamed_response(body: &str) -> Result<ImageGenerationResponse, ApiError> {
    let events: Vec<&str> = body
        .lines()
        .filter_map(|line| line.trim().strip_prefix("data:"))
        .map(str::trim)
        .collect();

    if events.is_empty() {
        return serde_json::from_str::<ImageGenerationResponse>(body).map_err(|e| {
            ApiError::new(
                ApiErrorCode::Unknown,
                format!("Unexpected error: undecodable image response: {e}"),
            )
        });
    }

    let mut response = ImageGenerationResponse::default();
    let mut parsed_any = false;

    for data in events {
        if data == "[DONE]" {
            break;
        }
        let Ok(event) = serde_json::from_str::<Value>(data) else {
            logging::warn(format!("Failed to parse image stream event: {data}"));
            continue;
        };
        parsed_any = true;

        if let Some(model) = event.get("model").and_then(Value::as_str) {
            response.model = Some(model.to_string());
        }
        if let Some(created) = event.get("created").and_then(Value::as_i64) {
            response.created = created;
        }
        if let Some(usage) = event.get("usage") {
            response.usage = serde_json::from_value(usage.clone()).ok();
        }

        let has_image = event.get("url").is_some() || event.get("b64_json").is_some();
        let error = event.get("error").filter(|e| !e.is_null());
        if !has_image
            && event.get("image_index").is_none()
            && let Some(error) = error
        {
            response.error = serde_json::from_value(error.clone()).ok();
            continue;
        }
        if (has_image || error.is_some())
            && let Ok(image) = serde_json::from_value::<ImageData>(event)
        {
            response.data.push(image);
        }
    }

    if !parsed_any {
        return Err(ApiError::new(
            ApiErrorCode::Unknown,
            "Unexpected error: image stream carried no decodable events",
        ));
    }
    Ok(response)
}
