//! Non-interactive smoke run against the live Ark endpoints.
//!
//! This spends real credits, so the CLI only runs it behind `--confirm`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::client::ArkClient;
use crate::modules::image::{self, ImageGenerateOptions};
use crate::modules::poll::PollConfig;
use crate::modules::video::{self, TaskStatus, VideoGenerateOptions, VideoOutcome};
use crate::palette;
use crate::ui;
use crate::utils::{
    extension_from_content_type, extension_from_url, timestamped_filename, write_bytes,
};

#[derive(Debug, Clone)]
pub struct SmokeMediaOptions {
    pub output_dir: PathBuf,
    pub image_prompt: String,
    pub image_model: String,
    pub video_prompt: String,
    pub video_model: String,
    pub poll: PollConfig,
    pub video_async: bool,
    pub skip_image: bool,
    pub skip_video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValidationKind {
    Image,
    Video,
}

pub async fn run_smoke_media(
    config: &crate::config::Config,
    options: SmokeMediaOptions,
) -> Result<()> {
    let (blue_r, blue_g, blue_b) = palette::BLUE_RGB;
    let (green_r, green_g, green_b) = palette::GREEN_RGB;
    let (orange_r, orange_g, orange_b) = palette::ORANGE_RGB;
    let (muted_r, muted_g, muted_b) = palette::SILVER_RGB;

    fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "Failed to create output_dir: {}",
            options.output_dir.display()
        )
    })?;

    println!(
        "{} {}",
        "Smoke media output dir:".bold(),
        options.output_dir.display()
    );

    let client = ArkClient::new(config)?;

    let mut image_path: Option<PathBuf> = None;
    let mut video_path: Option<PathBuf> = None;
    let mut video_task_id: Option<String> = None;

    if !options.skip_image {
        let spinner = ui::spinner("Generating image...");
        let response = image::generate(
            &client,
            &options.image_prompt,
            &options.image_model,
            &ImageGenerateOptions {
                size: Some("2K".to_string()),
                watermark: Some(false),
                ..Default::default()
            },
        )
        .await;
        spinner.finish_and_clear();
        let response = response?;

        let url = response
            .data
            .iter()
            .find_map(|img| img.url.clone())
            .context("Image response contained no image URL")?;
        let path = download_to(&client, &url, &options.output_dir, "image").await?;
        validate_file(&path, ValidationKind::Image)?;
        image_path = Some(path);
    }

    if !options.skip_video {
        let wait = (!options.video_async).then_some(options.poll);
        let spinner = ui::spinner("Generating video...");
        let outcome = video::generate_video(
            &client,
            &options.video_prompt,
            &options.video_model,
            &VideoGenerateOptions {
                duration: Some(5),
                watermark: Some(false),
                ..Default::default()
            },
            wait,
        )
        .await;
        spinner.finish_and_clear();

        match outcome? {
            VideoOutcome::Submitted(handle) => video_task_id = Some(handle.id),
            VideoOutcome::Finished(record) => {
                video_task_id = Some(record.id.clone());
                if record.status != TaskStatus::Succeeded {
                    let reason = record
                        .error
                        .as_ref()
                        .and_then(|e| e.message.clone())
                        .unwrap_or_else(|| "no error detail".to_string());
                    anyhow::bail!("Video task {} ended {}: {reason}", record.id, record.status);
                }
                let url = record
                    .video_url()
                    .context("Succeeded video task has no video_url")?;
                let path = download_to(&client, url, &options.output_dir, "video").await?;
                validate_file(&path, ValidationKind::Video)?;
                video_path = Some(path);
            }
        }
    }

    println!();
    println!(
        "{}",
        "Smoke test results"
            .truecolor(blue_r, blue_g, blue_b)
            .bold()
    );
    println!("{}", "==================".truecolor(blue_r, blue_g, blue_b));
    if !options.skip_image {
        println!(
            "  {} image: {}",
            image_path.as_ref().map_or_else(
                || "!".truecolor(orange_r, orange_g, orange_b),
                |_| { "✓".truecolor(green_r, green_g, green_b) }
            ),
            image_path
                .as_ref()
                .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
        );
    }
    if !options.skip_video {
        if let Some(path) = &video_path {
            println!(
                "  {} video: {}",
                "✓".truecolor(green_r, green_g, green_b),
                path.display()
            );
        } else if let Some(task_id) = &video_task_id {
            println!(
                "  {} video: submitted task_id={task_id} (async)",
                "·".truecolor(muted_r, muted_g, muted_b)
            );
        } else {
            println!(
                "  {} video: (none)",
                "!".truecolor(orange_r, orange_g, orange_b)
            );
        }
    }

    Ok(())
}

async fn download_to(
    client: &ArkClient,
    url: &str,
    output_dir: &Path,
    prefix: &str,
) -> Result<PathBuf> {
    let payload = image::download_image(client, url).await?;
    let extension = payload
        .content_type
        .as_deref()
        .and_then(extension_from_content_type)
        .map(str::to_string)
        .or_else(|| extension_from_url(url))
        .unwrap_or_else(|| "bin".to_string());
    let path = output_dir.join(timestamped_filename(prefix, &extension));
    write_bytes(&path, &payload.bytes)?;
    Ok(path)
}

fn validate_file(path: &Path, expected: ValidationKind) -> Result<()> {
    let (orange_r, orange_g, orange_b) = palette::ORANGE_RGB;
    let data =
        fs::read(path).with_context(|| format!("Failed to read output file {}", path.display()))?;
    if data.is_empty() {
        anyhow::bail!("Generated file is empty: {}", path.display());
    }

    let detected = detect_kind(&data);
    if detected == DetectedKind::Json {
        let snippet = String::from_utf8_lossy(&data[..data.len().min(512)]).to_string();
        anyhow::bail!(
            "Generated file looks like JSON (unexpected for {expected:?}): {}. First bytes: {snippet}",
            path.display()
        );
    }

    let matches = matches!(
        (expected, detected),
        (ValidationKind::Image, DetectedKind::Image) | (ValidationKind::Video, DetectedKind::Video)
    );
    if !matches {
        println!(
            "{} {} (expected {expected:?}, detected {detected:?})",
            "!".truecolor(orange_r, orange_g, orange_b),
            path.display(),
        );
    }

    Ok(())
}

fn looks_like_json(data: &[u8]) -> bool {
    let first = data.iter().copied().find(|b| !b.is_ascii_whitespace());
    matches!(first, Some(b'{' | b'['))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectedKind {
    Image,
    Video,
    Json,
    Unknown,
}

fn detect_kind(data: &[u8]) -> DetectedKind {
    if looks_like_json(data) {
        return DetectedKind::Json;
    }

    // Images
    if data.starts_with(b"\x89PNG\r\n\x1a\n") || data.starts_with(b"\xFF\xD8\xFF") {
        return DetectedKind::Image;
    }
    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return DetectedKind::Image;
    }

    // Video (MP4 / MOV)
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return DetectedKind::Video;
    }
    if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return DetectedKind::Video;
    }

    DetectedKind::Unknown
}
