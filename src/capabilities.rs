//! Which optional parameters each known model documents support for.
//!
//! The matrix is advisory. Request assembly consults it only to log a
//! warning; every option the caller set is still forwarded and the remote
//! service stays the authority on what a model accepts.

use std::fmt;

use serde::Serialize;

// === Types ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Optional request parameters whose support differs between models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    ImageInput,
    MultiImageInput,
    Seed,
    GuidanceScale,
    SequentialGeneration,
    Stream,
    OptimizePrompt,
    FirstFrame,
    LastFrame,
    ReferenceImages,
    GenerateAudio,
    Draft,
    DraftTask,
}

impl Param {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageInput => "image",
            Self::MultiImageInput => "image (multiple)",
            Self::Seed => "seed",
            Self::GuidanceScale => "guidance_scale",
            Self::SequentialGeneration => "sequential_image_generation",
            Self::Stream => "stream",
            Self::OptimizePrompt => "optimize_prompt_options",
            Self::FirstFrame => "first_frame",
            Self::LastFrame => "last_frame",
            Self::ReferenceImages => "reference_image",
            Self::GenerateAudio => "generate_audio",
            Self::Draft => "draft",
            Self::DraftTask => "draft_task",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documented capability record for one model identifier.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCapability {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: MediaKind,
    pub supports: &'static [Param],
}

impl ModelCapability {
    #[must_use]
    pub fn supports(&self, param: Param) -> bool {
        self.supports.contains(&param)
    }
}

// === Matrix ===

const SEEDREAM_4: &[Param] = &[
    Param::ImageInput,
    Param::MultiImageInput,
    Param::SequentialGeneration,
    Param::Stream,
    Param::OptimizePrompt,
];

pub const MODELS: &[ModelCapability] = &[
    ModelCapability {
        id: "doubao-seedream-4-5-251128",
        label: "Seedream 4.5",
        kind: MediaKind::Image,
        supports: SEEDREAM_4,
    },
    ModelCapability {
        id: "doubao-seedream-4-0-250428",
        label: "Seedream 4.0",
        kind: MediaKind::Image,
        supports: SEEDREAM_4,
    },
    ModelCapability {
        id: "doubao-seedream-3-0-t2i",
        label: "Seedream 3.0 t2i",
        kind: MediaKind::Image,
        supports: &[Param::Seed, Param::GuidanceScale],
    },
    ModelCapability {
        id: "doubao-seededit-3-0-i2i",
        label: "Seededit 3.0 i2i",
        kind: MediaKind::Image,
        supports: &[Param::ImageInput, Param::Seed, Param::GuidanceScale],
    },
    ModelCapability {
        id: "doubao-seedance-1-5-pro-251215",
        label: "Seedance 1.5 pro",
        kind: MediaKind::Video,
        supports: &[
            Param::FirstFrame,
            Param::LastFrame,
            Param::GenerateAudio,
            Param::Draft,
            Param::DraftTask,
        ],
    },
    ModelCapability {
        id: "doubao-seedance-1-0-pro-250528",
        label: "Seedance 1.0 pro",
        kind: MediaKind::Video,
        supports: &[Param::FirstFrame, Param::LastFrame],
    },
    ModelCapability {
        id: "doubao-seedance-1-0-pro-fast",
        label: "Seedance 1.0 pro fast",
        kind: MediaKind::Video,
        supports: &[Param::FirstFrame],
    },
    ModelCapability {
        id: "doubao-seedance-1-0-lite-i2v-250428",
        label: "Seedance 1.0 lite i2v",
        kind: MediaKind::Video,
        supports: &[Param::FirstFrame, Param::LastFrame, Param::ReferenceImages],
    },
    ModelCapability {
        id: "doubao-seedance-1-0-lite-t2v",
        label: "Seedance 1.0 lite t2v",
        kind: MediaKind::Video,
        supports: &[],
    },
];

/// Look up a model by identifier.
#[must_use]
pub fn lookup(model_id: &str) -> Option<&'static ModelCapability> {
    MODELS.iter().find(|model| model.id == model_id)
}

/// Known model identifiers of one kind, in matrix order.
#[cfg(test)]
fn model_ids(kind: MediaKind) -> Vec<&'static str> {
    MODELS
        .iter()
        .filter(|model| model.kind == kind)
        .map(|model| model.id)
        .collect()
}

/// Parameters in `present` that `model_id` does not document.
///
/// Unknown models yield nothing: custom identifiers pass through unjudged.
#[must_use]
pub fn undocumented(model_id: &str, present: &[Param]) -> Vec<Param> {
    let Some(model) = lookup(model_id) else {
        return Vec::new();
    };
    present
        .iter()
        .copied()
        .filter(|param| !model.supports(*param))
        .collect()
}

/// Human-readable advisory for undocumented parameters, if any.
#[must_use]
pub fn advisory(model_id: &str, present: &[Param]) -> Option<String> {
    let params = undocumented(model_id, present);
    if params.is_empty() {
        return None;
    }
    let names = params
        .iter()
        .map(|param| param.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "Model {model_id} does not document support for: {names}. Forwarding as given."
    ))
}
