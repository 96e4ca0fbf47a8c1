//! Prompt pool for training-image attempts.
//!
//! Every attempt renders the same character description with a different
//! pose/expression variation so the resulting set has visual diversity.
//! Selection is deterministic wrap-around over [`PROMPT_VARIATIONS`] — no
//! randomness, so a rerun of the same attempt index produces the same prompt.

/// Style suffix appended to every prompt for a consistent look across the set.
pub const BASE_STYLE: &str = "photorealistic, high quality, professional photography";

/// Pose / angle / expression variations cycled across attempts.
pub const PROMPT_VARIATIONS: &[&str] = &[
    "front view headshot, neutral expression",
    "three-quarter view, slight smile",
    "profile view, looking right",
    "front view, bright smile",
    "three-quarter view looking left",
    "close-up portrait, serious expression",
    "front view, laughing",
    "side profile, contemplative",
    "three-quarter view, surprised expression",
    "front view, confident pose",
    "profile view looking up",
    "three-quarter view, thoughtful",
    "close-up, eyes closed peaceful",
    "front view, professional headshot",
    "three-quarter view, casual pose",
    "profile view, looking down",
    "front view, natural smile",
    "three-quarter view, intense gaze",
    "close-up portrait, soft lighting",
    "front view, warm expression",
    "side view, dramatic lighting",
    "three-quarter view, joyful",
    "front view, elegant pose",
    "profile silhouette, artistic",
];

/// Build the full prompt for a 1-based attempt index.
///
/// Wraps around the variation pool, so attempt 1 and attempt
/// `PROMPT_VARIATIONS.len() + 1` use the same variation.
pub fn prompt_for_attempt(character_description: &str, attempt_index: u32) -> String {
    let variation_index = attempt_index.saturating_sub(1) as usize % PROMPT_VARIATIONS.len();
    format!(
        "{character_description}, {BASE_STYLE}, {}",
        PROMPT_VARIATIONS[variation_index]
    )
}
