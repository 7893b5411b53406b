//! Base-model family inference.
//!
//! Families are reported with Civitai's `baseModel` labels since that is
//! the only catalog that states them explicitly; HuggingFace tags and local
//! filenames are mapped onto the same labels.

use regex::Regex;
use std::sync::LazyLock;

/// (pattern over a lower-cased, separator-normalised string, family label).
/// Order matters: more specific families come first.
static FAMILY_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\bpony\b", "Pony"),
        (r"\billustrious\b", "Illustrious"),
        (r"\bflux[ .]?1?[ .]?s(chnell)?\b", "Flux.1 S"),
        (r"\bflux\b", "Flux.1 D"),
        (r"\bsd ?3[ .]?5\b|stable diffusion 3[ .]5", "SD 3.5"),
        (r"\bsd ?3\b|stable diffusion 3\b", "SD 3"),
        (r"\bsdxl ?turbo\b", "SDXL Turbo"),
        (r"\bsdxl\b|stable diffusion xl|\bxl base\b", "SDXL 1.0"),
        (r"\bsd ?2[ .]?1\b|stable diffusion 2[ .]1|stable diffusion v2 1", "SD 2.1"),
        (r"\bsd ?2\b|stable diffusion 2\b", "SD 2.0"),
        (r"\bsd ?1[ .]?5\b|stable diffusion v1 5|stable diffusion 1[ .]5", "SD 1.5"),
    ]
    .into_iter()
    .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, label)))
    .collect()
});

/// Infer the base-model family from free text (a `baseModel` label, a
/// repo id, tags, or a filename).
pub fn infer_base_model_family(text: &str) -> Option<&'static str> {
    let normalized = text
        .to_lowercase()
        .replace(['_', '-', '/', ':'], " ");
    FAMILY_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&normalized))
        .map(|(_, label)| *label)
}

/// Free-text search term that finds a family on name-only catalogs.
pub fn family_search_term(family: &str) -> String {
    match family {
        "SD 1.5" => "stable-diffusion-v1-5".to_string(),
        "SD 2.0" | "SD 2.1" => "stable-diffusion-2".to_string(),
        "SDXL 1.0" | "SDXL Turbo" => "stable-diffusion-xl".to_string(),
        "SD 3" | "SD 3.5" => "stable-diffusion-3".to_string(),
        "Flux.1 D" | "Flux.1 S" => "flux.1".to_string(),
        other => other.to_lowercase(),
    }
}
