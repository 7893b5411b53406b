//! Filename helpers: model-extension recognition and search-query derivation.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Extensions the engine treats as model files (compared case-insensitively).
pub const MODEL_EXTENSIONS: &[&str] = &[
    "safetensors",
    "ckpt",
    "pt",
    "pth",
    "bin",
    "gguf",
    "onnx",
    "sft",
];

/// Whether `path` has a recognised model-file extension.
pub fn is_model_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            MODEL_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// File name component of a path as a `String`.
pub fn file_name_of(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extract the base name from a filename, removing the extension and
/// precision, pruning and shard suffixes.
///
/// # Examples
///
/// ```
/// use modelsync_core::naming::extract_base_name;
///
/// assert_eq!(extract_base_name("cyberrealistic_v40-fp16.safetensors"), "cyberrealistic_v40");
/// assert_eq!(extract_base_name("model-00001-of-00005.safetensors"), "model");
/// ```
pub fn extract_base_name(filename: &str) -> String {
    let mut name = filename.to_string();

    if let Some(dot_pos) = name.rfind('.') {
        name = name[..dot_pos].to_string();
    }

    static SHARD_PATTERN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[-_]?\d{5}-of-\d{5}$").unwrap());
    name = SHARD_PATTERN.replace(&name, "").to_string();

    static PRECISION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)([-_.](fp16|fp32|bf16|fp8(_e4m3fn)?|pruned|emaonly|ema|full|nonema))+$")
            .unwrap()
    });
    name = PRECISION_PATTERN.replace(&name, "").to_string();

    name.trim_matches(|c| c == '-' || c == '_' || c == '.')
        .to_string()
}

/// Free-text catalog query for a local filename.
///
/// Separators become spaces so catalog tokenizers see words, e.g.
/// `cyberrealistic_v40.safetensors` -> `cyberrealistic v40`.
pub fn search_query_for(filename: &str) -> String {
    let base = extract_base_name(filename);
    let query = base
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if query.is_empty() {
        base
    } else {
        query
    }
}
