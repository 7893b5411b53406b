//! Candidate ranking for catalog search results.
//!
//! Name similarity dominates the combined score so that an exact or
//! near-exact name wins; popularity only separates entries whose names are
//! about equally close, which is the usual case when many re-uploads share
//! a base name.

use crate::catalog::{
    CatalogEntry, CatalogModel, CatalogVariant, CivitaiModel, HuggingFaceModel,
};
use crate::naming::extract_base_name;

/// Similarity above which a child file counts as a name match.
pub const NAME_MATCH_THRESHOLD: f64 = 0.8;

/// Shortest normalized string that may score a containment match; a
/// single letter is contained in almost every name.
const MIN_CONTAINMENT_LEN: usize = 3;

/// Lower-case and drop everything that is not alphanumeric.
pub fn normalize_for_match(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Levenshtein edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Name similarity in `[0, 1]`.
///
/// Exact after normalisation scores 1.0, containment 0.8, anything else
/// one minus the normalised edit distance. Extensions are not stripped, so
/// `model.safetensors` against `model` is a containment match.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_for_match(a);
    let b = normalize_for_match(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let (a_len, b_len) = (a.chars().count(), b.chars().count());
    if a_len.min(b_len) >= MIN_CONTAINMENT_LEN && (a.contains(&b) || b.contains(&a)) {
        return 0.8;
    }
    let max_len = a_len.max(b_len);
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Best similarity between the target and the entry name or any child file.
pub fn entry_name_score(entry: &CatalogEntry, target_filename: &str) -> f64 {
    let own = name_similarity(entry.name(), target_filename);
    entry
        .files()
        .iter()
        .map(|f| name_similarity(&f.name, target_filename))
        .fold(own, f64::max)
}

fn popularity_score(downloads: u64) -> f64 {
    ((downloads as f64) + 1.0).ln() / 25.0
}

fn civitai_score(model: &CivitaiModel, name: f64) -> f64 {
    let popularity = popularity_score(model.download_count());
    let rating = model.rating().unwrap_or(0.0) / 10.0;
    let boost = if model.download_count() > 1000 { 0.1 } else { 0.0 };
    0.7 * name + 0.15 * popularity + 0.1 * rating + 0.05 * boost
}

fn huggingface_score(model: &HuggingFaceModel, name: f64) -> f64 {
    let popularity = popularity_score(model.download_count());
    let likes = ((model.like_count() as f64) + 1.0).ln() / 15.0;
    let boost = if model.is_image_pipeline() { 0.1 } else { 0.0 };
    0.6 * name + 0.2 * popularity + 0.1 * likes + 0.1 * boost
}

/// Combined score for one candidate.
pub fn score_candidate(entry: &CatalogEntry, target_filename: &str) -> f64 {
    let name = entry_name_score(entry, target_filename);
    match entry {
        CatalogEntry::Civitai(model) => civitai_score(model, name),
        CatalogEntry::HuggingFace(model) => huggingface_score(model, name),
    }
}

/// Pick the best candidate for `target_filename`.
///
/// `candidates` must be non-empty. A single candidate is returned without
/// scoring; on equal scores the earliest candidate wins.
///
/// # Panics
///
/// Panics when `candidates` is empty.
pub fn best_match<'a>(candidates: &'a [CatalogEntry], target_filename: &str) -> &'a CatalogEntry {
    assert!(!candidates.is_empty(), "best_match requires at least one candidate");
    if candidates.len() == 1 {
        return &candidates[0];
    }

    let mut best = &candidates[0];
    let mut best_score = score_candidate(best, target_filename);
    for candidate in &candidates[1..] {
        let score = score_candidate(candidate, target_filename);
        if score > best_score {
            best = candidate;
            best_score = score;
        }
    }
    best
}

/// Why a variant was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    /// A published file hash equals the local digest.
    Hash,
    /// A file name is close enough to the local filename.
    Name,
    /// Nothing matched; the canonical (first) variant was taken.
    Default,
}

/// The variant of an entry that corresponds to a local file.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionMatch {
    pub variant: CatalogVariant,
    pub reason: MatchReason,
}

/// Select the version/file within `entry` that matches a local file.
///
/// Prefers an exact hash match on any child file, then the first child
/// file whose name similarity exceeds [`NAME_MATCH_THRESHOLD`], then the
/// first variant. Returns `None` only for an entry without variants.
pub fn find_matching_version(
    entry: &CatalogEntry,
    filename: &str,
    hash: Option<&str>,
) -> Option<VersionMatch> {
    let variants = entry.variants();

    if let Some(digest) = hash.filter(|h| !h.is_empty()) {
        if let Some(variant) = variants
            .iter()
            .find(|v| v.files().iter().any(|f| f.hashes.matches(digest)))
        {
            return Some(VersionMatch {
                variant: variant.clone(),
                reason: MatchReason::Hash,
            });
        }
    }

    let base = extract_base_name(filename);
    if let Some(variant) = variants.iter().find(|v| {
        v.files()
            .iter()
            .any(|f| {
                name_similarity(&f.name, filename)
                    .max(name_similarity(&extract_base_name(&f.name), &base))
                    > NAME_MATCH_THRESHOLD
            })
    }) {
        return Some(VersionMatch {
            variant: variant.clone(),
            reason: MatchReason::Name,
        });
    }

    variants.into_iter().next().map(|variant| VersionMatch {
        variant,
        reason: MatchReason::Default,
    })
}
