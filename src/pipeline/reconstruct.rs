//! Translated-document reconstruction.
//!
//! Builds a translated full-text document from a translated block list when
//! no whole-document translation exists. Two strategies:
//!
//! 1. **Layout concatenation**: blocks grouped by ascending page, list order
//!    within a page, translation-or-original text, joined by blank lines.
//! 2. **Substring substitution**: blocks with both text and a translation and
//!    more than [`MIN_SUBSTITUTION_CHARS`] characters, longest first, each
//!    replaced case-insensitively in a copy of the original document.
//!
//! Concatenation wins when its output is longer than [`CONCAT_RATIO`] of the
//! original; otherwise substitution runs and concatenation is the fallback
//! when nothing was substituted. This is a heuristic: block text and the
//! original markdown share no positional alignment.

use crate::model::TextBlock;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Share of the original length the concatenation must exceed.
pub const CONCAT_RATIO: f64 = 0.3;

/// Blocks with this many characters or fewer are never substituted.
pub const MIN_SUBSTITUTION_CHARS: usize = 10;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Which strategy produced the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    LayoutConcat,
    Substitution,
    /// Substitution was attempted, matched nothing, concatenation was used.
    ConcatFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconstruction {
    pub markdown: String,
    pub strategy: Strategy,
    /// Number of spans replaced (0 unless `strategy == Substitution`).
    pub substitutions: usize,
}

/// Strategy 1: page-ordered concatenation of display text.
pub fn layout_concat(blocks: &[TextBlock]) -> String {
    let mut pages: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for block in blocks {
        let text = block.display_text().trim();
        if !text.is_empty() {
            pages.entry(block.page).or_default().push(text);
        }
    }
    pages
        .into_values()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Strategy 2: replace original spans with their translations.
///
/// Returns the rewritten document and the number of replaced spans.
pub fn substitute(original: &str, blocks: &[TextBlock]) -> (String, usize) {
    let mut candidates: Vec<(&str, &str)> = blocks
        .iter()
        .filter_map(|b| {
            let text = b.text.trim();
            let translated = b.translated_text.as_deref()?.trim();
            (!translated.is_empty() && text.chars().count() > MIN_SUBSTITUTION_CHARS)
                .then_some((text, translated))
        })
        .collect();
    candidates.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

    let mut doc = original.to_string();
    let mut total = 0;
    for (text, translated) in candidates {
        let Some(re) = span_pattern(text) else {
            continue;
        };
        let mut hits = 0;
        let replaced = re.replace_all(&doc, |_: &regex::Captures<'_>| {
            hits += 1;
            translated.to_string()
        });
        if hits > 0 {
            doc = replaced.into_owned();
            total += hits;
        }
    }
    (doc, total)
}

/// Case-insensitive literal pattern that tolerates any whitespace run where
/// the block text has one (parsers re-flow line breaks).
fn span_pattern(text: &str) -> Option<Regex> {
    let escaped: Vec<String> = WHITESPACE_RUN
        .split(text)
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return None;
    }
    RegexBuilder::new(&escaped.join(r"\s+"))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Reconstruct a translated document from `original` and `blocks`.
pub fn reconstruct(original: &str, blocks: &[TextBlock]) -> Reconstruction {
    let concat = layout_concat(blocks);
    let original_len = original.chars().count();
    let concat_len = concat.chars().count();

    if concat_len as f64 > original_len as f64 * CONCAT_RATIO {
        debug!(concat_len, original_len, "Using layout concatenation");
        return Reconstruction {
            markdown: concat,
            strategy: Strategy::LayoutConcat,
            substitutions: 0,
        };
    }

    let (substituted, substitutions) = substitute(original, blocks);
    if substitutions > 0 {
        debug!(substitutions, "Using substring substitution");
        Reconstruction {
            markdown: substituted,
            strategy: Strategy::Substitution,
            substitutions,
        }
    } else {
        debug!("No span substituted; falling back to concatenation");
        Reconstruction {
            markdown: concat,
            strategy: Strategy::ConcatFallback,
            substitutions: 0,
        }
    }
}
