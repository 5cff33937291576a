//! Layout normalizer: raw parser output of unknown shape → canonical blocks.
//!
//! Four shapes are recognised, tried in this order:
//!
//! 1. `layout.json`: `{"pdf_info": [{"page_idx": 0, "para_blocks": [{type,
//!    bbox, lines: [{spans: [{content}]}]}]}]}`
//! 2. `content_list.json`: `[{"text", "bbox", "page_idx", "text_level"?}]`
//! 3. `model.json`: `[[{"type", "bbox", "content"}], ...]`, one inner array
//!    per page
//! 4. legacy: `{"pages": [{"page_no", "blocks": [{type, bbox, lines: [{text}]}]}]}`
//!
//! Blocks with empty text or a missing/short bbox are dropped. Every block
//! that survives gets a sequential synthetic `id` in extraction order.
//! Unrecognised input yields an empty list.

use crate::model::{BBox, BlockKind, TextBlock};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Which of the known payload shapes was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutShape {
    PdfInfo,
    ContentList,
    PageArrays,
    LegacyPages,
}

impl LayoutShape {
    /// Detect the shape of `data` without extracting anything.
    pub fn detect(data: &Value) -> Option<Self> {
        match data {
            Value::Object(map) if map.contains_key("pdf_info") => Some(LayoutShape::PdfInfo),
            Value::Array(items) => match items.first()? {
                Value::Object(first) if first.contains_key("text") && first.contains_key("page_idx") => {
                    Some(LayoutShape::ContentList)
                }
                Value::Array(_) => Some(LayoutShape::PageArrays),
                _ => None,
            },
            Value::Object(map) => map
                .get("pages")
                .and_then(Value::as_array)
                .filter(|p| !p.is_empty())
                .map(|_| LayoutShape::LegacyPages),
            _ => None,
        }
    }
}

/// Normalize one raw parser payload into an ordered list of text blocks.
pub fn normalize_layout(data: &Value) -> Vec<TextBlock> {
    let Some(shape) = LayoutShape::detect(data) else {
        warn!("Unrecognised parser output shape; no blocks extracted");
        debug!(kind = value_kind(data), "Unrecognised payload");
        return Vec::new();
    };

    let mut blocks = match shape {
        LayoutShape::PdfInfo => from_pdf_info(data),
        LayoutShape::ContentList => from_content_list(data),
        LayoutShape::PageArrays => from_page_arrays(data),
        LayoutShape::LegacyPages => from_legacy_pages(data),
    };

    for (i, block) in blocks.iter_mut().enumerate() {
        block.id = u32::try_from(i).ok();
    }
    info!(?shape, blocks = blocks.len(), "Layout normalized");
    blocks
}

// ── Shape 1: pdf_info ────────────────────────────────────────────────────

fn from_pdf_info(data: &Value) -> Vec<TextBlock> {
    let mut out = Vec::new();
    for page in array(data.get("pdf_info")) {
        let page_no = one_based(page.get("page_idx"));
        for block in array(page.get("para_blocks")) {
            let Some(kind) = text_or_title(block) else {
                continue;
            };
            let Some(bbox) = bbox_of(block.get("bbox")) else {
                continue;
            };
            let parts: Vec<&str> = array(block.get("lines"))
                .flat_map(|line| array(line.get("spans")))
                .filter_map(|span| span.get("content").and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .collect();
            push_block(&mut out, page_no, bbox, &parts.join(" "), kind);
        }
    }
    out
}

// ── Shape 2: content list ────────────────────────────────────────────────

fn from_content_list(data: &Value) -> Vec<TextBlock> {
    let mut out = Vec::new();
    for item in array(Some(data)) {
        let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
        let Some(bbox) = bbox_of(item.get("bbox")) else {
            continue;
        };
        let kind = if item.get("text_level").and_then(Value::as_i64) == Some(1) {
            BlockKind::Title
        } else {
            BlockKind::from_raw(item.get("type").and_then(Value::as_str).unwrap_or("text"))
        };
        push_block(&mut out, one_based(item.get("page_idx")), bbox, text, kind);
    }
    out
}

// ── Shape 3: one array per page ──────────────────────────────────────────

fn from_page_arrays(data: &Value) -> Vec<TextBlock> {
    let mut out = Vec::new();
    for (idx, page) in array(Some(data)).enumerate() {
        let page_no = page_number_from_index(idx);
        for block in array(Some(page)) {
            let text = block.get("content").and_then(Value::as_str).unwrap_or_default();
            let Some(bbox) = bbox_of(block.get("bbox")) else {
                continue;
            };
            let kind = BlockKind::from_raw(block.get("type").and_then(Value::as_str).unwrap_or("text"));
            push_block(&mut out, page_no, bbox, text, kind);
        }
    }
    out
}

// ── Shape 4: legacy pages ────────────────────────────────────────────────

fn from_legacy_pages(data: &Value) -> Vec<TextBlock> {
    let mut out = Vec::new();
    for (idx, page) in array(data.get("pages")).enumerate() {
        let page_no = legacy_page_number(page, idx);
        for block in array(page.get("blocks")) {
            let Some(kind) = text_or_title(block) else {
                continue;
            };
            let Some(bbox) = bbox_of(block.get("bbox").or_else(|| block.get("bbox_coords"))) else {
                continue;
            };
            let parts: Vec<&str> = array(block.get("lines"))
                .filter_map(|line| {
                    let text = line.get("text").and_then(Value::as_str).filter(|s| !s.is_empty());
                    text.or_else(|| line.get("content").and_then(Value::as_str))
                })
                .filter(|s| !s.is_empty())
                .collect();
            push_block(&mut out, page_no, bbox, &parts.join(" "), kind);
        }
    }
    out
}

/// `page_no`, `page`, `pageNo` in that order, skipping absent or zero values;
/// then `page_idx + 1`; then the position in the array.
fn legacy_page_number(page: &Value, idx: usize) -> u32 {
    ["page_no", "page", "pageNo"]
        .iter()
        .filter_map(|k| page.get(*k).and_then(Value::as_u64))
        .find(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_else(|| match page.get("page_idx") {
            Some(v) => one_based(Some(v)),
            None => page_number_from_index(idx),
        })
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn push_block(out: &mut Vec<TextBlock>, page: u32, bbox: BBox, text: &str, kind: BlockKind) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    out.push(TextBlock::new(page, bbox, text, kind));
}

fn array<'a>(v: Option<&'a Value>) -> impl Iterator<Item = &'a Value> {
    v.and_then(Value::as_array).into_iter().flatten()
}

/// Accept only the block types the overlay renders.
fn text_or_title(block: &Value) -> Option<BlockKind> {
    match block.get("type").and_then(Value::as_str)? {
        "text" => Some(BlockKind::Text),
        "title" => Some(BlockKind::Title),
        _ => None,
    }
}

fn bbox_of(v: Option<&Value>) -> Option<BBox> {
    let values: Vec<f64> = v?.as_array()?.iter().filter_map(Value::as_f64).collect();
    BBox::from_values(&values)
}

/// Zero-based index field → 1-based page number. Missing or negative → 1.
fn one_based(v: Option<&Value>) -> u32 {
    let idx = v.and_then(Value::as_u64).unwrap_or(0);
    u32::try_from(idx.saturating_add(1)).unwrap_or(u32::MAX)
}

fn page_number_from_index(idx: usize) -> u32 {
    u32::try_from(idx.saturating_add(1)).unwrap_or(u32::MAX)
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Mutable access to the `pages` array of a legacy payload.
pub(crate) fn legacy_pages_mut(data: &mut Value) -> Option<&mut Vec<Value>> {
    data.get_mut("pages").and_then(Value::as_array_mut)
}
