//! Result archive extraction.
//!
//! MinerU delivers every finished job as one ZIP holding the structured JSON
//! (`layout.json`, `*_content_list.json`, `*_model.json`), the reconstructed
//! `full.md` and an `images/` directory. This stage unpacks it under the
//! configured parser folder and locates the pieces the rest of the pipeline
//! needs.
//!
//! Extraction is synchronous; async callers wrap it in
//! `tokio::task::spawn_blocking`.

use crate::error::ReaderError;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Written last by [`extract_zip`]; marks a folder as fully unpacked.
const EXTRACTED_MARKER: &str = ".extracted";

/// What was found after unpacking a result archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArchive {
    pub dir: PathBuf,
    /// Structured JSON chosen for normalization.
    pub json_path: PathBuf,
    pub full_md_path: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,
    pub files_written: usize,
}

/// Unpack `data` into `dir` and locate the structured JSON.
///
/// Entries whose path would escape `dir` are skipped.
pub fn extract_zip(data: &[u8], dir: &Path) -> Result<ExtractedArchive, ReaderError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(|e| ReaderError::Archive {
        reason: format!("failed to open ZIP: {e}"),
    })?;

    std::fs::create_dir_all(dir).map_err(|e| ReaderError::io(dir, e))?;

    let mut files_written = 0usize;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| ReaderError::Archive {
            reason: format!("failed to read ZIP entry {i}: {e}"),
        })?;

        let Some(name) = file.enclosed_name() else {
            warn!(entry = file.name(), "Skipping ZIP entry outside the extraction directory");
            continue;
        };
        let out_path = dir.join(&name);

        if file.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| ReaderError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ReaderError::io(parent, e))?;
        }

        let mut buf = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut buf).map_err(|e| ReaderError::Archive {
            reason: format!("failed to extract '{}': {e}", name.display()),
        })?;
        std::fs::write(&out_path, &buf).map_err(|e| ReaderError::io(&out_path, e))?;
        files_written += 1;
    }
    debug!(dir = %dir.display(), files_written, "ZIP extracted");

    let extracted = locate_results(dir, files_written)?.ok_or_else(|| ReaderError::Archive {
        reason: format!("no JSON file found in result archive ({})", dir.display()),
    })?;
    let marker = dir.join(EXTRACTED_MARKER);
    std::fs::write(&marker, b"").map_err(|e| ReaderError::io(&marker, e))?;
    info!(json = %extracted.json_path.display(), "Structured parser output located");
    Ok(extracted)
}

/// Results left in `dir` by an earlier complete [`extract_zip`], if any.
/// A folder without the completion marker is treated as absent.
pub fn open_extracted(dir: &Path) -> Result<Option<ExtractedArchive>, ReaderError> {
    if !dir.join(EXTRACTED_MARKER).is_file() {
        return Ok(None);
    }
    locate_results(dir, 0)
}

fn locate_results(dir: &Path, files_written: usize) -> Result<Option<ExtractedArchive>, ReaderError> {
    let Some(json_path) = find_layout_json(dir)? else {
        return Ok(None);
    };
    let full_md_path = Some(dir.join("full.md"))
        .filter(|p| p.is_file())
        .or(find_file_recursive(dir, "full.md")?);
    let images_dir = Some(dir.join("images")).filter(|p| p.is_dir());

    Ok(Some(ExtractedArchive {
        dir: dir.to_path_buf(),
        json_path,
        full_md_path,
        images_dir,
        files_written,
    }))
}

/// Pick the JSON to normalize: `layout.json` at the root, else the first
/// JSON whose file name mentions `layout` or `model`, else the first JSON.
pub fn find_layout_json(dir: &Path) -> Result<Option<PathBuf>, ReaderError> {
    let root_layout = dir.join("layout.json");
    if root_layout.is_file() {
        return Ok(Some(root_layout));
    }

    let mut jsons = Vec::new();
    walk(dir, &mut |p| {
        if p.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            jsons.push(p.to_path_buf());
        }
    })?;
    jsons.sort();

    let preferred = jsons.iter().find(|p| {
        let name = file_name_lower(p);
        name.contains("layout") || name.contains("model")
    });
    Ok(preferred.or(jsons.first()).cloned())
}

/// Depth-first search for a file called `name` below `dir`.
pub fn find_file_recursive(dir: &Path, name: &str) -> Result<Option<PathBuf>, ReaderError> {
    let mut hits = Vec::new();
    walk(dir, &mut |p| {
        if p.file_name().is_some_and(|f| f == name) {
            hits.push(p.to_path_buf());
        }
    })?;
    // Shallowest match first, then lexical.
    hits.sort_by_key(|p| (p.components().count(), p.clone()));
    Ok(hits.into_iter().next())
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) -> Result<(), ReaderError> {
    if !dir.is_dir() {
        return Ok(());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| ReaderError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ReaderError::io(dir, e))?.path();
        if path.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}

fn file_name_lower(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Resolve `relative` under `root`, refusing anything that escapes it.
///
/// Returns `None` for absolute paths, `..` components or symlinks pointing
/// outside `root`. The target does not need to exist.
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    use std::path::Component;

    let rel = Path::new(relative);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    let joined = root.join(rel);
    match (joined.canonicalize(), root.canonicalize()) {
        (Ok(full), Ok(base)) if !full.starts_with(&base) => None,
        _ => Some(joined),
    }
}
