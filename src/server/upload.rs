use crate::server::error::ApiError;
use crate::workflow::{allowed_file, check_pdf_magic, secure_filename, ALLOWED_EXTENSIONS};
use axum::extract::Multipart;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// The `file` part of a multipart upload.
#[derive(Debug)]
pub struct UploadedPart {
    /// Sanitized file name.
    pub filename: String,
    pub data: Vec<u8>,
}

impl UploadedPart {
    pub fn is_pdf(&self) -> bool {
        self.filename.to_ascii_lowercase().ends_with(".pdf")
    }

    /// Write the file into `dir`, creating it if needed.
    pub async fn save_into(&self, dir: &Path) -> Result<PathBuf, ApiError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ApiError::internal(format!("Cannot create '{}': {e}", dir.display())))?;
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, &self.data)
            .await
            .map_err(|e| ApiError::internal(format!("Cannot save '{}': {e}", path.display())))?;
        info!(path = %path.display(), bytes = self.data.len(), "Upload saved");
        Ok(path)
    }
}

/// Parsed multipart form: an optional file plus text fields.
#[derive(Debug, Default)]
pub struct FormFields {
    pub file: Option<UploadedPart>,
    /// Raw name of a file part that was rejected (empty or disallowed).
    pub rejected_file: Option<String>,
    pub fields: HashMap<String, String>,
}

impl FormFields {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    /// `true`/`false` field with a default.
    pub fn flag(&self, name: &str, default: bool) -> bool {
        self.text(name)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    /// The accepted file, or a 400 explaining why there is none.
    pub fn require_file(&self) -> Result<&UploadedPart, ApiError> {
        match (&self.file, &self.rejected_file) {
            (Some(file), _) => Ok(file),
            (None, Some(name)) if name.is_empty() => Err(ApiError::bad_request("File name is empty")),
            (None, Some(name)) => Err(ApiError::bad_request(format!(
                "Unsupported file type '{name}', only {} are accepted",
                ALLOWED_EXTENSIONS.join(", ")
            ))),
            (None, None) => Err(ApiError::bad_request("No file in the request")),
        }
    }
}

/// Read every part of `multipart`. The part named `file` must have an
/// allowed extension; PDFs must start with `%PDF-`.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<FormFields, ApiError> {
    let mut form = FormFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read form field: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let raw_name = field.file_name().unwrap_or("").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file data: {e}")))?
                .to_vec();

            let filename = allowed_file(&raw_name).then(|| secure_filename(&raw_name)).flatten();
            match filename {
                Some(filename) => {
                    let part = UploadedPart { filename, data };
                    if part.is_pdf() {
                        check_pdf_magic(&part.filename, &part.data)?;
                    }
                    form.file = Some(part);
                }
                None => form.rejected_file = Some(raw_name),
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read field '{name}': {e}")))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}
