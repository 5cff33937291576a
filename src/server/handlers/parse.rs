//! Upload, parse submission, job status and layout normalization.

use crate::config::ModelVersion;
use crate::mineru::ExtractOptions;
use crate::model::{JobId, JobState, JobStatus, LayoutFile, ParseSubmission, UploadedFile};
use crate::progress::NoopProgressCallback;
use crate::server::error::{ok, ApiError, ApiResult};
use crate::server::state::AppState;
use crate::server::upload::parse_multipart;
use crate::workflow::{normalize_file, secure_filename, submit_upload, submit_url, wait_for_task};
use axum::extract::{Multipart, Path, State};
use tracing::info;

/// `POST /api/upload`
pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> ApiResult<UploadedFile> {
    let form = parse_multipart(multipart).await?;
    let file = form.require_file()?;
    file.save_into(&state.config.upload_dir).await?;
    ok(
        "File uploaded",
        UploadedFile {
            filename: file.filename.clone(),
        },
    )
}

/// `POST /api/parse-pdf`
///
/// With `file_url`, a URL task is created and, unless `wait=false`, polled to
/// completion on the server. Without it, the uploaded PDF goes through the
/// batch upload flow and the caller polls `/api/batch/{id}`.
pub async fn parse_pdf(State(state): State<AppState>, multipart: Multipart) -> ApiResult<ParseSubmission> {
    let form = parse_multipart(multipart).await?;
    let wait = form.flag("wait", true);
    let model_version = match form.text("model_version") {
        Some(v) => Some(
            ModelVersion::parse(v)
                .ok_or_else(|| ApiError::bad_request(format!("model_version must be 'vlm' or 'pipeline', got '{v}'")))?,
        ),
        None => None,
    };

    if let Some(file) = &form.file {
        if file.is_pdf() {
            file.save_into(&state.config.upload_dir).await?;
        }
    }

    let client = state.mineru.client();
    let Some(file_url) = form.text("file_url") else {
        let file = form
            .file
            .as_ref()
            .filter(|f| f.is_pdf())
            .ok_or_else(|| ApiError::bad_request("Provide file_url or upload a PDF file"))?;
        let job = submit_upload(client, &file.filename, file.data.clone(), model_version).await?;
        return ok(
            "File uploaded; MinerU will start parsing it automatically. Poll the batch_id for results",
            ParseSubmission {
                batch_id: Some(job.as_str().to_string()),
                state: JobState::WaitingFile,
                ..ParseSubmission::default()
            },
        );
    };

    let job = submit_url(client, file_url, model_version, &ExtractOptions::default()).await?;
    let task_id = job.as_str().to_string();
    if !wait {
        return ok(
            "Task submitted",
            ParseSubmission {
                task_id: Some(task_id),
                state: JobState::Pending,
                ..ParseSubmission::default()
            },
        );
    }

    let policy = state.config.server_poll_policy();
    info!(%job, max_attempts = policy.max_attempts, "Waiting for MinerU task");
    let outcome = wait_for_task(state.mineru.as_ref(), &job, policy, &NoopProgressCallback, None).await?;
    ok(
        "Parsed by MinerU",
        ParseSubmission {
            task_id: Some(task_id),
            state: JobState::Done,
            layout_count: Some(outcome.blocks.len()),
            layout: Some(outcome.blocks),
            mineru_data: outcome.status.mineru_data,
            full_md_path: outcome.status.full_md_path,
            ..ParseSubmission::default()
        },
    )
}

/// `GET /api/task/{id}`
pub async fn task_status(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult<JobStatus> {
    let status = state.mineru.status(&JobId::Task(task_id)).await?;
    ok("Query succeeded", status)
}

/// `GET /api/batch/{id}`
pub async fn batch_status(State(state): State<AppState>, Path(batch_id): Path<String>) -> ApiResult<JobStatus> {
    let status = state.mineru.status(&JobId::Batch(batch_id)).await?;
    ok("Query succeeded", status)
}

/// `POST /api/layout`: normalize an uploaded JSON file, or one already in
/// the parser folder named by the `filename` field.
pub async fn layout(State(state): State<AppState>, multipart: Multipart) -> ApiResult<LayoutFile> {
    let form = parse_multipart(multipart).await?;
    let mineru_dir = &state.config.mineru_dir;

    let input = match (&form.file, form.text("filename")) {
        (Some(file), _) => file.save_into(mineru_dir).await?,
        (None, Some(name)) => {
            let name = secure_filename(name).ok_or_else(|| ApiError::bad_request("Invalid file name"))?;
            mineru_dir.join(name)
        }
        (None, None) => return Err(ApiError::not_found("File not found")),
    };
    if !input.is_file() {
        return Err(ApiError::not_found("File not found"));
    }

    let (layout, output) = normalize_file(&input).await?;
    ok(
        "Layout parsed",
        LayoutFile {
            layout_count: layout.len(),
            layout_file: output.display().to_string(),
            layout,
        },
    )
}
