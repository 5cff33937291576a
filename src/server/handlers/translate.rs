//! `POST /api/translate-layout` and `POST /api/translate`.

use crate::model::{TranslateFileRequest, TranslateLayoutRequest, TranslatedFile, TranslationBatchResult};
use crate::pipeline::translate::summary_message;
use crate::server::error::{ok, ApiError, ApiResult};
use crate::server::state::AppState;
use crate::workflow::{secure_filename, translate_legacy_file};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which credentials were present when a translation failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub api_configured: bool,
    pub qwen_configured: bool,
    pub openai_configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateLayoutResponse {
    #[serde(flatten)]
    pub result: TranslationBatchResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<ErrorSummary>,
}

/// `POST /api/translate-layout`
pub async fn translate_layout(
    State(state): State<AppState>,
    body: Result<Json<TranslateLayoutRequest>, JsonRejection>,
) -> ApiResult<TranslateLayoutResponse> {
    let Json(request) = body?;
    if request.layout.is_empty() {
        return Err(ApiError::bad_request("layout is empty"));
    }
    let target_lang = request
        .target_lang
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.config.default_target_lang.clone());

    let endpoint = state.llm().endpoint();
    if endpoint.is_configured() {
        info!(provider = ?endpoint.provider, model = %endpoint.model, "Translating layout");
    } else {
        warn!("No LLM API key configured; every block will fail");
    }

    let result = state
        .translator
        .translate_blocks(
            request.layout,
            &target_lang,
            request.model.as_deref(),
            request.force_retranslate,
        )
        .await;

    let (qwen_configured, openai_configured) = state.provider_flags();
    let api_configured = qwen_configured || openai_configured;
    let message = summary_message(&result, api_configured);
    let error_summary = result.first_error.is_some().then_some(ErrorSummary {
        api_configured,
        qwen_configured,
        openai_configured,
    });

    ok(message, TranslateLayoutResponse { result, error_summary })
}

/// `POST /api/translate`: translate a legacy parser JSON file stored in the
/// parser folder.
pub async fn translate_file(
    State(state): State<AppState>,
    body: Result<Json<TranslateFileRequest>, JsonRejection>,
) -> ApiResult<TranslatedFile> {
    let Json(request) = body?;
    let name = secure_filename(&request.filename).ok_or_else(|| ApiError::bad_request("Invalid file name"))?;
    let input = state.config.mineru_dir.join(name);
    if !input.is_file() {
        return Err(ApiError::not_found("File not found"));
    }
    let target_lang = request
        .target_lang
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.config.default_target_lang.clone());

    let out = translate_legacy_file(state.llm(), &input, &target_lang, request.model.as_deref()).await?;
    ok(
        "Translation succeeded",
        TranslatedFile {
            translated_file: out.output_path.display().to_string(),
            target_lang,
        },
    )
}
