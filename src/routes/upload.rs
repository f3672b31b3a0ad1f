use std::path::Path;

use axum::{
    extract::{multipart::Field, Multipart, State},
    Json,
};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{
    config::UploadConfig,
    error::{AppError, AppResult},
    middleware::validation::{allowed_extension, sanitize_for_logging},
    state::AppState,
    types::UploadResponse,
};

/// `POST /c/upload/file`: stores the multipart `file` part under `upload.save_path`.
pub async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<Json<UploadResponse>> {
    let cfg = &state.config.upload;
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::BadRequest(e.body_text()))? {
        if field.name() != Some("file") {
            continue;
        }
        let original = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| AppError::field("file", "required", "file part must carry a file name"))?;
        let ext = allowed_extension(&original, &cfg.allowed_exts).ok_or_else(|| {
            AppError::field(
                "file",
                "extension",
                format!("file extension must be one of {}", cfg.allowed_exts.join(", ")),
            )
        })?;

        let file_name = format!("{}{}", Uuid::new_v4().simple(), ext);
        let written = save_field(field, cfg, &file_name).await?;
        state.metrics.record_upload(written);
        tracing::info!(
            original = %sanitize_for_logging(&original),
            file_name = %file_name,
            bytes = written,
            "file uploaded"
        );

        let file_access_url = format!("{}/{}", cfg.server_url.trim_end_matches('/'), file_name);
        return Ok(Json(UploadResponse { file_name, file_access_url }));
    }

    Err(AppError::field("file", "required", "multipart form must contain a 'file' part"))
}

/// Streams the part to disk, enforcing the size limit; a partial file is removed.
async fn save_field(mut field: Field<'_>, cfg: &UploadConfig, file_name: &str) -> AppResult<u64> {
    tokio::fs::create_dir_all(&cfg.save_path).await?;
    let dest = Path::new(&cfg.save_path).join(file_name);
    let mut file = tokio::fs::File::create(&dest).await?;

    let limit = cfg.max_size_bytes();
    let mut written: u64 = 0;
    let result: AppResult<()> = async {
        while let Some(chunk) = field.chunk().await.map_err(|e| AppError::BadRequest(e.body_text()))? {
            written += chunk.len() as u64;
            if written > limit {
                return Err(AppError::PayloadTooLarge(format!(
                    "file exceeds maximum size of {} MB",
                    cfg.max_size_mb
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        drop(file);
        if let Err(rm) = tokio::fs::remove_file(&dest).await {
            tracing::warn!(path = %dest.display(), "failed removing partial upload: {}", rm);
        }
        return Err(e);
    }
    Ok(written)
}
