use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::extract::{IdPath, ValidJson, ValidQuery};
use super::read_cached;
use crate::{
    data::{article_key, tag_key},
    error::{AppError, AppResult, OptionExt},
    repo::{Page, TagRepo},
    state::AppState,
    types::{ListResponse, TagCreateRequest, TagListQuery, TagResponse, TagUpdateRequest},
};

pub async fn get_tag(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<Json<TagResponse>> {
    let key = tag_key(id);
    if let Some(cached) = read_cached::<TagResponse>(&state, &key).await {
        return Ok(Json(cached));
    }
    let epoch = state.data.cache_epoch();

    let tag: TagResponse = TagRepo::new(state.data.db()).get(id).await?.ok_or_not_found("tag")?.into();
    state.data.cache_fill(&key, &tag, epoch).await;
    Ok(Json(tag))
}

pub async fn list_tags(
    State(state): State<AppState>,
    ValidQuery(q): ValidQuery<TagListQuery>,
) -> AppResult<Json<ListResponse<TagResponse>>> {
    let page = Page::new(q.page, q.page_size);
    let (tags, total) = TagRepo::new(state.data.db()).list(&q.filter(), page).await?;
    Ok(Json(ListResponse {
        items: tags.into_iter().map(TagResponse::from).collect(),
        total,
        page: page.page,
        page_size: page.page_size,
    }))
}

pub async fn create_tag(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<TagCreateRequest>,
) -> AppResult<impl IntoResponse> {
    let tag = TagRepo::new(state.data.db()).create(req.into_new_tag()).await?;
    state.metrics.inc_tags_written();
    tracing::info!(tag_id = tag.id, name = %tag.name, "tag created");
    Ok((StatusCode::CREATED, Json(TagResponse::from(tag))))
}

pub async fn update_tag(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidJson(req): ValidJson<TagUpdateRequest>,
) -> AppResult<Json<TagResponse>> {
    let repo = TagRepo::new(state.data.db());
    // Articles embed the tag name. Read them first so nothing can fail between
    // the committed update and the eviction.
    let article_ids = repo.article_ids(id).await?;
    let tag = repo.update(id, req.into()).await?.ok_or_not_found("tag")?;
    state.metrics.inc_tags_written();
    evict_tag(&state, id, &article_ids).await;

    tracing::info!(tag_id = id, "tag updated");
    Ok(Json(tag.into()))
}

pub async fn delete_tag(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<StatusCode> {
    let repo = TagRepo::new(state.data.db());
    // Read before the delete detaches them.
    let article_ids = repo.article_ids(id).await?;
    if !repo.delete(id).await? {
        return Err(AppError::NotFound("tag not found".into()));
    }
    state.metrics.inc_tags_written();
    evict_tag(&state, id, &article_ids).await;

    tracing::info!(tag_id = id, detached = article_ids.len(), "tag deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn evict_tag(state: &AppState, id: i64, article_ids: &[i64]) {
    let mut keys = Vec::with_capacity(article_ids.len() + 1);
    keys.push(tag_key(id));
    keys.extend(article_ids.iter().copied().map(article_key));
    state.data.cache_evict(&keys).await;
}
