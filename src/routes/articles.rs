use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::extract::{IdPath, ValidJson, ValidQuery};
use super::read_cached;
use crate::{
    data::article_key,
    error::{AppError, AppResult, OptionExt},
    repo::{ArticleRepo, Page},
    state::AppState,
    types::{ArticleCreateRequest, ArticleListQuery, ArticleResponse, ArticleUpdateRequest, ListResponse},
};

pub async fn get_article(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> AppResult<Json<ArticleResponse>> {
    let key = article_key(id);
    if let Some(cached) = read_cached::<ArticleResponse>(&state, &key).await {
        return Ok(Json(cached));
    }
    let epoch = state.data.cache_epoch();

    let article: ArticleResponse =
        ArticleRepo::new(state.data.db()).get(id).await?.ok_or_not_found("article")?.into();
    state.data.cache_fill(&key, &article, epoch).await;
    Ok(Json(article))
}

pub async fn list_articles(
    State(state): State<AppState>,
    ValidQuery(q): ValidQuery<ArticleListQuery>,
) -> AppResult<Json<ListResponse<ArticleResponse>>> {
    let page = Page::new(q.page, q.page_size);
    let (articles, total) = ArticleRepo::new(state.data.db()).list(&q.filter(), page).await?;
    Ok(Json(ListResponse {
        items: articles.into_iter().map(ArticleResponse::from).collect(),
        total,
        page: page.page,
        page_size: page.page_size,
    }))
}

pub async fn create_article(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ArticleCreateRequest>,
) -> AppResult<impl IntoResponse> {
    let article = ArticleRepo::new(state.data.db()).create(req.into_new_article()).await?;
    state.metrics.inc_articles_written();
    tracing::info!(article_id = article.article.id, tags = article.tags.len(), "article created");
    Ok((StatusCode::CREATED, Json(ArticleResponse::from(article))))
}

pub async fn update_article(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    ValidJson(req): ValidJson<ArticleUpdateRequest>,
) -> AppResult<Json<ArticleResponse>> {
    let article = ArticleRepo::new(state.data.db()).update(id, req.into()).await?.ok_or_not_found("article")?;
    state.metrics.inc_articles_written();
    state.data.cache_evict(&[article_key(id)]).await;

    tracing::info!(article_id = id, "article updated");
    Ok(Json(article.into()))
}

pub async fn delete_article(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<StatusCode> {
    if !ArticleRepo::new(state.data.db()).delete(id).await? {
        return Err(AppError::NotFound("article not found".into()));
    }
    state.metrics.inc_articles_written();
    state.data.cache_evict(&[article_key(id)]).await;

    tracing::info!(article_id = id, "article deleted");
    Ok(StatusCode::NO_CONTENT)
}
