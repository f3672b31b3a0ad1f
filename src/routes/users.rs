use axum::{extract::State, Json};

use super::extract::IdPath;
use crate::{
    error::{AppResult, OptionExt},
    repo::UserRepo,
    state::AppState,
    types::UserResponse,
};

pub async fn get_user(State(state): State<AppState>, IdPath(id): IdPath) -> AppResult<Json<UserResponse>> {
    let user = UserRepo::new(state.data.db()).get(id).await?.ok_or_not_found("user")?;
    Ok(Json(user.into()))
}
