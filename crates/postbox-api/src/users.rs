use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use postbox_types::UserId;
use postbox_types::api::{UpdateUserRequest, UserIdResponse};

use crate::auth::{AppState, Caller};
use crate::{ApiError, blocking};

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let users = blocking(&state, |store| store.list_users()).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |store| store.get_user(user_id)).await?;
    Ok(Json(user))
}

pub async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |store| store.get_user_by_username(&username)).await?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = blocking(&state, move |store| {
        store.update_user(caller.user_id, user_id, &req.username, &req.password)
    })
    .await?;
    Ok(Json(UserIdResponse { user_id }))
}

pub async fn received(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = blocking(&state, move |store| store.get_received(user_id)).await?;
    Ok(Json(ids))
}

pub async fn sent(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Extension(_caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = blocking(&state, move |store| store.get_sent(user_id)).await?;
    Ok(Json(ids))
}
