use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use postbox_types::api::{MessageBodyRequest, MessageIdResponse, SendMessageRequest};
use postbox_types::{MessageId, UserId};

use crate::auth::{AppState, Caller};
use crate::{ApiError, blocking};

pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = blocking(&state, move |store| {
        store.send(caller.user_id, &req.recipients, &req.body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(MessageIdResponse { message_id })))
}

/// `POST /users/{user_id}/messages`: single-recipient shorthand.
pub async fn send_direct(
    State(state): State<AppState>,
    Path(recipient_id): Path<UserId>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<MessageBodyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = blocking(&state, move |store| {
        store.send(caller.user_id, &[recipient_id], &req.body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(MessageIdResponse { message_id })))
}

pub async fn broadcast(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<MessageBodyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = blocking(&state, move |store| store.broadcast(caller.user_id, &req.body)).await?;
    Ok((StatusCode::CREATED, Json(MessageIdResponse { message_id })))
}

/// Fetching as a recipient marks the message read, which disables retraction.
pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<MessageId>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let message = blocking(&state, move |store| store.get_message(caller.user_id, message_id)).await?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<MessageId>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |store| store.delete_message(caller.user_id, message_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
