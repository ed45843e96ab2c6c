use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Basic};
use postbox_store::Store;
use postbox_types::UserId;
use postbox_types::api::{RegisterRequest, UserIdResponse};

use crate::{ApiError, blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
}

/// Authenticated identity attached to the request by [`require_auth`].
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: UserId,
    pub username: String,
}

/// Verify HTTP Basic credentials against the store.
/// Any other scheme, or no `Authorization` header at all, is rejected.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth) = req.headers().typed_get::<Authorization<Basic>>() else {
        return Err(ApiError::unauthorized(
            "Missing or unsupported Authorization header, expected Basic",
        ));
    };

    let username = auth.username().to_string();
    let password = auth.password().to_string();
    let name = username.clone();
    let user_id = blocking(&state, move |store| store.authenticate(&name, &password)).await?;

    req.extensions_mut().insert(Caller { user_id, username });
    Ok(next.run(req).await)
}

/// Public registration: the only route that needs no credentials.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = blocking(&state, move |store| store.add_user(&req.username, &req.password)).await?;

    Ok((StatusCode::CREATED, Json(UserIdResponse { user_id })))
}
