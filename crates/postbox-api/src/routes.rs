use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState, require_auth};
use crate::{messages, users};

async fn health() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users", post(auth::register))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/{user_id}", get(users::get_user).put(users::update_user))
        .route("/users/{user_id}/messages", post(messages::send_direct))
        .route("/users/{user_id}/received", get(users::received))
        .route("/users/{user_id}/sent", get(users::sent))
        .route("/usernames/{username}", get(users::get_user_by_username))
        .route("/messages", post(messages::send_message))
        .route("/messages/broadcast", post(messages::broadcast))
        .route(
            "/messages/{message_id}",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
