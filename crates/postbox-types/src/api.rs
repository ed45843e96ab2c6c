use serde::{Deserialize, Serialize};

use crate::models::{MessageId, UserId};

// -- Users --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// `PUT /users/{user_id}` replaces username and password together.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserIdResponse {
    pub user_id: UserId,
}

// -- Messages --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipients: Vec<UserId>,
    pub body: String,
}

/// Body-only request used by direct sends and broadcasts.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessageBodyRequest {
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageIdResponse {
    pub message_id: MessageId,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub description: String,
}
