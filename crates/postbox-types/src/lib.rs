pub mod api;
pub mod models;

pub use models::{MessageId, MessageInfo, UserId, UserInfo};
