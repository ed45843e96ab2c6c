pub mod auth;
pub mod error;
pub mod messages;
pub mod routes;
pub mod users;

pub use auth::{AppState, AppStateInner, Caller};
pub use error::ApiError;
pub use routes::router;

use postbox_store::{Store, StoreError, StoreResult};
use tracing::error;

/// Run a store call off the async runtime. Every store operation takes a
/// backend lock, so none of them may run on a runtime worker.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Store) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.store))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::from(StoreError::Internal(e.into()))
        })?
        .map_err(ApiError::from)
}
