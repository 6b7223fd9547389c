//! Session identity: the logged-in user's id lives in the
//! Postgres-backed session under [`SESSION_USER_ID_KEY`].

use store::{DirectoryStore, PgStore, User};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::ApiError;

/// Key for storing the user id in the session.
pub const SESSION_USER_ID_KEY: &str = "user_id";

/// Resolve the session to a user, if any. A stale id (user row gone)
/// counts as logged out rather than an error.
pub async fn current_user(session: &Session, store: &PgStore) -> Result<Option<User>, ApiError> {
    let Some(id) = session.get::<Uuid>(SESSION_USER_ID_KEY).await? else {
        return Ok(None);
    };
    match store.get_user(id).await {
        Ok(user) => Ok(Some(user)),
        Err(store::Error::NotFound { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
