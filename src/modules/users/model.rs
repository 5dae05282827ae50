//! User data models.
//!
//! - [`User`] - Public projection of a user row, as served and cached
//! - [`UserSearch`] - Query parameters accepted by the user listing

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A user as returned by the API.
///
/// The password column is never selected.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Filters for `GET /users`.
#[derive(Deserialize, Validate, Debug, Default, Clone)]
pub struct UserSearch {
    /// Exact username to match.
    #[validate(length(min = 1, max = 255, message = "search must be between 1 and 255 characters"))]
    pub search: Option<String>,
}
