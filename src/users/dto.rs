use serde::{Deserialize, Serialize};

use crate::users::repo::{Role, User};

/// Profile payload for `/users/` and `/users/me/`.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
        }
    }
}

/// Partial self-update. `role` is deliberately absent: read-only through
/// the profile endpoint.
#[derive(Debug, Deserialize)]
pub struct MePatchRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

/// Admin user creation.
#[derive(Debug, Deserialize)]
pub struct AdminCreateRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub role: Role,
}

/// Admin partial update; may also change the role.
#[derive(Debug, Deserialize)]
pub struct AdminPatchRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

fn default_limit() -> i64 {
    50
}

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

impl UserListQuery {
    /// Negative or oversized values never reach LIMIT/OFFSET.
    pub fn limit(&self) -> i64 {
        self.limit.clamp(0, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}
