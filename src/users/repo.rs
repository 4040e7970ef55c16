use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Closed role enumeration. Variant order is privilege order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_moderator(self) -> bool {
        matches!(self, Role::Moderator)
    }

    /// Explicit privilege comparison: admin ⊇ moderator ⊇ user.
    pub fn at_least(self, other: Role) -> bool {
        self >= other
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// Identity record. `updated_at` is a security nonce, not an audit column:
/// every mutation of it invalidates all outstanding confirmation codes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub updated_at: OffsetDateTime,
}

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, updated_at";

/// Admin-created user, all profile fields up front.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

impl User {
    pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Registration insert; `updated_at` defaults to now and seeds the first
    /// code family.
    pub async fn create(db: &PgPool, username: &str, email: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Refreshes the nonce, retiring every previously issued code for this
    /// user and starting a new code family.
    pub async fn touch(db: &PgPool, id: Uuid) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Conditional nonce rotation: succeeds only if `updated_at` still holds
    /// the value the submitted code was derived from. Returns `None` when a
    /// concurrent confirmation got there first.
    pub async fn rotate_if_unchanged(
        db: &PgPool,
        id: Uuid,
        seen: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET updated_at = now() \
             WHERE id = $1 AND updated_at = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(seen)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn list(
        db: &PgPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NULL OR username ILIKE '%' || $1 || '%') \
             ORDER BY username LIMIT $2 OFFSET $3"
        ))
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn create_full(db: &PgPool, new: &NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, first_name, last_name, bio, role) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.bio)
        .bind(new.role)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update(db: &PgPool, id: Uuid, patch: &UserPatch) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
               username = COALESCE($2, username), \
               email = COALESCE($3, email), \
               first_name = COALESCE($4, first_name), \
               last_name = COALESCE($5, last_name), \
               bio = COALESCE($6, bio), \
               role = COALESCE($7, role) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.username.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.first_name.as_deref())
        .bind(patch.last_name.as_deref())
        .bind(patch.bio.as_deref())
        .bind(patch.role)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn delete_by_username(db: &PgPool, username: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[sqlx::test]
    async fn rotate_if_unchanged_is_single_use(db: PgPool) {
        let user = User::create(&db, "neo", "neo@matrix.io").await.expect("create");

        let rotated = User::rotate_if_unchanged(&db, user.id, user.updated_at)
            .await
            .expect("first rotation");
        assert!(rotated.is_some());

        let replay = User::rotate_if_unchanged(&db, user.id, user.updated_at)
            .await
            .expect("second rotation");
        assert!(replay.is_none(), "stale nonce must not rotate again");
    }

    #[sqlx::test]
    async fn touch_rotates_the_nonce(db: PgPool) {
        let user = User::create(&db, "neo", "neo@matrix.io").await.expect("create");
        let touched = User::touch(&db, user.id).await.expect("touch");
        assert_ne!(touched.updated_at, user.updated_at);
    }

    #[sqlx::test]
    async fn duplicate_username_surfaces_as_validation(db: PgPool) {
        User::create(&db, "neo", "neo@matrix.io").await.expect("create");
        let err = User::create(&db, "neo", "smith@matrix.io")
            .await
            .expect_err("unique violation");
        assert!(matches!(ApiError::from(err), ApiError::Validation { .. }));
    }

    #[test]
    fn role_privilege_order() {
        assert!(Role::Admin.at_least(Role::Moderator));
        assert!(Role::Admin.at_least(Role::User));
        assert!(Role::Moderator.at_least(Role::User));
        assert!(!Role::User.at_least(Role::Moderator));
        assert!(!Role::Moderator.at_least(Role::Admin));
        assert!(Role::User.at_least(Role::User));
    }

    #[test]
    fn capability_flags() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Admin.is_moderator());
        assert!(Role::Moderator.is_moderator());
        assert!(!Role::User.is_admin());
        assert!(!Role::User.is_moderator());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), "\"moderator\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn default_role_is_user() {
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn user_json_never_exposes_the_nonce() {
        let user = User {
            id: Uuid::new_v4(),
            username: "neo".into(),
            email: "neo@matrix.io".into(),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role: Role::User,
            updated_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("updated_at"));
    }
}
