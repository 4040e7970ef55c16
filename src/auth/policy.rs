use axum::http::Method;
use uuid::Uuid;

use crate::error::ApiError;
use crate::users::repo::{Role, User};

/// Composable per-request predicates. Resource endpoints compose them any-of:
/// categories/genres/titles use `[ReadOnly, IsAdmin]`, reviews/comments use
/// `[IsRedactor]`, the profile endpoint uses `[Me]`, user management uses
/// `[IsAdmin]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Side-effect-free methods only, for any caller including anonymous.
    ReadOnly,
    /// Authenticated callers with the admin role, any operation.
    IsAdmin,
    /// Reads for everyone, create for any authenticated caller,
    /// update/delete for the resource author or moderator/admin.
    IsRedactor,
    /// Authenticated caller acting on a resource identified as themselves.
    Me,
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

impl Policy {
    /// Request-level check, before any resource is loaded.
    pub fn allows(self, method: &Method, caller: Option<&User>) -> bool {
        match self {
            Policy::ReadOnly => is_safe(method),
            Policy::IsAdmin => caller.map(|u| u.role.is_admin()).unwrap_or(false),
            Policy::IsRedactor => caller.is_some() || is_safe(method),
            Policy::Me => caller.is_some(),
        }
    }

    /// Object-level check against the loaded resource. `owner` is the
    /// resource author's id, or the target identity for `Me`.
    pub fn allows_object(self, method: &Method, caller: Option<&User>, owner: Option<Uuid>) -> bool {
        match self {
            Policy::ReadOnly => is_safe(method),
            Policy::IsAdmin => caller.map(|u| u.role.is_admin()).unwrap_or(false),
            Policy::IsRedactor => {
                if is_safe(method) {
                    return true;
                }
                if *method == Method::POST {
                    return caller.is_some();
                }
                match caller {
                    Some(u) => owner == Some(u.id) || u.role.at_least(Role::Moderator),
                    None => false,
                }
            }
            Policy::Me => matches!((caller, owner), (Some(u), Some(o)) if u.id == o),
        }
    }
}

/// Any-of composition over the request-level checks.
pub fn authorize(policies: &[Policy], method: &Method, caller: Option<&User>) -> Result<(), ApiError> {
    if policies.iter().any(|p| p.allows(method, caller)) {
        return Ok(());
    }
    deny(caller)
}

/// Any-of composition requiring both levels from the same policy.
pub fn authorize_object(
    policies: &[Policy],
    method: &Method,
    caller: Option<&User>,
    owner: Option<Uuid>,
) -> Result<(), ApiError> {
    if policies
        .iter()
        .any(|p| p.allows(method, caller) && p.allows_object(method, caller, owner))
    {
        return Ok(());
    }
    deny(caller)
}

/// Anonymous callers get 401, authenticated-but-insufficient callers 403.
fn deny(caller: Option<&User>) -> Result<(), ApiError> {
    match caller {
        None => Err(ApiError::Unauthenticated("authentication required".into())),
        Some(_) => Err(ApiError::PermissionDenied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::{Role, User};
    use time::OffsetDateTime;

    fn user_with_role(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "caller".into(),
            email: "caller@example.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn read_only_allows_get_for_anonymous() {
        assert!(Policy::ReadOnly.allows(&Method::GET, None));
        assert!(!Policy::ReadOnly.allows(&Method::POST, None));
        assert!(!Policy::ReadOnly.allows(&Method::DELETE, Some(&user_with_role(Role::Admin))));
    }

    #[test]
    fn is_admin_requires_admin_role() {
        let admin = user_with_role(Role::Admin);
        let plain = user_with_role(Role::User);
        assert!(Policy::IsAdmin.allows(&Method::DELETE, Some(&admin)));
        assert!(!Policy::IsAdmin.allows(&Method::GET, Some(&plain)));
        assert!(!Policy::IsAdmin.allows(&Method::GET, None));
    }

    #[test]
    fn redactor_reads_are_public_and_creates_need_auth() {
        assert!(Policy::IsRedactor.allows(&Method::GET, None));
        assert!(!Policy::IsRedactor.allows(&Method::POST, None));
        assert!(Policy::IsRedactor.allows(&Method::POST, Some(&user_with_role(Role::User))));
    }

    #[test]
    fn redactor_object_allows_author_moderator_admin_only() {
        let author = user_with_role(Role::User);
        let stranger = user_with_role(Role::User);
        let moderator = user_with_role(Role::Moderator);
        let admin = user_with_role(Role::Admin);
        let owner = Some(author.id);

        assert!(Policy::IsRedactor.allows_object(&Method::PATCH, Some(&author), owner));
        assert!(!Policy::IsRedactor.allows_object(&Method::PATCH, Some(&stranger), owner));
        assert!(Policy::IsRedactor.allows_object(&Method::DELETE, Some(&moderator), owner));
        assert!(Policy::IsRedactor.allows_object(&Method::DELETE, Some(&admin), owner));
        assert!(!Policy::IsRedactor.allows_object(&Method::DELETE, None, owner));
        assert!(Policy::IsRedactor.allows_object(&Method::GET, None, owner));
    }

    #[test]
    fn me_only_matches_own_identity() {
        let user = user_with_role(Role::User);
        assert!(Policy::Me.allows_object(&Method::GET, Some(&user), Some(user.id)));
        assert!(!Policy::Me.allows_object(&Method::GET, Some(&user), Some(Uuid::new_v4())));
        assert!(!Policy::Me.allows_object(&Method::GET, None, Some(user.id)));
    }

    #[test]
    fn any_of_composition_public_read_admin_write() {
        let policies = [Policy::ReadOnly, Policy::IsAdmin];
        let admin = user_with_role(Role::Admin);
        let plain = user_with_role(Role::User);

        assert!(authorize(&policies, &Method::GET, None).is_ok());
        assert!(authorize(&policies, &Method::POST, Some(&admin)).is_ok());
        assert!(matches!(
            authorize(&policies, &Method::POST, Some(&plain)),
            Err(ApiError::PermissionDenied)
        ));
        assert!(matches!(
            authorize(&policies, &Method::POST, None),
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[test]
    fn redactor_denial_maps_to_403_for_authenticated_strangers() {
        let stranger = user_with_role(Role::User);
        let owner = Some(Uuid::new_v4());
        assert!(matches!(
            authorize_object(&[Policy::IsRedactor], &Method::DELETE, Some(&stranger), owner),
            Err(ApiError::PermissionDenied)
        ));
    }
}
