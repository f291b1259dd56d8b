use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys, repo_types::Identity, roles::Role};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// Extracts and validates an access JWT, returning the user ID.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                return Err(AppError::Unauthorized("Invalid or expired token".into()));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser(claims.sub))
    }
}

/// The authenticated caller with its role as currently stored.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub member_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
}

impl CurrentUser {
    pub fn from_identity(identity: Identity) -> AppResult<Self> {
        if !identity.is_active {
            return Err(AppError::Unauthorized(
                "Account is deactivated. Please contact administrator.".into(),
            ));
        }
        let role = identity.role.parse::<Role>().map_err(|e| {
            warn!(user_id = %identity.user_id, error = %e, "account has unknown role");
            AppError::forbidden()
        })?;
        Ok(Self {
            user_id: identity.user_id,
            email: identity.email,
            role,
            member_id: identity.member_id,
            trainer_id: identity.trainer_id,
        })
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.is(Role::Admin)
    }

    /// Fails with 403 unless the stored role is in `allowed`.
    pub fn require(&self, allowed: &[Role]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            warn!(user_id = %self.user_id, role = %self.role, "role not permitted");
            Err(AppError::forbidden())
        }
    }

    /// True when the caller is a member acting on their own profile.
    pub fn is_member_self(&self, member_id: Uuid) -> bool {
        self.is(Role::Member) && self.member_id == Some(member_id)
    }

    pub fn is_trainer_self(&self, trainer_id: Uuid) -> bool {
        self.is(Role::Trainer) && self.trainer_id == Some(trainer_id)
    }

    pub fn own_member_id(&self) -> AppResult<Uuid> {
        self.member_id
            .ok_or_else(|| AppError::not_found("Member profile not found"))
    }

    pub fn own_trainer_id(&self) -> AppResult<Uuid> {
        self.trainer_id
            .ok_or_else(|| AppError::not_found("Trainer profile not found"))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;

        let mut conn = state.db.acquire().await?;
        let identity = Identity::load(&mut conn, user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

        CurrentUser::from_identity(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: &str, active: bool) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "x@gym.test".into(),
            is_active: active,
            role: role.into(),
            member_id: Some(Uuid::new_v4()),
            trainer_id: None,
        }
    }

    #[test]
    fn inactive_accounts_are_unauthorized() {
        let err = CurrentUser::from_identity(identity("member", false)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn stored_role_drives_permissions() {
        let user = CurrentUser::from_identity(identity("TRAINER", true)).unwrap();
        assert!(user.require(&[Role::Admin, Role::Trainer]).is_ok());
        assert!(matches!(
            user.require(&[Role::Admin]),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn unknown_role_is_forbidden() {
        let err = CurrentUser::from_identity(identity("janitor", true)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn member_self_check() {
        let user = CurrentUser::from_identity(identity("member", true)).unwrap();
        let own = user.member_id.unwrap();
        assert!(user.is_member_self(own));
        assert!(!user.is_member_self(Uuid::new_v4()));
        assert!(user.own_trainer_id().is_err());
    }
}
