use archer_health_shared::jwt::{self, SessionClaims};
use axum::http::{HeaderMap, header};
use tracing::warn;

use super::{AppError, AppState};
use crate::storage::models::User;

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: SessionClaims,
}

pub(super) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?;
    let s = value.to_str().ok()?;
    s.strip_prefix("Bearer ")
}

/// Verifies the identity-provider session token with the shared secret.
/// Without a configured secret no session can validate, so everything
/// gated on a session is unauthorized.
pub(super) fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthCtx, AppError> {
    let Some(secret) = state.config.session_jwt_secret.as_deref() else {
        warn!("auth: no session verification secret configured");
        return Err(AppError::unauthorized());
    };
    let Some(token) = bearer_token(headers) else {
        return Err(AppError::unauthorized());
    };
    let claims = match jwt::decode_and_verify(token, secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error=%e, "auth: session token rejected");
            return Err(AppError::unauthorized());
        }
    };
    Ok(AuthCtx { claims })
}

/// Maps the verified subject to its stored user row. Session endpoints
/// other than sync-user treat a missing row as NotFound.
pub(super) async fn resolve_user(state: &AppState, auth: &AuthCtx) -> Result<User, AppError> {
    state
        .store
        .get_user_by_subject(&auth.claims.sub)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| {
            warn!(subject = %auth.claims.sub, "no user row for authenticated subject");
            AppError::not_found("no account for this identity")
        })
}
