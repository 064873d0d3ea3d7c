use archer_health_shared::api;
use archer_health_shared::domain::CONNECTION_CODE_TTL_MINUTES;
use axum::{
    Json,
    extract::{Extension, State},
};
use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;

use super::{AppError, AppState, auth::AuthCtx};

/// Oldest issuance timestamp still considered live.
pub(super) fn code_cutoff() -> NaiveDateTime {
    (Utc::now() - Duration::minutes(CONNECTION_CODE_TTL_MINUTES)).naive_utc()
}

fn generate_code() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Mints a fresh connection code for the caller. Overwrites whatever code
/// was stored before, so an unredeemed earlier code stops working.
pub(super) async fn api_generate_connection_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<api::ConnectionCodeResp>, AppError> {
    // An authenticated subject without a user row is a provisioning
    // failure, not a client error; it surfaces as a generic internal error.
    let user = state
        .store
        .get_user_by_subject(&auth.claims.sub)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| {
            AppError::internal(format!(
                "no user row for authenticated subject {}",
                auth.claims.sub
            ))
        })?;
    let code = generate_code();
    state
        .store
        .set_connection_code(user.id, &code, Utc::now().naive_utc())
        .await
        .map_err(AppError::internal)?;
    Ok(Json(api::ConnectionCodeResp {
        connection_code: code,
    }))
}

/// Called server-to-server by the companion app; no session. Field
/// presence is checked here so a missing field reports 400 regardless of
/// the other one.
pub(super) async fn api_redeem_connection_code(
    State(state): State<AppState>,
    Json(body): Json<api::RedeemReq>,
) -> Result<Json<api::RedeemResp>, AppError> {
    let code = required_field(body.connection_code.as_deref(), "connectionCode")?;
    // Accepted for validation only; the mobile-side id is not persisted.
    let _aqua_user_id = required_field(body.archer_aqua_user_id.as_deref(), "archerAquaUserId")?;

    let redeemed = state
        .store
        .redeem_connection_code(code, code_cutoff())
        .await
        .map_err(AppError::internal)?;
    match redeemed {
        Some(user) => Ok(Json(api::RedeemResp {
            success: true,
            archer_health_user_id: user.id,
        })),
        None => Err(AppError::not_found("unknown connection code")),
    }
}

fn required_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::bad_request(format!("{name} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archer_health_shared::domain::CONNECTION_CODE_LEN;

    #[test]
    fn generated_codes_are_lowercase_hex() {
        let code = generate_code();
        assert_eq!(code.len(), CONNECTION_CODE_LEN);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn generated_codes_do_not_repeat() {
        assert_ne!(generate_code(), generate_code());
    }

    #[test]
    fn required_field_rejects_missing_and_blank() {
        assert!(required_field(None, "x").is_err());
        assert!(required_field(Some(""), "x").is_err());
        assert!(required_field(Some("   "), "x").is_err());
        assert_eq!(required_field(Some("abc"), "x").unwrap(), "abc");
    }

    #[test]
    fn cutoff_is_in_the_past() {
        assert!(code_cutoff() < Utc::now().naive_utc());
    }
}
