use axum::response::Response;
use axum::{extract::State, http::Request, middleware::Next};
use tracing::Span;

use super::{AppError, AppState, auth};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Session,
}

/// Ordered route-protection table, evaluated top to bottom before dispatch.
/// Carve-outs for cross-system and reflective endpoints come first; the
/// final rule gates every other API path behind a verified session.
/// The hydration lookup is listed public because it enforces its own
/// bearer-code check in the handler.
const GATE_RULES: &[(&str, Access)] = &[
    ("/healthz", Access::Public),
    ("/api/auth-enabled", Access::Public),
    ("/api/redeem-connection-code", Access::Public),
    ("/api/water/hydration-goals", Access::Public),
    ("/api", Access::Session),
];

pub(super) fn required_access(path: &str) -> Access {
    for (pattern, access) in GATE_RULES {
        if pattern_matches(pattern, path) {
            return *access;
        }
    }
    // Anything outside the table has no handler; the router 404s it.
    Access::Public
}

/// A pattern matches its exact path or any subpath below it, never a mere
/// string prefix ("/api" must not match "/apixyz").
fn pattern_matches(pattern: &str, path: &str) -> bool {
    path == pattern
        || path
            .strip_prefix(pattern)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub(super) async fn enforce_gate(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    if required_access(req.uri().path()) == Access::Session {
        let ctx = auth::authenticate(&state, req.headers())?;
        Span::current().record("subject", tracing::field::display(&ctx.claims.sub));
        req.extensions_mut().insert(ctx);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carve_outs_are_public() {
        assert_eq!(required_access("/healthz"), Access::Public);
        assert_eq!(required_access("/api/auth-enabled"), Access::Public);
        assert_eq!(required_access("/api/redeem-connection-code"), Access::Public);
        assert_eq!(required_access("/api/water/hydration-goals"), Access::Public);
    }

    #[test]
    fn api_paths_need_a_session() {
        assert_eq!(required_access("/api/meals"), Access::Session);
        assert_eq!(required_access("/api/todays-meals"), Access::Session);
        assert_eq!(required_access("/api/generate-connection-code"), Access::Session);
        assert_eq!(required_access("/api/water/goal"), Access::Session);
        assert_eq!(required_access("/api/water/daily-goals"), Access::Session);
        assert_eq!(required_access("/api"), Access::Session);
    }

    #[test]
    fn matching_respects_segment_boundaries() {
        assert_eq!(required_access("/apixyz"), Access::Public);
        assert_eq!(required_access("/api/auth-enabled-x"), Access::Session);
        assert_eq!(required_access("/api/water/hydration-goals/sub"), Access::Public);
    }

    #[test]
    fn unknown_paths_fall_through_public() {
        assert_eq!(required_access("/"), Access::Public);
        assert_eq!(required_access("/favicon.ico"), Access::Public);
    }
}
