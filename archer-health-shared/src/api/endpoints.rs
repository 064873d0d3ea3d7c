use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

pub fn auth_enabled(base: &str) -> String {
    base_join(base, "/api/auth-enabled")
}
pub fn sync_user(base: &str) -> String {
    base_join(base, "/api/sync-user")
}
pub fn generate_connection_code(base: &str) -> String {
    base_join(base, "/api/generate-connection-code")
}
pub fn redeem_connection_code(base: &str) -> String {
    base_join(base, "/api/redeem-connection-code")
}
pub fn hydration_goals(base: &str, date: Option<&str>) -> String {
    let path = base_join(base, "/api/water/hydration-goals");
    match date {
        Some(d) => format!("{}?date={}", path, enc(d)),
        None => path,
    }
}
pub fn water_goal(base: &str) -> String {
    base_join(base, "/api/water/goal")
}
pub fn water_daily_goals(base: &str) -> String {
    base_join(base, "/api/water/daily-goals")
}
pub fn meals(base: &str) -> String {
    base_join(base, "/api/meals")
}
pub fn todays_meals(base: &str) -> String {
    base_join(base, "/api/todays-meals")
}
