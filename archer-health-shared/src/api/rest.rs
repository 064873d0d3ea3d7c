//! Minimal REST client helpers for the companion app (Archer Aqua).

use super::endpoints as ep;
use super::*;
use once_cell::sync::Lazy;
use std::time::Duration;

pub use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("http: {0}")]
    Http(String),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("serde: {0}")]
    Serde(String),
}

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .tcp_keepalive(Some(Duration::from_secs(180)))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(180))
        .timeout(Duration::from_secs(180))
        .build()
        .expect("failed to build HTTP client")
});

fn mk_client() -> Result<reqwest::Client, RestError> {
    Ok(HTTP_CLIENT.clone())
}

async fn handle_json<T: for<'de> serde::Deserialize<'de>>(
    res: reqwest::Response,
) -> Result<T, RestError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(RestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    res.json::<T>()
        .await
        .map_err(|e| RestError::Serde(e.to_string()))
}

/// Exchanges a connection code for the Archer Health user id, consuming
/// the code.
pub async fn redeem_connection_code(
    base: &str,
    connection_code: &str,
    archer_aqua_user_id: &str,
) -> Result<RedeemResp, RestError> {
    let client = mk_client()?;
    let url = ep::redeem_connection_code(base);
    let body = RedeemReq {
        connection_code: Some(connection_code.to_string()),
        archer_aqua_user_id: Some(archer_aqua_user_id.to_string()),
    };
    let res = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

/// Fetches the hydration goal for `date` (today when `None`), presenting
/// the connection code as a bearer credential.
pub async fn hydration_goals(
    base: &str,
    connection_code: &str,
    date: Option<&str>,
) -> Result<HydrationGoalsDto, RestError> {
    let client = mk_client()?;
    let url = ep::hydration_goals(base, date);
    let res = client
        .get(url)
        .bearer_auth(connection_code)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}
