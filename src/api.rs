//! Coffee shop backend API client.
//!
//! Talks to the FastAPI backend for account registration, login, the
//! product catalog, and order submission. Everything the register needs
//! to sell is cached locally; these calls are the online edge only.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend used when `POS_API_BASE_URL` is not set.
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

// ---------------------------------------------------------------------------
// Base URL
// ---------------------------------------------------------------------------

/// The backend base URL, from `POS_API_BASE_URL` or the default.
pub fn base_url() -> String {
    let raw = std::env::var("POS_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    normalize_base_url(&raw)
}

/// Normalise a backend URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach the backend at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid backend URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Not authenticated".to_string(),
        403 => "Not allowed".to_string(),
        404 => "Backend endpoint not found".to_string(),
        s if s >= 500 => format!("Backend server error (HTTP {s})"),
        s => format!("Unexpected response from the backend (HTTP {s})"),
    }
}

/// Read a response body as JSON, turning non-2xx responses into errors.
///
/// The backend reports failures as `{"detail": "..."}`; a string detail is
/// surfaced as-is so login can show "Incorrect username or password"
/// exactly as sent.
async fn read_json(url: &str, resp: reqwest::Response) -> Result<Value, String> {
    let status = resp.status();

    if !status.is_success() {
        let body_text = resp.text().await.unwrap_or_default();
        let detail = if let Ok(json) = serde_json::from_str::<Value>(&body_text) {
            match json.get("detail") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => format!(
                    "{} (HTTP {}): {other}",
                    status_error(status),
                    status.as_u16()
                ),
                None => format!("{} (HTTP {})", status_error(status), status.as_u16()),
            }
        } else if !body_text.trim().is_empty() {
            format!(
                "{} (HTTP {}): {}",
                status_error(status),
                status.as_u16(),
                body_text.trim()
            )
        } else {
            format!("{} (HTTP {})", status_error(status), status.as_u16())
        };
        return Err(detail);
    }

    let body_text = resp.text().await.unwrap_or_default();
    if body_text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body_text).map_err(|e| format!("Invalid JSON from {url}: {e}"))
}

fn client() -> Result<Client, String> {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Log in with password credentials and return the bearer token.
pub async fn login(username: &str, password: &str) -> Result<String, String> {
    let base = base_url();
    let url = format!("{base}/token");

    let resp = client()?
        .post(&url)
        .form(&[("username", username), ("password", password)])
        .send()
        .await
        .map_err(|e| friendly_error(&base, &e))?;

    let body = read_json(&base, resp).await?;
    body.get("access_token")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| "Login response is missing access_token".to_string())
}

/// Fetch the logged-in user's profile.
pub async fn get_current_user(token: &str) -> Result<Value, String> {
    let base = base_url();
    let url = format!("{base}/users/me/");

    let resp = client()?
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| friendly_error(&base, &e))?;

    read_json(&base, resp).await
}

/// Create a user account.
pub async fn register_user(username: &str, email: &str, password: &str) -> Result<Value, String> {
    let base = base_url();
    let url = format!("{base}/users/");

    let resp = client()?
        .post(&url)
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        }))
        .send()
        .await
        .map_err(|e| friendly_error(&base, &e))?;

    read_json(&base, resp).await
}

/// Fetch the product catalog. This endpoint needs no authentication.
pub async fn get_products() -> Result<Value, String> {
    let base = base_url();
    let url = format!("{base}/products/");

    let resp = client()?
        .get(&url)
        .send()
        .await
        .map_err(|e| friendly_error(&base, &e))?;

    read_json(&base, resp).await
}

/// Submit an order to the backend.
///
/// The payload follows the backend's order shape: `user_id`,
/// `total_amount`, `status`, and `items` of `{product_id, quantity}`.
pub async fn create_order(token: &str, order: &Value) -> Result<Value, String> {
    let base = base_url();
    let url = format!("{base}/orders/");

    let resp = client()?
        .post(&url)
        .bearer_auth(token)
        .json(order)
        .send()
        .await
        .map_err(|e| friendly_error(&base, &e))?;

    read_json(&base, resp).await
}

/// Fetch the logged-in user's orders.
pub async fn get_orders(token: &str) -> Result<Value, String> {
    let base = base_url();
    let url = format!("{base}/orders/");

    let resp = client()?
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| friendly_error(&base, &e))?;

    read_json(&base, resp).await
}

// ===========================================================================
// Tests
// ===========================================================================
