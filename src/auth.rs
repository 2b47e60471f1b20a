//! Cashier authentication against the backend.
//!
//! The bearer token lives in memory only; closing the register ends the
//! session. Nothing secret touches the database.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use tracing::info;

use crate::api;

/// A logged-in cashier.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub login_time: DateTime<Utc>,
}

/// Shared authentication state.
#[derive(Default)]
pub struct AuthState {
    session: Mutex<Option<Session>>,
}

/// Log in against the backend and hold the session in memory.
pub async fn login(auth: &AuthState, username: &str, password: &str) -> Result<Session, String> {
    let token = api::login(username, password).await?;

    let session = Session {
        token,
        username: username.to_string(),
        login_time: Utc::now(),
    };

    let mut guard = auth.session.lock().map_err(|e| e.to_string())?;
    *guard = Some(session.clone());

    info!(username = %username, "Cashier logged in");
    Ok(session)
}

/// Create a cashier account on the backend.
pub async fn register(
    username: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), String> {
    if password != confirm_password {
        return Err("Passwords do not match".to_string());
    }
    api::register_user(username, email, password).await?;
    info!(username = %username, "Cashier account created");
    Ok(())
}

/// The current session, if a cashier is logged in.
pub fn session(auth: &AuthState) -> Option<Session> {
    auth.session.lock().ok().and_then(|guard| guard.clone())
}

/// The bearer token for authenticated backend calls.
pub fn token(auth: &AuthState) -> Option<String> {
    session(auth).map(|s| s.token)
}

/// The logged-in cashier's username.
pub fn current_username(auth: &AuthState) -> Option<String> {
    session(auth).map(|s| s.username)
}

pub fn is_authenticated(auth: &AuthState) -> bool {
    session(auth).is_some()
}

/// Fetch the logged-in cashier's profile from the backend.
pub async fn current_user(auth: &AuthState) -> Result<Value, String> {
    let token = token(auth).ok_or_else(|| "Not logged in".to_string())?;
    api::get_current_user(&token).await
}

/// Drop the in-memory session.
pub fn logout(auth: &AuthState) {
    if let Ok(mut guard) = auth.session.lock() {
        if guard.take().is_some() {
            info!("Cashier logged out");
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
