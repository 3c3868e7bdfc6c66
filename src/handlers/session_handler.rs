use std::time::Duration;

use log::{debug, error, info, warn};

use crate::models::user::{SignupCompletion, SyncState, User};
use crate::services::api_client::{ApiError, BackendClient};

/// Where the user should be after a session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Inbox,
    SyncLoading,
    SyncFailed,
}

/// Authentication failures always route to the login screen.
pub fn redirect_for(err: &ApiError) -> Option<Screen> {
    redirect_when_unauthorized(err.is_unauthorized())
}

/// Same rule for components that keep only whether their last call was rejected.
pub fn redirect_when_unauthorized(unauthorized: bool) -> Option<Screen> {
    if unauthorized {
        Some(Screen::Login)
    } else {
        None
    }
}

/// Probes `/auth/me`. Any failure lands on the login screen.
pub async fn landing_screen(client: &BackendClient) -> (Screen, Option<User>) {
    match client.current_user().await {
        Ok(user) => {
            info!("Session active for {}", user.email);
            (Screen::Inbox, Some(user))
        }
        Err(e) => {
            debug!("No active session: {}", e);
            (Screen::Login, None)
        }
    }
}

pub async fn login(client: &BackendClient, email: &str, password: &str) -> Result<Screen, String> {
    match client.login(email, password).await {
        Ok(()) => Ok(Screen::Inbox),
        Err(e) => {
            warn!("Login failed for {}: {}", email, e);
            Err(e.to_string())
        }
    }
}

/// Logs out. The user lands on the login screen even if the request failed.
pub async fn logout(client: &BackendClient) -> Screen {
    if let Err(e) = client.logout().await {
        error!("Logout failed: {}", e);
    }
    Screen::Login
}

pub async fn complete_signup(
    client: &BackendClient,
    password: &str,
    confirm: &str,
    sync_days_within: u32,
) -> Result<Screen, String> {
    let completion = SignupCompletion::new(password, confirm, sync_days_within)?;
    match client.complete_signup(&completion).await {
        Ok(()) => {
            info!("Signup completed; initial sync of {} days queued", sync_days_within);
            Ok(Screen::SyncLoading)
        }
        Err(e) => {
            error!("Signup completion failed: {}", e);
            Err(e.to_string())
        }
    }
}

/// Polls `/sync/status` until the initial sync finishes or fails. Transient errors
/// are retried on the next tick.
pub async fn wait_for_sync(client: &BackendClient, interval: Duration) -> Screen {
    loop {
        match client.sync_status().await {
            Ok(status) => match status.sync_state() {
                SyncState::Done => {
                    info!("Initial sync finished");
                    return Screen::Inbox;
                }
                SyncState::Error => {
                    error!("Initial sync failed: {}", status.error.as_deref().unwrap_or("unknown error"));
                    return Screen::SyncFailed;
                }
                state => debug!("Sync {:?}, processed {:?}", state, status.processed_count()),
            },
            Err(e) => {
                if let Some(screen) = redirect_for(&e) {
                    return screen;
                }
                debug!("Sync status unavailable, retrying: {}", e);
            }
        }
        tokio::time::sleep(interval).await;
    }
}
